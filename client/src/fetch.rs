use serde::Serialize;
use wasm_bindgen::JsValue;

use warmap_shared::Incident;

use crate::leaflet::BORDER_URL;

pub const INCIDENTS_URL: &str = "/api/incidents";

/// Fetch the full incident feed. Non-object entries are dropped rather than failing the batch.
pub async fn fetch_incidents() -> Result<Vec<Incident>, String> {
    let resp = gloo_net::http::Request::get(INCIDENTS_URL)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    let values = resp
        .json::<Vec<serde_json::Value>>()
        .await
        .map_err(|e| format!("parse error: {e}"))?;
    Ok(decode_incidents(values))
}

fn decode_incidents(values: Vec<serde_json::Value>) -> Vec<Incident> {
    values.into_iter().filter_map(Incident::from_value).collect()
}

/// Border outline as a plain JS object ready for `L.geoJSON`.
pub async fn fetch_border() -> Result<JsValue, String> {
    let resp = gloo_net::http::Request::get(BORDER_URL)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    let geojson = resp
        .json::<serde_json::Value>()
        .await
        .map_err(|e| format!("parse error: {e}"))?;
    geojson
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| format!("convert error: {e}"))
}
