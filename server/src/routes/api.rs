use std::fmt::Write as _;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use tracing::warn;
use warmap_shared::filter::visible;
use warmap_shared::{FilterState, Incident, QueryParams};

use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const DATASET_CACHE_CONTROL: &str = "public, max-age=60";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (count, seq, refreshed_at) = {
        let snapshot = state.snapshot.read().await;
        (snapshot.records.len(), snapshot.seq, snapshot.refreshed_at)
    };
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "incidents": count,
        "seq": seq,
        "source": state.source.describe(),
        "last_refresh": refreshed_at.map(|at| at.to_rfc3339()),
        "observability": {
            "refreshes_total": observability.refreshes_total,
            "refresh_failures_total": observability.refresh_failures_total,
            "incidents_requests_total": observability.incidents_requests_total,
            "filtered_requests_total": observability.filtered_requests_total,
            "not_modified_total": observability.not_modified_total,
        }
    }))
}

/// Full dataset from the pre-serialized snapshot, or a filtered subset when
/// `type`, `time`, `start` or `end` narrow it.
pub async fn get_incidents(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let params = QueryParams::parse(query.as_deref().unwrap_or_default());
    let filter = FilterState::from_query(&params);
    let filtered = !filter.selected_types.is_empty() || filter.time.is_active();
    state.observability.record_incidents_request(filtered);

    if filtered {
        let records = Arc::clone(&state.snapshot.read().await.records);
        return filtered_incidents_response(&records, &filter);
    }

    let (etag, json): (String, Arc<Bytes>) = {
        let snapshot = state.snapshot.read().await;
        (
            incidents_etag(&state.instance_id, snapshot.seq),
            Arc::clone(&snapshot.incidents_json),
        )
    };

    if if_none_match_matches(&headers, &etag) {
        state.observability.record_not_modified();
        return not_modified_response(DATASET_CACHE_CONTROL, Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), DATASET_CACHE_CONTROL, Some(etag.as_str()))
}

fn filtered_incidents_response(records: &[Incident], filter: &FilterState) -> Response {
    let subset = visible(records, filter, Utc::now());
    match serde_json::to_vec(&subset) {
        Ok(body) => json_bytes_response(Bytes::from(body), "no-cache", None),
        Err(e) => {
            warn!(error = %e, "failed to serialize filtered incidents");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn get_site_types(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (etag, json): (String, Arc<Bytes>) = {
        let snapshot = state.snapshot.read().await;
        (
            site_types_etag(&state.instance_id, snapshot.seq),
            Arc::clone(&snapshot.site_types_json),
        )
    };

    if if_none_match_matches(&headers, &etag) {
        state.observability.record_not_modified();
        return not_modified_response(DATASET_CACHE_CONTROL, Some(etag.as_str()));
    }

    json_bytes_response((*json).clone(), DATASET_CACHE_CONTROL, Some(etag.as_str()))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let (count, seq, last_refresh) = {
        let snapshot = state.snapshot.read().await;
        (
            snapshot.records.len(),
            snapshot.seq,
            snapshot.refreshed_at.map(|at| at.timestamp()),
        )
    };
    let body = render_prometheus_metrics(
        count,
        seq,
        last_refresh,
        state.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(
    incident_count: usize,
    seq: u64,
    last_refresh: Option<i64>,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "# HELP warmap_incidents Current number of incidents in the normalized dataset."
    );
    let _ = writeln!(body, "# TYPE warmap_incidents gauge");
    let _ = writeln!(body, "warmap_incidents {incident_count}");

    let _ = writeln!(
        body,
        "# HELP warmap_snapshot_seq Sequence number of the current dataset snapshot."
    );
    let _ = writeln!(body, "# TYPE warmap_snapshot_seq gauge");
    let _ = writeln!(body, "warmap_snapshot_seq {seq}");

    let _ = writeln!(
        body,
        "# HELP warmap_last_refresh_timestamp_seconds Unix time of the last successful refresh (0 if none)."
    );
    let _ = writeln!(body, "# TYPE warmap_last_refresh_timestamp_seconds gauge");
    let _ = writeln!(
        body,
        "warmap_last_refresh_timestamp_seconds {}",
        last_refresh.unwrap_or(0)
    );

    let counters = [
        (
            "warmap_refreshes_total",
            "Total successful incident source refreshes.",
            observability.refreshes_total,
        ),
        (
            "warmap_refresh_failures_total",
            "Total failed incident source refreshes.",
            observability.refresh_failures_total,
        ),
        (
            "warmap_incidents_requests_total",
            "Total incidents API requests.",
            observability.incidents_requests_total,
        ),
        (
            "warmap_filtered_requests_total",
            "Total incidents API requests answered with a filtered subset.",
            observability.filtered_requests_total,
        ),
        (
            "warmap_not_modified_total",
            "Total API requests answered with 304 Not Modified.",
            observability.not_modified_total,
        ),
    ];
    for (name, help, value) in counters {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} counter");
        let _ = writeln!(body, "{name} {value}");
    }

    body
}

fn incidents_etag(instance: &str, seq: u64) -> String {
    format!("\"incidents-{instance}-{seq}\"")
}

fn site_types_etag(instance: &str, seq: u64) -> String {
    format!("\"site-types-{instance}-{seq}\"")
}

fn json_bytes_response(body: Bytes, cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn not_modified_response(cache_control: &'static str, etag: Option<&str>) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Some(etag) = etag
        && let Ok(etag_header) = HeaderValue::from_str(etag)
    {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}
