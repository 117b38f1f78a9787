//! Leaflet bindings and the marker surface the filter engine draws on.

use serde::Serialize;
use serde_json::{Value, json};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use warmap_shared::marker::{
    CLUSTER_ICON_SIZE, ICON_ANCHOR, ICON_SIZE, LABELED_ICON_ANCHOR, LABELED_ICON_SIZE,
    MAX_CLUSTER_RADIUS, MarkerSpec, POPUP_ANCHOR,
};
use warmap_shared::popup::{cluster_icon_html, labeled_icon_html};
use warmap_shared::{LatLng, MapSurface, MapView, MarkerIcon, Placement};

pub const TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const TILE_MAX_ZOOM: u32 = 18;
pub const MIN_ZOOM: u32 = 4;
pub const BORDER_URL: &str = "data/iran-border.geojson";

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = L, js_name = Map)]
    #[derive(Clone)]
    pub type LeafletMap;

    #[wasm_bindgen(js_namespace = L, js_name = map)]
    fn new_map(container_id: &str, options: &JsValue) -> LeafletMap;

    #[wasm_bindgen(method, js_name = setView)]
    fn set_view(this: &LeafletMap, center: &JsValue, zoom: u32) -> LeafletMap;

    #[wasm_bindgen(method, js_name = getZoom)]
    fn get_zoom(this: &LeafletMap) -> f64;

    #[wasm_bindgen(method, js_name = getCenter)]
    fn get_center(this: &LeafletMap) -> JsLatLng;

    #[wasm_bindgen(method, js_name = addLayer)]
    fn add_layer(this: &LeafletMap, layer: &Layer);

    #[wasm_bindgen(method, js_name = removeLayer)]
    fn remove_layer(this: &LeafletMap, layer: &Layer);

    #[wasm_bindgen(method, js_name = on)]
    fn on(this: &LeafletMap, events: &str, handler: &js_sys::Function);

    pub type JsLatLng;

    #[wasm_bindgen(method, getter)]
    fn lat(this: &JsLatLng) -> f64;

    #[wasm_bindgen(method, getter)]
    fn lng(this: &JsLatLng) -> f64;

    #[wasm_bindgen(js_namespace = L, js_name = Layer)]
    pub type Layer;

    #[wasm_bindgen(js_namespace = L, js_name = tileLayer)]
    fn tile_layer(url: &str, options: &JsValue) -> Layer;

    #[wasm_bindgen(js_namespace = L, js_name = geoJSON)]
    fn geo_json(data: &JsValue, options: &JsValue) -> Layer;

    #[wasm_bindgen(js_namespace = L, js_name = marker)]
    fn marker(position: &JsValue, options: &JsValue) -> Layer;

    #[wasm_bindgen(js_namespace = L, js_name = circleMarker)]
    fn circle_marker(position: &JsValue, options: &JsValue) -> Layer;

    #[wasm_bindgen(js_namespace = L, js_name = icon)]
    fn image_icon(options: &JsValue) -> JsValue;

    #[wasm_bindgen(js_namespace = L, js_name = divIcon)]
    fn div_icon(options: &JsValue) -> JsValue;

    #[wasm_bindgen(method, js_name = bindPopup)]
    fn bind_popup(this: &Layer, html: &str) -> Layer;

    #[wasm_bindgen(method, js_name = setIcon)]
    fn set_icon(this: &Layer, icon: &JsValue) -> Layer;

    #[wasm_bindgen(method, js_name = setStyle)]
    fn set_style(this: &Layer, style: &JsValue) -> Layer;

    #[wasm_bindgen(extends = Layer, js_namespace = L, js_name = MarkerClusterGroup)]
    pub type ClusterGroup;

    #[wasm_bindgen(js_namespace = L, js_name = markerClusterGroup)]
    fn marker_cluster_group(options: &JsValue) -> ClusterGroup;

    #[wasm_bindgen(method, js_name = addLayer)]
    fn add_to_cluster(this: &ClusterGroup, layer: &Layer);

    #[wasm_bindgen(method, js_name = removeLayer)]
    fn remove_from_cluster(this: &ClusterGroup, layer: &Layer);

    #[wasm_bindgen(method, js_name = clearLayers)]
    fn clear_layers(this: &ClusterGroup);

    pub type MarkerCluster;

    #[wasm_bindgen(method, js_name = getChildCount)]
    fn get_child_count(this: &MarkerCluster) -> usize;
}

/// Plain JS object from a JSON value (maps become objects, not `Map`s).
fn js_options(value: &Value) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::UNDEFINED)
}

fn js_latlng(position: LatLng) -> JsValue {
    js_sys::Array::of2(&position.lat.into(), &position.lng.into()).into()
}

fn map_options() -> Value {
    json!({
        "attributionControl": false,
        "zoomControl": false,
        "minZoom": MIN_ZOOM,
    })
}

fn border_style() -> Value {
    json!({
        "style": {"color": "#666", "weight": 2, "fill": false},
    })
}

fn cluster_group_options() -> Value {
    json!({
        "showCoverageOnHover": false,
        "maxClusterRadius": MAX_CLUSTER_RADIUS,
    })
}

fn cluster_icon_options(count: usize) -> Value {
    json!({
        "html": cluster_icon_html(count),
        "className": "marker-cluster",
        "iconSize": CLUSTER_ICON_SIZE,
    })
}

/// Options for `L.icon` / `L.divIcon`, or style options for a circle marker.
pub(crate) fn icon_options(icon: &MarkerIcon) -> Value {
    match icon {
        MarkerIcon::Image { url } => json!({
            "iconUrl": url,
            "iconSize": ICON_SIZE,
            "iconAnchor": ICON_ANCHOR,
            "popupAnchor": POPUP_ANCHOR,
        }),
        MarkerIcon::Labeled { url, label } => json!({
            "html": labeled_icon_html(url, label),
            "className": "custom-div-icon",
            "iconSize": LABELED_ICON_SIZE,
            "iconAnchor": LABELED_ICON_ANCHOR,
            "popupAnchor": POPUP_ANCHOR,
        }),
        MarkerIcon::Circle {
            fill,
            stroke,
            radius,
        } => json!({
            "radius": radius,
            "fillColor": fill,
            "color": stroke,
            "weight": 1,
            "opacity": 1,
            "fillOpacity": 0.8,
        }),
    }
}

fn build_icon(icon: &MarkerIcon) -> JsValue {
    let options = js_options(&icon_options(icon));
    match icon {
        MarkerIcon::Image { .. } => image_icon(&options),
        MarkerIcon::Labeled { .. } => div_icon(&options),
        MarkerIcon::Circle { .. } => JsValue::UNDEFINED,
    }
}

/// Create the map, center it on `view` and add the base tile layer.
pub fn init_map(container_id: &str, view: &MapView) -> LeafletMap {
    let map = new_map(container_id, &js_options(&map_options()));
    map.set_view(
        &js_latlng(LatLng {
            lat: view.lat,
            lng: view.lng,
        }),
        view.zoom,
    );
    let tiles = tile_layer(TILE_URL, &js_options(&json!({ "maxZoom": TILE_MAX_ZOOM })));
    map.add_layer(&tiles);
    map
}

pub fn add_border(map: &LeafletMap, geojson: &JsValue) {
    let layer = geo_json(geojson, &js_options(&border_style()));
    map.add_layer(&layer);
}

/// Current center and zoom, as written back to the URL.
pub fn current_view(map: &LeafletMap) -> MapView {
    let center = map.get_center();
    MapView {
        zoom: map.get_zoom().round().max(0.0) as u32,
        lat: center.lat(),
        lng: center.lng(),
    }
}

/// Run `handler` after every pan or zoom. The closure lives as long as the page.
pub fn on_view_change(map: &LeafletMap, handler: impl Fn(MapView) + 'static) {
    let target = map.clone();
    let callback = Closure::<dyn Fn()>::new(move || handler(current_view(&target)));
    map.on("zoomend moveend", callback.as_ref().unchecked_ref());
    callback.forget();
}

/// Leaflet-backed [`MapSurface`]: direct markers go on the map, clustered ones into one cluster group.
pub struct LeafletSurface {
    map: LeafletMap,
    clusters: ClusterGroup,
    _cluster_icon: Closure<dyn Fn(MarkerCluster) -> JsValue>,
}

impl LeafletSurface {
    pub fn new(map: LeafletMap) -> Self {
        let cluster_icon = Closure::<dyn Fn(MarkerCluster) -> JsValue>::new(
            |cluster: MarkerCluster| {
                div_icon(&js_options(&cluster_icon_options(cluster.get_child_count())))
            },
        );
        let options = js_options(&cluster_group_options());
        let _ = js_sys::Reflect::set(
            &options,
            &JsValue::from_str("iconCreateFunction"),
            cluster_icon.as_ref(),
        );
        let clusters = marker_cluster_group(&options);
        map.add_layer(&clusters);
        Self {
            map,
            clusters,
            _cluster_icon: cluster_icon,
        }
    }

    pub fn map(&self) -> &LeafletMap {
        &self.map
    }
}

impl MapSurface for LeafletSurface {
    type Handle = Layer;

    fn place(&mut self, spec: &MarkerSpec) -> Layer {
        let position = js_latlng(spec.position);
        let layer = match &spec.icon {
            MarkerIcon::Circle { .. } => circle_marker(&position, &js_options(&icon_options(&spec.icon))),
            icon => {
                let options = js_options(&json!({ "title": spec.title }));
                let _ = js_sys::Reflect::set(&options, &JsValue::from_str("icon"), &build_icon(icon));
                marker(&position, &options)
            }
        };
        match spec.placement {
            Placement::Clustered => self.clusters.add_to_cluster(&layer),
            Placement::Direct => self.map.add_layer(&layer),
        }
        layer
    }

    fn bind_popup(&mut self, handle: &Layer, html: &str) {
        handle.bind_popup(html);
    }

    fn set_icon(&mut self, handle: &Layer, icon: &MarkerIcon) {
        match icon {
            MarkerIcon::Circle { .. } => {
                handle.set_style(&js_options(&icon_options(icon)));
            }
            _ => {
                handle.set_icon(&build_icon(icon));
            }
        }
    }

    fn remove(&mut self, handle: Layer, placement: Placement) {
        match placement {
            Placement::Clustered => self.clusters.remove_from_cluster(&handle),
            Placement::Direct => self.map.remove_layer(&handle),
        }
    }

    fn clear_clusters(&mut self) {
        self.clusters.clear_layers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_icon_uses_fixed_size_and_anchor() {
        let options = icon_options(&MarkerIcon::Image {
            url: "svg/oil.svg".into(),
        });
        assert_eq!(options["iconUrl"], "svg/oil.svg");
        assert_eq!(options["iconSize"], json!([32, 32]));
        assert_eq!(options["iconAnchor"], json!([16, 16]));
    }

    #[test]
    fn labeled_icon_embeds_escaped_name() {
        let options = icon_options(&MarkerIcon::Labeled {
            url: "svg/military.svg".into(),
            label: "Base <A>".into(),
        });
        assert_eq!(options["className"], "custom-div-icon");
        let html = options["html"].as_str().unwrap_or_default();
        assert!(html.contains("svg/military.svg"));
        assert!(html.contains("Base &lt;A&gt;"));
    }

    #[test]
    fn circle_style_carries_fill_and_stroke() {
        let options = icon_options(&MarkerIcon::Circle {
            fill: "#ff0000".into(),
            stroke: "#b20000".into(),
            radius: 8.0,
        });
        assert_eq!(options["fillColor"], "#ff0000");
        assert_eq!(options["color"], "#b20000");
        assert_eq!(options["radius"], 8.0);
    }

    #[test]
    fn cluster_options_match_radius_and_bubble() {
        assert_eq!(cluster_group_options()["maxClusterRadius"], 30);
        assert_eq!(cluster_group_options()["showCoverageOnHover"], false);
        assert_eq!(cluster_icon_options(3)["className"], "marker-cluster");
        assert_eq!(cluster_icon_options(3)["iconSize"], json!([28, 28]));
    }

    #[test]
    fn map_and_border_options() {
        assert_eq!(map_options()["minZoom"], 4);
        assert_eq!(map_options()["zoomControl"], false);
        assert_eq!(border_style()["style"]["fill"], false);
    }
}
