use serde::{Deserialize, Serialize};

use crate::category::icon_path;
use crate::colors::{darken_hex, rgb_hex, token_color};
use crate::incident::{Incident, LatLng};
use crate::popup::{self, Locale};

pub const ICON_SIZE: [u32; 2] = [32, 32];
pub const ICON_ANCHOR: [u32; 2] = [16, 16];
pub const POPUP_ANCHOR: [i32; 2] = [0, -8];
pub const LABELED_ICON_SIZE: [u32; 2] = [180, 36];
pub const LABELED_ICON_ANCHOR: [u32; 2] = [160, 20];
pub const CLUSTER_ICON_SIZE: [u32; 2] = [28, 28];
pub const MAX_CLUSTER_RADIUS: u32 = 30;
pub const CIRCLE_RADIUS: f64 = 8.0;
const CIRCLE_STROKE_DARKEN: f64 = 0.3;

/// What a marker looks like on the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MarkerIcon {
    Image { url: String },
    Labeled { url: String, label: String },
    Circle { fill: String, stroke: String, radius: f64 },
}

impl MarkerIcon {
    pub fn is_labeled(&self) -> bool {
        matches!(self, Self::Labeled { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    Direct,
    Clustered,
}

/// Everything the surface needs to put one marker on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: LatLng,
    pub icon: MarkerIcon,
    pub title: String,
    pub placement: Placement,
}

/// The map library as seen by the marker store.
pub trait MapSurface {
    type Handle;

    fn place(&mut self, spec: &MarkerSpec) -> Self::Handle;
    fn bind_popup(&mut self, handle: &Self::Handle, html: &str);
    fn set_icon(&mut self, handle: &Self::Handle, icon: &MarkerIcon);
    fn remove(&mut self, handle: Self::Handle, placement: Placement);
    /// Drop every layer from the cluster group in one call.
    fn clear_clusters(&mut self);
}

/// Stable reference to a marker. Ids from before the last `clear_all` no longer resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId {
    generation: u64,
    index: usize,
}

struct Marker<H> {
    handle: H,
    placement: Placement,
    icon: MarkerIcon,
    token: String,
    label: Option<String>,
    record: Incident,
}

/// Owns the markers currently on the map.
pub struct MarkerStore<S: MapSurface> {
    surface: S,
    markers: Vec<Marker<S::Handle>>,
    generation: u64,
    locale: Locale,
    labels: bool,
    clustering: bool,
    circle_mode: bool,
}

impl<S: MapSurface> MarkerStore<S> {
    pub fn new(surface: S, locale: Locale) -> Self {
        Self {
            surface,
            markers: Vec::new(),
            generation: 0,
            locale,
            labels: false,
            clustering: true,
            circle_mode: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn labels(&self) -> bool {
        self.labels
    }

    pub fn clustering(&self) -> bool {
        self.clustering
    }

    pub fn circle_mode(&self) -> bool {
        self.circle_mode
    }

    /// Place exactly one marker for `record` at `position`, using `token` for icon and color.
    pub fn add(&mut self, position: LatLng, token: &str, record: &Incident) -> MarkerId {
        let label = popup::marker_label(record);
        let icon = self.icon_for(token, label.as_deref(), self.labels);
        let placement = if self.clustering && !self.circle_mode {
            Placement::Clustered
        } else {
            Placement::Direct
        };
        let spec = MarkerSpec {
            position,
            icon: icon.clone(),
            title: label.clone().unwrap_or_default(),
            placement,
        };

        let handle = self.surface.place(&spec);
        self.surface
            .bind_popup(&handle, &popup::popup_html(record, self.locale));

        self.markers.push(Marker {
            handle,
            placement,
            icon,
            token: token.to_owned(),
            label,
            record: record.clone(),
        });
        MarkerId {
            generation: self.generation,
            index: self.markers.len() - 1,
        }
    }

    /// Remove every marker. Safe on an empty store. Returns how many were removed.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.markers.len();
        let mut had_clustered = false;
        for marker in self.markers.drain(..) {
            had_clustered |= marker.placement == Placement::Clustered;
            self.surface.remove(marker.handle, marker.placement);
        }
        if had_clustered {
            self.surface.clear_clusters();
        }
        self.generation += 1;
        removed
    }

    /// Switch labels for the whole set. Markers already showing the right icon are left alone.
    pub fn set_labels(&mut self, on: bool) -> usize {
        self.labels = on;
        let mut updated = 0;
        for index in 0..self.markers.len() {
            if self.refresh_icon(index, on) {
                updated += 1;
            }
        }
        updated
    }

    /// Switch the label of one marker. `false` for a stale id or when nothing changed.
    pub fn set_label(&mut self, id: MarkerId, on: bool) -> bool {
        if id.generation != self.generation || id.index >= self.markers.len() {
            return false;
        }
        self.refresh_icon(id.index, on)
    }

    /// Applies from the next pass.
    pub fn set_clustering(&mut self, on: bool) {
        self.clustering = on;
    }

    /// Applies from the next pass.
    pub fn set_circle_mode(&mut self, on: bool) {
        self.circle_mode = on;
    }

    /// Rebuild every popup in another language.
    pub fn set_locale(&mut self, locale: Locale) {
        if self.locale == locale {
            return;
        }
        self.locale = locale;
        for marker in &self.markers {
            self.surface
                .bind_popup(&marker.handle, &popup::popup_html(&marker.record, locale));
        }
    }

    pub fn record(&self, id: MarkerId) -> Option<&Incident> {
        if id.generation != self.generation {
            return None;
        }
        self.markers.get(id.index).map(|marker| &marker.record)
    }

    pub fn icon(&self, id: MarkerId) -> Option<&MarkerIcon> {
        if id.generation != self.generation {
            return None;
        }
        self.markers.get(id.index).map(|marker| &marker.icon)
    }

    pub fn icons(&self) -> impl Iterator<Item = &MarkerIcon> {
        self.markers.iter().map(|marker| &marker.icon)
    }

    fn refresh_icon(&mut self, index: usize, labels: bool) -> bool {
        let Some(marker) = self.markers.get(index) else {
            return false;
        };
        let desired = self.icon_for(&marker.token, marker.label.as_deref(), labels);
        if desired == marker.icon {
            return false;
        }
        let marker = &mut self.markers[index];
        self.surface.set_icon(&marker.handle, &desired);
        marker.icon = desired;
        true
    }

    fn icon_for(&self, token: &str, label: Option<&str>, labels: bool) -> MarkerIcon {
        if self.circle_mode {
            let fill = rgb_hex(token_color(token));
            let stroke = darken_hex(&fill, CIRCLE_STROKE_DARKEN);
            return MarkerIcon::Circle {
                fill,
                stroke,
                radius: CIRCLE_RADIUS,
            };
        }
        let url = icon_path(token);
        match label {
            Some(label) if labels => MarkerIcon::Labeled {
                url,
                label: label.to_owned(),
            },
            _ => MarkerIcon::Image { url },
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum SurfaceCall {
        Place(MarkerSpec),
        Popup(usize),
        SetIcon(usize, MarkerIcon),
        Remove(usize, Placement),
        ClearClusters,
    }

    /// Records every call and hands out sequential handles.
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub calls: Vec<SurfaceCall>,
        pub popups: Vec<(usize, String)>,
        next: usize,
    }

    impl RecordingSurface {
        pub fn count(&self, matches: impl Fn(&SurfaceCall) -> bool) -> usize {
            self.calls.iter().filter(|call| matches(call)).count()
        }
    }

    impl MapSurface for RecordingSurface {
        type Handle = usize;

        fn place(&mut self, spec: &MarkerSpec) -> usize {
            let handle = self.next;
            self.next += 1;
            self.calls.push(SurfaceCall::Place(spec.clone()));
            handle
        }

        fn bind_popup(&mut self, handle: &usize, html: &str) {
            self.calls.push(SurfaceCall::Popup(*handle));
            self.popups.push((*handle, html.to_owned()));
        }

        fn set_icon(&mut self, handle: &usize, icon: &MarkerIcon) {
            self.calls.push(SurfaceCall::SetIcon(*handle, icon.clone()));
        }

        fn remove(&mut self, handle: usize, placement: Placement) {
            self.calls.push(SurfaceCall::Remove(handle, placement));
        }

        fn clear_clusters(&mut self) {
            self.calls.push(SurfaceCall::ClearClusters);
        }
    }
}
