use std::fmt;

use chrono::NaiveDate;

use crate::filter::{FilterState, TimeFilter};

pub const PARAM_TYPE: &str = "type";
pub const PARAM_TIME: &str = "time";
pub const PARAM_START: &str = "start";
pub const PARAM_END: &str = "end";
pub const PARAM_SHOW_NAMES: &str = "showNames";
pub const PARAM_SHOW_CIRCLES: &str = "showCircles";
pub const PARAM_HIDE_UI: &str = "hideUI";
pub const PARAM_ZOOM: &str = "zoom";
pub const PARAM_LAT: &str = "lat";
pub const PARAM_LNG: &str = "lng";

pub const DEFAULT_ZOOM: u32 = 6;
pub const DEFAULT_LAT: f64 = 32.4279;
pub const DEFAULT_LNG: f64 = 53.688;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ordered query-string parameters. Behaves like the browser's `URLSearchParams`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse `?a=1&b=2` or `a=1&b=2`. `+` decodes as a space; bad escapes are kept verbatim.
    pub fn parse(search: &str) -> Self {
        let search = search.strip_prefix('?').unwrap_or(search);
        let pairs = search
            .split('&')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment.split_once('=') {
                Some((key, value)) => (decode(key), decode(value)),
                None => (decode(segment), String::new()),
            })
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Replace the first occurrence in place and drop the rest, or append.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.pairs[index].1 = value;
                let mut seen = 0usize;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.pairs.push((key.to_owned(), value)),
        }
    }

    /// Remove every occurrence of `key`.
    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn set_or_remove(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(value) => self.set(key, value),
            None => self.remove(key),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Encoded form without the leading `?`.
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// `?query`, or an empty string when there are no parameters.
    pub fn to_search(&self) -> String {
        if self.pairs.is_empty() {
            String::new()
        } else {
            format!("?{}", self.to_query_string())
        }
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

impl FilterState {
    /// Read filter state from the query. Absent or invalid values take defaults.
    pub fn from_query(params: &QueryParams) -> Self {
        let mut state = FilterState::default();

        if let Some(types) = params.get(PARAM_TYPE) {
            state.select_types(types.split(','));
        }

        let start = params.get(PARAM_START).and_then(parse_date);
        let end = params.get(PARAM_END).and_then(parse_date);
        state.time = if start.is_some() || end.is_some() {
            TimeFilter::range(start, end)
        } else {
            params
                .get(PARAM_TIME)
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .map(TimeFilter::last_days)
                .unwrap_or_default()
        };

        state.show_labels = params.get(PARAM_SHOW_NAMES) == Some("true");
        state.show_circles = params.get(PARAM_SHOW_CIRCLES) == Some("true");
        state.resolve_toggles();
        state
    }

    /// Write every filter parameter, setting or deleting each independently. Other keys are untouched.
    pub fn write_query(&self, params: &mut QueryParams) {
        let types = (!self.selected_types.is_empty()).then(|| {
            self.selected_types
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(",")
        });
        params.set_or_remove(PARAM_TYPE, types);

        let (time, start, end) = match self.time {
            TimeFilter::Unrestricted => (None, None, None),
            TimeFilter::LastDays { days } => (Some(days.to_string()), None, None),
            TimeFilter::Range { start, end } => (None, start.map(format_date), end.map(format_date)),
        };
        params.set_or_remove(PARAM_TIME, time);
        params.set_or_remove(PARAM_START, start);
        params.set_or_remove(PARAM_END, end);

        let show_labels = self.show_labels;
        let show_circles = self.show_circles && !show_labels;
        params.set_or_remove(PARAM_SHOW_NAMES, show_labels.then(|| "true".to_owned()));
        params.set_or_remove(PARAM_SHOW_CIRCLES, show_circles.then(|| "true".to_owned()));
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Map viewport carried in the URL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub zoom: u32,
    pub lat: f64,
    pub lng: f64,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            lat: DEFAULT_LAT,
            lng: DEFAULT_LNG,
        }
    }
}

impl MapView {
    pub fn from_query(params: &QueryParams) -> Self {
        let defaults = Self::default();
        let zoom = params
            .get(PARAM_ZOOM)
            .map(crate::casualties::parse_int_prefix)
            .filter(|zoom| *zoom > 0)
            .unwrap_or(defaults.zoom);
        let coordinate = |key: &str, fallback: f64| {
            params
                .get(key)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .unwrap_or(fallback)
        };
        Self {
            zoom,
            lat: coordinate(PARAM_LAT, defaults.lat),
            lng: coordinate(PARAM_LNG, defaults.lng),
        }
    }

    /// Write `zoom`, `lat` and `lng`; coordinates keep six decimals.
    pub fn write_query(&self, params: &mut QueryParams) {
        params.set(PARAM_ZOOM, self.zoom.to_string());
        params.set(PARAM_LAT, format!("{:.6}", self.lat));
        params.set(PARAM_LNG, format!("{:.6}", self.lng));
    }
}

/// Embedding mode: hide every control and show only the map.
pub fn hide_ui(params: &QueryParams) -> bool {
    params.get(PARAM_HIDE_UI) == Some("true")
}
