use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::incident::Incident;

/// Day options offered by the time dropdown. Empty string means unrestricted.
pub const TIME_OPTIONS: [&str; 7] = ["", "1", "2", "3", "7", "14", "30"];

/// Time window applied to incident dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TimeFilter {
    #[default]
    Unrestricted,
    LastDays { days: u32 },
    Range {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl TimeFilter {
    /// `LastDays(0)` and an empty range both mean no restriction.
    pub fn last_days(days: u32) -> Self {
        if days == 0 {
            Self::Unrestricted
        } else {
            Self::LastDays { days }
        }
    }

    pub fn range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        if start.is_none() && end.is_none() {
            Self::Unrestricted
        } else {
            Self::Range { start, end }
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Unrestricted)
    }

    /// Whether a record dated `date` passes, evaluated against a fixed `now`.
    pub fn admits(&self, date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self, date) {
            (Self::Unrestricted, _) => true,
            (_, None) => false,
            (Self::LastDays { days }, Some(date)) => {
                date >= now - Duration::days(i64::from(*days))
            }
            (Self::Range { start, end }, Some(date)) => {
                let day = date.date_naive();
                start.is_none_or(|start| day >= start) && end.is_none_or(|end| day <= end)
            }
        }
    }
}

/// Current filter selections. The same value is reflected in the UI and the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Lowercased site-type tokens. Empty means every type is shown.
    pub selected_types: BTreeSet<String>,
    pub time: TimeFilter,
    pub show_labels: bool,
    pub show_circles: bool,
}

impl FilterState {
    /// Replace the type selection. Tokens are trimmed and lowercased; empties are dropped.
    pub fn select_types<I, T>(&mut self, types: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.selected_types = types
            .into_iter()
            .map(|token| token.as_ref().trim().to_lowercase())
            .filter(|token| !token.is_empty())
            .collect();
    }

    pub fn with_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.select_types(types);
        self
    }

    pub fn with_time(mut self, time: TimeFilter) -> Self {
        self.time = time;
        self
    }

    /// Turning labels on turns circle mode off.
    pub fn set_show_labels(&mut self, on: bool) {
        self.show_labels = on;
        if on {
            self.show_circles = false;
        }
    }

    /// Turning circle mode on turns labels off.
    pub fn set_show_circles(&mut self, on: bool) {
        self.show_circles = on;
        if on {
            self.show_labels = false;
        }
    }

    /// Resolve a state where both toggles are on. Labels win.
    pub fn resolve_toggles(&mut self) {
        if self.show_labels && self.show_circles {
            self.show_circles = false;
        }
    }

    /// Everything except label visibility, which can be applied without a full pass.
    pub fn same_selection(&self, other: &Self) -> bool {
        self.selected_types == other.selected_types
            && self.time == other.time
            && self.show_circles == other.show_circles
    }
}

/// Keep records admitted by `filter`. Records without a parseable date only pass when unrestricted.
pub fn filter_by_time<'a, I>(records: I, filter: &TimeFilter, now: DateTime<Utc>) -> Vec<&'a Incident>
where
    I: IntoIterator<Item = &'a Incident>,
{
    records
        .into_iter()
        .filter(|record| !filter.is_active() || filter.admits(record.parsed_date(), now))
        .collect()
}

/// Keep records whose type tokens intersect `selected` (case-insensitive). Empty selection keeps all.
pub fn filter_by_type<'a, I>(records: I, selected: &BTreeSet<String>) -> Vec<&'a Incident>
where
    I: IntoIterator<Item = &'a Incident>,
{
    if selected.is_empty() {
        return records.into_iter().collect();
    }
    records
        .into_iter()
        .filter(|record| {
            record
                .type_tokens()
                .iter()
                .any(|token| selected.contains(&token.to_lowercase()))
        })
        .collect()
}

/// Time filter then type filter, always over the full dataset.
pub fn visible<'a>(records: &'a [Incident], state: &FilterState, now: DateTime<Utc>) -> Vec<&'a Incident> {
    let by_time = filter_by_time(records, &state.time, now);
    filter_by_type(by_time, &state.selected_types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn incident(value: Value) -> Incident {
        Incident::from_value(value).expect("object should decode")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).single().expect("valid instant")
    }

    fn dated(days_ago: i64) -> Incident {
        let date = now() - Duration::days(days_ago);
        incident(json!({"date": date.to_rfc3339(), "siteType": "oil"}))
    }

    #[test]
    fn last_days_keeps_recent_records_only() {
        let records = vec![dated(10), dated(1)];
        let kept = filter_by_time(&records, &TimeFilter::last_days(3), now());
        assert_eq!(kept.len(), 1);
        assert!(std::ptr::eq(kept[0], &records[1]));
    }

    #[test]
    fn undated_records_depend_on_filter_activity() {
        let records = vec![incident(json!({"siteType": "oil"})), incident(json!({"date": "soon"}))];
        assert_eq!(filter_by_time(&records, &TimeFilter::Unrestricted, now()).len(), 2);
        assert!(filter_by_time(&records, &TimeFilter::last_days(30), now()).is_empty());
        assert!(
            filter_by_time(&records, &TimeFilter::range(NaiveDate::from_ymd_opt(2025, 1, 1), None), now())
                .is_empty()
        );
    }

    #[test]
    fn zero_days_is_unrestricted() {
        assert_eq!(TimeFilter::last_days(0), TimeFilter::Unrestricted);
        assert_eq!(TimeFilter::range(None, None), TimeFilter::Unrestricted);
    }

    #[test]
    fn range_is_inclusive_with_open_bounds() {
        let records = vec![
            incident(json!({"date": "2025-06-01T23:59:00Z"})),
            incident(json!({"date": "2025-06-05"})),
            incident(json!({"date": "2025-06-06T00:00:00Z"})),
        ];
        let start = NaiveDate::from_ymd_opt(2025, 6, 1);
        let end = NaiveDate::from_ymd_opt(2025, 6, 5);

        assert_eq!(filter_by_time(&records, &TimeFilter::range(start, end), now()).len(), 2);
        assert_eq!(filter_by_time(&records, &TimeFilter::range(None, end), now()).len(), 2);
        assert_eq!(
            filter_by_time(&records, &TimeFilter::range(NaiveDate::from_ymd_opt(2025, 6, 5), None), now())
                .len(),
            2
        );
    }

    #[test]
    fn empty_selection_passes_everything_through() {
        let records = vec![
            incident(json!({"siteType": "oil"})),
            incident(json!({"type": "energy"})),
            incident(json!({})),
        ];
        let kept = filter_by_type(&records, &BTreeSet::new());
        assert_eq!(kept.len(), records.len());
    }

    #[test]
    fn empty_input_stays_empty() {
        let records: Vec<Incident> = Vec::new();
        let oil = FilterState::default().with_types(["oil"]).selected_types;

        assert!(filter_by_type(&records, &oil).is_empty());
        assert!(filter_by_type(&records, &BTreeSet::new()).is_empty());
        assert!(filter_by_time(&records, &TimeFilter::last_days(7), now()).is_empty());
        assert!(filter_by_time(&records, &TimeFilter::Unrestricted, now()).is_empty());
    }

    #[test]
    fn type_filter_is_case_insensitive_and_uses_legacy_type() {
        let records = vec![
            incident(json!({"siteType": "Oil"})),
            incident(json!({"type": "military"})),
            incident(json!({"siteType": "nuclear"})),
        ];
        let state = FilterState::default().with_types(["OIL", "military"]);
        let kept = filter_by_type(&records, &state.selected_types);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn visible_applies_both_filters() {
        let records = vec![dated(1), dated(20), incident(json!({"siteType": "military", "date": now().to_rfc3339()}))];
        let state = FilterState::default()
            .with_types(["oil"])
            .with_time(TimeFilter::last_days(7));
        let kept = visible(&records, &state, now());
        assert_eq!(kept.len(), 1);
        assert!(std::ptr::eq(kept[0], &records[0]));
    }

    #[test]
    fn toggles_are_mutually_exclusive() {
        let mut state = FilterState::default();
        state.set_show_labels(true);
        state.set_show_circles(true);
        assert!(state.show_circles);
        assert!(!state.show_labels);

        state.set_show_labels(true);
        assert!(state.show_labels);
        assert!(!state.show_circles);

        let mut both = FilterState {
            show_labels: true,
            show_circles: true,
            ..FilterState::default()
        };
        both.resolve_toggles();
        assert!(both.show_labels);
        assert!(!both.show_circles);
    }

    #[test]
    fn same_selection_ignores_labels() {
        let base = FilterState::default().with_types(["oil"]);
        let mut labelled = base.clone();
        labelled.set_show_labels(true);
        assert!(base.same_selection(&labelled));
        assert!(!base.same_selection(&base.clone().with_time(TimeFilter::last_days(2))));
    }
}
