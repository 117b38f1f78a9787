use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::incident::Incident;

/// One casualty field as it arrives on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CasualtyField {
    #[default]
    Absent,
    /// `{"injured": .., "dead": ..}`; members may be numbers or numeric strings.
    Object { injured: Value, dead: Value },
    /// `"injured,dead"`.
    Text(String),
}

impl CasualtyField {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Object {
                injured: map.get("injured").cloned().unwrap_or(Value::Null),
                dead: map.get("dead").cloned().unwrap_or(Value::Null),
            },
            Value::String(raw) => Self::Text(raw.clone()),
            _ => Self::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn count(&self) -> CasualtyCount {
        match self {
            Self::Absent => CasualtyCount::default(),
            Self::Object { injured, dead } => CasualtyCount {
                injured: coerce_count(injured),
                killed: coerce_count(dead),
            },
            Self::Text(raw) => {
                let mut parts = raw.split(',');
                CasualtyCount {
                    injured: parts.next().map(parse_int_prefix).unwrap_or(0),
                    killed: parts.next().map(parse_int_prefix).unwrap_or(0),
                }
            }
        }
    }
}

impl Serialize for CasualtyField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Pair<'a> {
            #[serde(skip_serializing_if = "is_null")]
            injured: &'a Value,
            #[serde(skip_serializing_if = "is_null")]
            dead: &'a Value,
        }

        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Object { injured, dead } => Pair { injured, dead }.serialize(serializer),
            Self::Text(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for CasualtyField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasualtyCount {
    pub injured: u32,
    pub killed: u32,
}

impl CasualtyCount {
    pub const fn total(self) -> u64 {
        self.injured as u64 + self.killed as u64
    }
}

/// Per-category casualty counts for one incident, plus totals.
/// Totals are `u64` so the sum of three `u32` categories never clamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasualtySummary {
    pub military: CasualtyCount,
    pub civilian: CasualtyCount,
    pub uncategorised: CasualtyCount,
    pub total_injured: u64,
    pub total_killed: u64,
    pub total: u64,
}

impl CasualtySummary {
    pub fn from_incident(incident: &Incident) -> Self {
        Self::from_counts(
            incident.body.military_casualties.count(),
            incident.body.civilian_casualties.count(),
            incident.body.uncategorised_casualties.count(),
        )
    }

    pub fn from_counts(
        military: CasualtyCount,
        civilian: CasualtyCount,
        uncategorised: CasualtyCount,
    ) -> Self {
        let total_injured =
            u64::from(military.injured) + u64::from(civilian.injured) + u64::from(uncategorised.injured);
        let total_killed =
            u64::from(military.killed) + u64::from(civilian.killed) + u64::from(uncategorised.killed);
        Self {
            military,
            civilian,
            uncategorised,
            total_injured,
            total_killed,
            total: total_injured + total_killed,
        }
    }
}

/// Leading integer of a trimmed string, like JavaScript `parseInt(s, 10)`. Negative and garbage give 0.
pub fn parse_int_prefix(raw: &str) -> u32 {
    let raw = raw.trim();
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if negative || end == 0 {
        return 0;
    }
    digits[..end]
        .bytes()
        .fold(0u32, |acc, b| acc.saturating_mul(10).saturating_add(u32::from(b - b'0')))
}

fn is_null(value: &&Value) -> bool {
    value.is_null()
}

fn coerce_count(value: &Value) -> u32 {
    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                u32::try_from(n).unwrap_or(u32::MAX)
            } else {
                match number.as_f64() {
                    Some(f) if f.is_finite() && f > 0.0 => f.trunc().min(f64::from(u32::MAX)) as u32,
                    _ => 0,
                }
            }
        }
        Value::String(raw) => parse_int_prefix(raw),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn incident(value: Value) -> Incident {
        Incident::from_value(value).expect("object should decode")
    }

    #[test]
    fn sums_object_and_string_shapes() {
        let summary = CasualtySummary::from_incident(&incident(json!({
            "militaryCasualties": {"injured": 2, "dead": 1},
            "civilianCasualties": "5,3",
        })));

        assert_eq!(summary.military, CasualtyCount { injured: 2, killed: 1 });
        assert_eq!(summary.civilian, CasualtyCount { injured: 5, killed: 3 });
        assert_eq!(summary.uncategorised, CasualtyCount::default());
        assert_eq!(summary.total_injured, 7);
        assert_eq!(summary.total_killed, 4);
        assert_eq!(summary.total, 11);
    }

    #[test]
    fn missing_fields_give_zero() {
        let summary = CasualtySummary::from_incident(&incident(json!({})));
        assert_eq!(summary, CasualtySummary::default());
    }

    #[test]
    fn unparseable_and_negative_values_are_zero() {
        let summary = CasualtySummary::from_incident(&incident(json!({
            "militaryCasualties": {"injured": "many", "dead": -4},
            "civilianCasualties": "abc",
            "uncategorisedCasualties": {"injured": 2.9},
        })));

        assert_eq!(summary.military, CasualtyCount::default());
        assert_eq!(summary.civilian, CasualtyCount::default());
        assert_eq!(summary.uncategorised, CasualtyCount { injured: 2, killed: 0 });
        assert_eq!(summary.total, 2);
    }

    #[test]
    fn totals_do_not_clamp_at_category_limits() {
        let summary = CasualtySummary::from_counts(
            CasualtyCount { injured: u32::MAX, killed: 0 },
            CasualtyCount { injured: u32::MAX, killed: 1 },
            CasualtyCount { injured: 0, killed: u32::MAX },
        );
        assert_eq!(summary.total_injured, 2 * u64::from(u32::MAX));
        assert_eq!(summary.total_killed, u64::from(u32::MAX) + 1);
        assert_eq!(summary.total, summary.total_injured + summary.total_killed);
        assert_eq!(summary.civilian.total(), u64::from(u32::MAX) + 1);
    }

    #[test]
    fn string_with_single_token_counts_injured_only() {
        let field = CasualtyField::Text("6".into());
        assert_eq!(field.count(), CasualtyCount { injured: 6, killed: 0 });
    }

    #[test]
    fn parse_int_prefix_matches_leading_digits() {
        assert_eq!(parse_int_prefix(" 12abc"), 12);
        assert_eq!(parse_int_prefix("+7"), 7);
        assert_eq!(parse_int_prefix("-3"), 0);
        assert_eq!(parse_int_prefix(""), 0);
        assert_eq!(parse_int_prefix("x1"), 0);
        assert_eq!(parse_int_prefix("99999999999"), u32::MAX);
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = CasualtySummary::from_counts(
            CasualtyCount { injured: 1, killed: 0 },
            CasualtyCount::default(),
            CasualtyCount::default(),
        );
        let value = serde_json::to_value(summary).expect("serialize");
        assert_eq!(value["totalInjured"], json!(1));
        assert_eq!(value["total"], json!(1));
    }
}
