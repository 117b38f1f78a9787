use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::casualties::CasualtyField;

/// A latitude/longitude pair. Always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn finite(lat: f64, lng: f64) -> Option<Self> {
        (lat.is_finite() && lng.is_finite()).then_some(Self { lat, lng })
    }

    pub const fn as_array(self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

/// `siteType` as it arrives on the wire: one (possibly comma-joined) string or a list.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SiteTypeField {
    #[default]
    Absent,
    Single(String),
    List(Vec<String>),
}

impl SiteTypeField {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(raw) => Self::Single(raw.clone()),
            Value::Array(items) => Self::List(items.iter().filter_map(scalar_string).collect()),
            _ => Self::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Trimmed, non-empty tokens. A single string is split on commas.
    pub fn tokens(&self) -> Vec<&str> {
        match self {
            Self::Absent => Vec::new(),
            Self::Single(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .collect(),
            Self::List(items) => items
                .iter()
                .map(|token| token.trim())
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }
}

impl Serialize for SiteTypeField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Single(raw) => serializer.serialize_str(raw),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SiteTypeField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// `coordinates` / `Coordinates` in any of the shapes the feed has used.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CoordinatesField {
    #[default]
    Absent,
    Object {
        lat: Option<f64>,
        lng: Option<f64>,
    },
    List(Vec<Option<f64>>),
    Text(String),
}

impl CoordinatesField {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Object {
                lat: map.get("lat").and_then(number_like),
                lng: map.get("lng").and_then(number_like),
            },
            Value::Array(items) => Self::List(items.iter().map(number_like).collect()),
            Value::String(raw) => Self::Text(raw.clone()),
            _ => Self::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Reduce to one finite pair, or `None` when the shape doesn't hold exactly two numbers.
    pub fn lat_lng(&self) -> Option<LatLng> {
        match self {
            Self::Absent => None,
            Self::Object { lat, lng } => LatLng::finite((*lat)?, (*lng)?),
            Self::List(items) => match items.as_slice() {
                [Some(lat), Some(lng)] => LatLng::finite(*lat, *lng),
                _ => None,
            },
            Self::Text(raw) => {
                let mut parts = raw.split(',');
                let lat = parts.next()?.trim().parse::<f64>().ok()?;
                let lng = parts.next()?.trim().parse::<f64>().ok()?;
                if parts.next().is_some() {
                    return None;
                }
                LatLng::finite(lat, lng)
            }
        }
    }
}

impl Serialize for CoordinatesField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Pair {
            lat: Option<f64>,
            lng: Option<f64>,
        }

        match self {
            Self::Absent => serializer.serialize_none(),
            Self::Object { lat, lng } => Pair {
                lat: *lat,
                lng: *lng,
            }
            .serialize(serializer),
            Self::List(items) => items.serialize(serializer),
            Self::Text(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for CoordinatesField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// A person linked to an incident.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Every incident field except the site type. Shared by all records fanned out from one source row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentBody {
    #[serde(
        rename = "displayName",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "CoordinatesField::is_absent")]
    pub coordinates: CoordinatesField,
    #[serde(
        rename = "Coordinates",
        default,
        skip_serializing_if = "CoordinatesField::is_absent"
    )]
    pub coordinates_legacy: CoordinatesField,
    #[serde(
        rename = "militaryCasualties",
        default,
        skip_serializing_if = "CasualtyField::is_absent"
    )]
    pub military_casualties: CasualtyField,
    #[serde(
        rename = "civilianCasualties",
        default,
        skip_serializing_if = "CasualtyField::is_absent"
    )]
    pub civilian_casualties: CasualtyField,
    #[serde(
        rename = "uncategorisedCasualties",
        default,
        skip_serializing_if = "CasualtyField::is_absent"
    )]
    pub uncategorised_casualties: CasualtyField,
    #[serde(
        rename = "Province",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub province: Option<String>,
    #[serde(
        rename = "City",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(
        rename = "Details",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub details_title_case: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(
        rename = "mainImage",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub main_image: Option<String>,
    #[serde(default, deserialize_with = "lenient_people", skip_serializing_if = "Vec::is_empty")]
    pub people: Vec<Person>,
    /// Fields this crate doesn't interpret, kept so re-serialization is lossless.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One incident record. After multi-type expansion, siblings share `body`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Incident {
    pub site_type: SiteTypeField,
    pub body: Arc<IncidentBody>,
}

impl Incident {
    pub fn new(site_type: SiteTypeField, body: IncidentBody) -> Self {
        Self {
            site_type,
            body: Arc::new(body),
        }
    }

    /// Decode one feed element. Non-object values are rejected; malformed fields never are.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// A sibling record carrying a single site-type token and the same shared body.
    pub fn with_single_type(&self, token: &str) -> Self {
        Self {
            site_type: SiteTypeField::Single(token.to_owned()),
            body: Arc::clone(&self.body),
        }
    }

    /// Site-type tokens, falling back to the legacy `type` field.
    pub fn type_tokens(&self) -> Vec<&str> {
        let tokens = self.site_type.tokens();
        if !tokens.is_empty() {
            return tokens;
        }
        self.body
            .legacy_type
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        self.body.date.as_deref().and_then(parse_incident_date)
    }

    pub fn details(&self) -> Option<&str> {
        self.body
            .details_title_case
            .as_deref()
            .or(self.body.details.as_deref())
            .filter(|details| !details.trim().is_empty())
    }
}

#[derive(Deserialize)]
struct RawIncident {
    #[serde(rename = "siteType", default)]
    site_type: SiteTypeField,
    #[serde(flatten)]
    body: IncidentBody,
}

impl<'de> Deserialize<'de> for Incident {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawIncident::deserialize(deserializer)?;
        Ok(Self::new(raw.site_type, raw.body))
    }
}

impl Serialize for Incident {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct IncidentRef<'a> {
            #[serde(rename = "siteType", skip_serializing_if = "site_type_absent")]
            site_type: &'a SiteTypeField,
            #[serde(flatten)]
            body: &'a IncidentBody,
        }

        IncidentRef {
            site_type: &self.site_type,
            body: &self.body,
        }
        .serialize(serializer)
    }
}

fn site_type_absent(field: &&SiteTypeField) -> bool {
    field.is_absent()
}

/// Parse an incident date. Accepts RFC 3339, naive date-times and bare dates; naive values are UTC.
pub fn parse_incident_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub(crate) fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => Some(raw.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_string(&value))
}

fn lenient_people<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Person>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}
