use std::collections::BTreeSet;

use crate::category::Category;
use crate::incident::{Incident, LatLng};

/// Display name used when a record carries nothing better.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Single map position for a record. `coordinates` is consulted before `Coordinates`.
pub fn normalize_coordinates(incident: &Incident) -> Option<LatLng> {
    incident
        .body
        .coordinates
        .lat_lng()
        .or_else(|| incident.body.coordinates_legacy.lat_lng())
}

/// Canonical categories in first-seen order; unknown tokens become `Other`, never empty.
pub fn canonicalize_site_type(incident: &Incident) -> Vec<Category> {
    let mut categories = Vec::new();
    for token in incident.type_tokens() {
        let category = Category::from_token_or_other(token);
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    if categories.is_empty() {
        categories.push(Category::Other);
    }
    categories
}

/// Fan out multi-type records into one sibling per site-type token. Siblings share the body.
pub fn expand_multi_type<I>(records: I) -> Vec<Incident>
where
    I: IntoIterator<Item = Incident>,
{
    let mut expanded = Vec::new();
    for record in records {
        let tokens = record.site_type.tokens();
        if tokens.len() > 1 {
            expanded.extend(tokens.iter().map(|token| record.with_single_type(token)));
        } else {
            expanded.push(record);
        }
    }
    expanded
}

/// Distinct site-type tokens present in `records`, lowercased and sorted. Never empty.
pub fn unique_site_types<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Incident>,
{
    let types: BTreeSet<String> = records
        .into_iter()
        .flat_map(|record| {
            record
                .type_tokens()
                .into_iter()
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
        })
        .collect();

    if types.is_empty() {
        Category::fallback_names()
    } else {
        types.into_iter().collect()
    }
}

/// Human-facing name: `displayName`, `name`, "City, Province", first site type, `type`, then "Unknown".
pub fn display_name(incident: &Incident) -> String {
    let body = &incident.body;
    let present = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };

    if let Some(name) = present(&body.display_name).or_else(|| present(&body.name)) {
        return name;
    }
    match (present(&body.city), present(&body.province)) {
        (Some(city), Some(province)) => return format!("{city}, {province}"),
        (Some(place), None) | (None, Some(place)) => return place,
        (None, None) => {}
    }
    if let Some(first) = incident.site_type.tokens().first() {
        return (*first).to_owned();
    }
    present(&body.legacy_type).unwrap_or_else(|| UNKNOWN_NAME.to_owned())
}

/// The token a marker uses for its icon and color: first site type, else `type`, else "other".
pub fn primary_token(incident: &Incident) -> String {
    incident
        .type_tokens()
        .first()
        .map(|token| token.to_lowercase())
        .unwrap_or_else(|| Category::Other.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casualties::{CasualtyCount, CasualtySummary};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn incident(value: Value) -> Incident {
        Incident::from_value(value).expect("object should decode")
    }

    #[test]
    fn coordinate_shapes_are_equivalent() {
        let expected = LatLng::finite(35.7, 51.4);
        for value in [
            json!({"coordinates": {"lat": 35.7, "lng": 51.4}}),
            json!({"coordinates": {"lat": "35.7", "lng": "51.4"}}),
            json!({"coordinates": [35.7, 51.4]}),
            json!({"coordinates": "35.7,51.4"}),
            json!({"Coordinates": " 35.7 , 51.4 "}),
        ] {
            assert_eq!(normalize_coordinates(&incident(value)), expected);
        }
    }

    #[test]
    fn lowercase_coordinates_take_precedence() {
        let record = incident(json!({
            "coordinates": [1.0, 2.0],
            "Coordinates": [3.0, 4.0],
        }));
        assert_eq!(normalize_coordinates(&record), LatLng::finite(1.0, 2.0));

        let broken_first = incident(json!({
            "coordinates": "nope",
            "Coordinates": [3.0, 4.0],
        }));
        assert_eq!(normalize_coordinates(&broken_first), LatLng::finite(3.0, 4.0));
    }

    #[test]
    fn zero_is_a_valid_coordinate() {
        let record = incident(json!({"coordinates": [0.0, 0.0]}));
        assert_eq!(normalize_coordinates(&record), LatLng::finite(0.0, 0.0));
    }

    #[test]
    fn invalid_coordinates_are_none() {
        for value in [
            json!({}),
            json!({"coordinates": [1.0]}),
            json!({"coordinates": [1.0, 2.0, 3.0]}),
            json!({"coordinates": {"lat": 1.0}}),
            json!({"coordinates": "1;2"}),
        ] {
            assert_eq!(normalize_coordinates(&incident(value)), None);
        }
    }

    #[test]
    fn canonicalize_dedupes_and_falls_back() {
        let record = incident(json!({"siteType": "Military, oil,military, airport"}));
        assert_eq!(
            canonicalize_site_type(&record),
            vec![Category::Military, Category::Oil, Category::Other]
        );
        assert_eq!(canonicalize_site_type(&incident(json!({}))), vec![Category::Other]);
        assert_eq!(
            canonicalize_site_type(&incident(json!({"siteType": ["nuclear", "NUCLEAR"]}))),
            vec![Category::Nuclear]
        );
    }

    #[test]
    fn expansion_produces_one_record_per_token() {
        let records = vec![
            incident(json!({"siteType": "military, oil ,, energy", "name": "A"})),
            incident(json!({"siteType": ["civilian"], "name": "B"})),
            incident(json!({"name": "C"})),
        ];
        let expanded = expand_multi_type(records);

        let tokens: Vec<Vec<&str>> = expanded.iter().map(|r| r.site_type.tokens()).collect();
        assert_eq!(
            tokens,
            vec![vec!["military"], vec!["oil"], vec!["energy"], vec!["civilian"], vec![]]
        );
        assert!(Arc::ptr_eq(&expanded[0].body, &expanded[2].body));
        assert_eq!(expanded[3].body.name.as_deref(), Some("B"));
    }

    #[test]
    fn expansion_reconstructs_token_set() {
        let record = incident(json!({"siteType": ["oil", "nuclear", "utility"]}));
        let original: BTreeSet<String> =
            record.site_type.tokens().iter().map(|t| t.to_string()).collect();
        let expanded = expand_multi_type([record]);
        let rebuilt: BTreeSet<String> = expanded
            .iter()
            .flat_map(|r| r.site_type.tokens())
            .map(str::to_owned)
            .collect();
        assert_eq!(expanded.len(), 3);
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn military_oil_scenario() {
        let records = vec![incident(json!({
            "siteType": "military,oil",
            "date": "2025-06-01",
            "militaryCasualties": "3,1",
            "coordinates": {"lat": 35, "lng": 51},
        }))];
        let expanded = expand_multi_type(records);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].site_type.tokens(), vec!["military"]);
        assert_eq!(expanded[1].site_type.tokens(), vec!["oil"]);

        for record in &expanded {
            let summary = CasualtySummary::from_incident(record);
            assert_eq!(summary.military, CasualtyCount { injured: 3, killed: 1 });
            assert_eq!(summary.total, 4);
            assert_eq!(normalize_coordinates(record).map(LatLng::as_array), Some([35.0, 51.0]));
        }
    }

    #[test]
    fn unique_site_types_sorted_with_fallback() {
        let records = vec![
            incident(json!({"siteType": "Oil"})),
            incident(json!({"siteType": ["military", "oil"]})),
            incident(json!({"type": "energy"})),
        ];
        assert_eq!(unique_site_types(&records), vec!["energy", "military", "oil"]);

        let empty: Vec<Incident> = Vec::new();
        assert_eq!(
            unique_site_types(&empty),
            vec!["civilian", "military", "nuclear", "oil", "other", "personofinterest", "utility"]
        );
    }

    #[test]
    fn display_name_fallback_chain() {
        assert_eq!(display_name(&incident(json!({"displayName": "D", "name": "N"}))), "D");
        assert_eq!(display_name(&incident(json!({"displayName": " ", "name": "N"}))), "N");
        assert_eq!(
            display_name(&incident(json!({"City": "Isfahan", "Province": "Isfahan Province"}))),
            "Isfahan, Isfahan Province"
        );
        assert_eq!(display_name(&incident(json!({"Province": "Fars"}))), "Fars");
        assert_eq!(display_name(&incident(json!({"siteType": "nuclear,oil"}))), "nuclear");
        assert_eq!(display_name(&incident(json!({"type": "utility"}))), "utility");
        assert_eq!(display_name(&incident(json!({}))), UNKNOWN_NAME);
    }

    #[test]
    fn primary_token_defaults_to_other() {
        assert_eq!(primary_token(&incident(json!({"siteType": "Oil,military"}))), "oil");
        assert_eq!(primary_token(&incident(json!({}))), "other");
    }
}
