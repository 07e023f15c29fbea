/// Conversion of live "nearby places" search results into ranked facilities.
use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::facility_type::{classify_facility_type, PlaceRecord};
use crate::model::{Coordinate, Facility, FacilityQuery, FacilityType};
use crate::ranking::rank_facilities;

/// Default radius of the live place search, in kilometres.
pub const LIVE_SEARCH_RADIUS_KM: f64 = 5.0;

pub const DEFAULT_PLACE_NAME: &str = "Centro Médico";
pub const DEFAULT_PLACE_ADDRESS: &str = "Dirección no disponible";

/// One result of an external place search, reduced to the fields we read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NearbyPlace {
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub vicinity: Option<String>,
    #[serde(default)]
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// Places returned by one search, tagged with the type that search looked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSearchBatch {
    pub search_type: FacilityType,
    #[serde(default)]
    pub places: Vec<NearbyPlace>,
}

impl NearbyPlace {
    pub fn record(&self) -> PlaceRecord {
        PlaceRecord {
            name: self.name.clone().unwrap_or_default(),
            category_tags: self.types.clone(),
            address_text: self.vicinity.clone().unwrap_or_default(),
        }
    }

    /// Build a facility, or `None` when the place has no location.
    ///
    /// Places without an id are keyed by their coordinates.
    pub fn to_facility(&self, search_hint: FacilityType) -> Option<Facility> {
        let location = self.location?;
        let id = match &self.place_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{:.6},{:.6}", location.latitude, location.longitude),
        };
        Some(Facility {
            id,
            name: non_blank(&self.name).unwrap_or(DEFAULT_PLACE_NAME).to_string(),
            facility_type: classify_facility_type(&self.record(), search_hint),
            address: non_blank(&self.vicinity)
                .unwrap_or(DEFAULT_PLACE_ADDRESS)
                .to_string(),
            location,
            phone: None,
            schedule: None,
            services: None,
            rating: self.rating,
            photo_url: None,
            distance_km: None,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Convert every batch, drop repeated facility ids (the first one seen wins) and rank
/// the rest against `query`.
pub fn facilities_from_places(batches: &[PlaceSearchBatch], query: &FacilityQuery) -> Vec<Facility> {
    let mut seen = HashSet::new();
    let facilities: Vec<Facility> = batches
        .iter()
        .flat_map(|batch| {
            batch
                .places
                .iter()
                .filter_map(move |place| place.to_facility(batch.search_type))
        })
        .filter(|facility| seen.insert(facility.id.clone()))
        .collect();
    rank_facilities(facilities, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: Coordinate = Coordinate::new(4.6097, -74.0817);

    fn place(id: &str, name: &str, types: &[&str], lat: f64, lng: f64) -> NearbyPlace {
        NearbyPlace {
            place_id: Some(id.to_string()),
            name: Some(name.to_string()),
            types: types.iter().map(|t| t.to_string()).collect(),
            vicinity: Some(format!("Calle {id}")),
            location: Some(Coordinate::new(lat, lng)),
            rating: Some(4.0),
        }
    }

    fn live_query() -> FacilityQuery {
        FacilityQuery::new(USER).with_max_distance_km(Some(LIVE_SEARCH_RADIUS_KM))
    }

    #[test]
    fn converts_and_classifies() {
        let p = place("abc", "Hospital San Juan de Dios", &["hospital", "health"], 4.61, -74.08);
        let f = p.to_facility(FacilityType::Hospital).unwrap();
        assert_eq!(f.id, "abc");
        assert_eq!(f.facility_type, FacilityType::Hospital);
        assert_eq!(f.address, "Calle abc");
        assert_eq!(f.rating, Some(4.0));
        assert_eq!(f.distance_km, None);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let p = NearbyPlace {
            location: Some(Coordinate::new(4.61, -74.08)),
            name: Some("  ".to_string()),
            ..NearbyPlace::default()
        };
        let f = p.to_facility(FacilityType::Eps).unwrap();
        assert_eq!(f.name, DEFAULT_PLACE_NAME);
        assert_eq!(f.address, DEFAULT_PLACE_ADDRESS);
        assert_eq!(f.id, "4.610000,-74.080000");
        // Classification reads the raw name, so only the hint scores.
        assert_eq!(f.facility_type, FacilityType::Eps);
    }

    #[test]
    fn places_without_location_are_skipped() {
        let p = NearbyPlace {
            place_id: Some("x".to_string()),
            ..NearbyPlace::default()
        };
        assert!(p.to_facility(FacilityType::Hospital).is_none());
    }

    #[test]
    fn duplicates_across_batches_keep_the_first() {
        let batches = vec![
            PlaceSearchBatch {
                search_type: FacilityType::Hospital,
                places: vec![place("same", "Sede Norte", &[], 4.62, -74.08)],
            },
            PlaceSearchBatch {
                search_type: FacilityType::Ips,
                places: vec![
                    place("same", "Sede Norte", &[], 4.62, -74.08),
                    place("other", "IPS Calle 80", &[], 4.615, -74.08),
                ],
            },
        ];
        let ranked = facilities_from_places(&batches, &live_query());
        assert_eq!(ranked.len(), 2);
        let same = ranked.iter().find(|f| f.id == "same").unwrap();
        assert_eq!(same.facility_type, FacilityType::Hospital);
        assert_eq!(ranked[0].id, "other");
    }

    #[test]
    fn live_results_are_limited_to_the_search_radius() {
        let batches = vec![PlaceSearchBatch {
            search_type: FacilityType::Clinica,
            places: vec![
                place("near", "Clínica del Country", &["doctor"], 4.6482, -74.0648),
                place("far", "Clínica Medellín", &["doctor"], 6.2442, -75.5812),
            ],
        }];
        let ranked = facilities_from_places(&batches, &live_query());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, "near");
        assert!(ranked[0].distance_km.unwrap() <= LIVE_SEARCH_RADIUS_KM);
    }

    #[test]
    fn deserializes_camel_case_batches() {
        let json = r#"{
            "searchType": "Centro de Salud",
            "places": [{"placeId": "p1", "types": ["health"], "location": {"latitude": 4.6, "longitude": -74.08}}]
        }"#;
        let batch: PlaceSearchBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.search_type, FacilityType::CentroDeSalud);
        assert_eq!(batch.places[0].place_id.as_deref(), Some("p1"));
        assert_eq!(batch.places[0].name, None);
    }
}
