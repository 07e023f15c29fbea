//! Symptom classification and facility ranking for the VitalCol triage assistant.
//!
//! Every function here is synchronous and pure: the same inputs always produce the same
//! outputs, and nothing is retained between calls. Network collaborators (directory,
//! place search, text generation) live in the server crate and hand this crate
//! already-resolved values.

pub mod facility_type;
pub mod geo;
pub mod model;
pub mod places;
pub mod ranking;
pub mod severity;
pub mod symptoms;

pub use facility_type::{classify_facility_type, PlaceRecord};
pub use geo::{distance_km, round_to_tenth};
pub use model::{Coordinate, Facility, FacilityQuery, FacilityType, SeverityLevel};
pub use places::{facilities_from_places, NearbyPlace, PlaceSearchBatch};
pub use ranking::{count_by_type, filter_by_type, rank_facilities, search_text};
pub use severity::classify_severity;
pub use symptoms::{detect_symptoms, Symptom};
