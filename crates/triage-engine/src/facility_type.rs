/// Scoring classifier that assigns a facility type to a live place-search record.
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::FacilityType;

/// The fields of an external place record the classifier reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category_tags: Vec<String>,
    #[serde(default)]
    pub address_text: String,
}

const HINT_WEIGHT: u32 = 2;
const ADDRESS_WEIGHT: u32 = 1;

struct TextCheck {
    pattern: Regex,
    facility_type: FacilityType,
    name_weight: u32,
}

// `\b` is Unicode-aware: accented letters are word characters, so "saludé" is one word.
static TEXT_CHECKS: LazyLock<Vec<TextCheck>> = LazyLock::new(|| {
    let check = |pattern: &str, facility_type, name_weight| TextCheck {
        pattern: Regex::new(pattern).expect("valid regex"),
        facility_type,
        name_weight,
    };
    vec![
        check(r"(?i)\bhospital\b", FacilityType::Hospital, 3),
        check(r"(?i)\bclínica|\bclinica\b", FacilityType::Clinica, 3),
        check(r"(?i)\beps\b", FacilityType::Eps, 3),
        check(r"(?i)\bips\b", FacilityType::Ips, 3),
        check(
            r"(?i)\bcentro.*salud\b|\bcentro.*médico|\bcentro.*medico\b",
            FacilityType::CentroDeSalud,
            2,
        ),
        check(r"(?i)\bsalud\b", FacilityType::CentroDeSalud, 1),
    ]
});

/// Category tags that vote for a type, with their weight.
const TAG_VOTES: &[(&str, FacilityType, u32)] = &[
    ("hospital", FacilityType::Hospital, 3),
    ("health", FacilityType::CentroDeSalud, 1),
    ("doctor", FacilityType::Clinica, 1),
];

/// Pick the best-scoring type for `record`.
///
/// The type the search was looking for gets a head start; tags, name and address
/// add to it. Ties go to the earliest type in [`FacilityType::ALL`]. When nothing
/// scores at all the result is [`FacilityType::CentroDeSalud`].
pub fn classify_facility_type(record: &PlaceRecord, search_hint: FacilityType) -> FacilityType {
    let mut scores = [0u32; FacilityType::ALL.len()];
    let mut add = |t: FacilityType, points: u32| scores[slot(t)] += points;

    add(search_hint, HINT_WEIGHT);

    for (tag, facility_type, weight) in TAG_VOTES {
        if record.category_tags.iter().any(|t| t == tag) {
            add(*facility_type, *weight);
        }
    }

    for check in TEXT_CHECKS.iter() {
        if check.pattern.is_match(&record.name) {
            add(check.facility_type, check.name_weight);
        }
        if check.pattern.is_match(&record.address_text) {
            add(check.facility_type, ADDRESS_WEIGHT);
        }
    }

    let mut best = FacilityType::CentroDeSalud;
    let mut best_score = 0;
    for t in FacilityType::ALL {
        if scores[slot(t)] > best_score {
            best_score = scores[slot(t)];
            best = t;
        }
    }
    best
}

fn slot(t: FacilityType) -> usize {
    FacilityType::ALL
        .iter()
        .position(|candidate| *candidate == t)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, tags: &[&str], address: &str) -> PlaceRecord {
        PlaceRecord {
            name: name.to_string(),
            category_tags: tags.iter().map(|t| t.to_string()).collect(),
            address_text: address.to_string(),
        }
    }

    #[test]
    fn hospital_by_name_tag_and_hint() {
        let r = record("Hospital San Juan", &["hospital"], "Calle 10");
        assert_eq!(classify_facility_type(&r, FacilityType::Hospital), FacilityType::Hospital);
    }

    #[test]
    fn name_outweighs_search_hint() {
        let r = record("Clínica del Country", &["health"], "Carrera 16 #82-57");
        assert_eq!(classify_facility_type(&r, FacilityType::Hospital), FacilityType::Clinica);

        let r = record("IPS Salud Total", &[], "Calle 45");
        // IPS 3 beats Centro de Salud 1 and the EPS hint 2.
        assert_eq!(classify_facility_type(&r, FacilityType::Eps), FacilityType::Ips);
    }

    #[test]
    fn hint_alone_decides_unremarkable_records() {
        let r = record("Punto de atención", &[], "");
        for hint in FacilityType::ALL {
            assert_eq!(classify_facility_type(&r, hint), hint);
        }
    }

    #[test]
    fn ties_follow_fixed_type_order() {
        // EPS 3 from the name, Hospital 3 from the tag: Hospital comes first.
        let r = record("EPS Norte", &["hospital"], "");
        assert_eq!(
            classify_facility_type(&r, FacilityType::CentroDeSalud),
            FacilityType::Hospital
        );

        // IPS 2 from the hint, Clínica 1 + 1 from tag and address.
        let r = record("Consultorio", &["doctor"], "junto a la clinica");
        assert_eq!(classify_facility_type(&r, FacilityType::Ips), FacilityType::Ips);
    }

    #[test]
    fn centro_patterns_score_centro_de_salud() {
        let r = record("Centro Médico La Sabana", &["health"], "");
        assert_eq!(
            classify_facility_type(&r, FacilityType::Clinica),
            FacilityType::CentroDeSalud
        );
        // "centro...salud" (2) plus bare "salud" (1) beats the hint.
        let r = record("Centro de Salud Chapinero", &[], "");
        assert_eq!(
            classify_facility_type(&r, FacilityType::Hospital),
            FacilityType::CentroDeSalud
        );
    }

    #[test]
    fn address_checks_are_worth_one_point() {
        // Hint IPS 2 vs. Hospital 1 from the address.
        let r = record("Sede norte", &[], "Frente al Hospital Militar");
        assert_eq!(classify_facility_type(&r, FacilityType::Ips), FacilityType::Ips);

        // Clínica 1 from the tag alone would lose to the hint; the address ties it
        // and the fixed order does the rest.
        let r = record("Sede norte", &["doctor"], "diagonal a la clinica");
        assert_eq!(
            classify_facility_type(&r, FacilityType::CentroDeSalud),
            FacilityType::Clinica
        );
    }

    #[test]
    fn word_boundaries_are_respected() {
        // "hospitalario" and "ipsum" are not whole words.
        let r = record("Servicio hospitalario ipsum", &[], "");
        assert_eq!(classify_facility_type(&r, FacilityType::Eps), FacilityType::Eps);
    }

    #[test]
    fn accented_letters_are_part_of_the_word() {
        let r = record("Saludé Spa", &[], "");
        assert_eq!(classify_facility_type(&r, FacilityType::Eps), FacilityType::Eps);

        let salud = &TEXT_CHECKS[5].pattern;
        assert!(salud.is_match("Óptica Salud Ñuñoa"));
        assert!(!salud.is_match("saludé"));
        assert!(!salud.is_match("ñsalud"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let r = record("HOSPITAL UNIVERSITARIO", &[], "");
        assert_eq!(
            classify_facility_type(&r, FacilityType::CentroDeSalud),
            FacilityType::Hospital
        );
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let r = record("", &["pharmacy", "store"], "");
        assert_eq!(classify_facility_type(&r, FacilityType::Eps), FacilityType::Eps);
    }
}
