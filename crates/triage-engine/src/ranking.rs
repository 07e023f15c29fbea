/// Distance ranking and list filters over facility collections.
use std::collections::BTreeMap;

use crate::geo::{distance_km, round_to_tenth};
use crate::model::{Facility, FacilityQuery, FacilityType};

/// Facilities within `query.max_distance_km` of the user, nearest first.
///
/// Each returned facility carries `distance_km` rounded to one decimal; the radius
/// filter applies to that rounded value. Equal distances keep their input order. The
/// result holds at most `query.limit` entries.
pub fn rank_facilities(facilities: Vec<Facility>, query: &FacilityQuery) -> Vec<Facility> {
    let mut ranked: Vec<Facility> = facilities
        .into_iter()
        .filter_map(|mut facility| {
            let km = round_to_tenth(distance_km(query.user_location, facility.location));
            // NaN fails the comparison and is dropped with the out-of-range entries.
            if km <= query.max_distance_km {
                facility.distance_km = Some(km);
                Some(facility)
            } else {
                None
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        let a = a.distance_km.unwrap_or(f64::INFINITY);
        let b = b.distance_km.unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });
    ranked.truncate(query.limit);
    ranked
}

/// Facilities of one type, in their original order.
pub fn filter_by_type(facilities: &[Facility], facility_type: FacilityType) -> Vec<Facility> {
    facilities
        .iter()
        .filter(|f| f.facility_type == facility_type)
        .cloned()
        .collect()
}

/// Facilities whose name or address contains `text`, ignoring case. A blank needle
/// matches everything.
pub fn search_text(facilities: &[Facility], text: &str) -> Vec<Facility> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return facilities.to_vec();
    }
    facilities
        .iter()
        .filter(|f| {
            f.name.to_lowercase().contains(&needle) || f.address.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Number of facilities per type, keyed by the type's display name. Types with no
/// facilities are omitted.
pub fn count_by_type(facilities: &[Facility]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for facility in facilities {
        *counts
            .entry(facility.facility_type.as_str().to_string())
            .or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coordinate;

    const USER: Coordinate = Coordinate::new(4.6097, -74.0817);

    /// A facility due north of the user at roughly `km` kilometres.
    fn north_of_user(id: &str, km: f64, facility_type: FacilityType) -> Facility {
        let deg = km / (crate::geo::EARTH_RADIUS_KM * std::f64::consts::PI / 180.0);
        Facility {
            id: id.to_string(),
            name: format!("Sede {id}"),
            facility_type,
            address: format!("Calle {id}"),
            location: Coordinate::new(USER.latitude + deg, USER.longitude),
            phone: None,
            schedule: None,
            services: None,
            rating: None,
            photo_url: None,
            distance_km: None,
        }
    }

    fn ids(facilities: &[Facility]) -> Vec<&str> {
        facilities.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn filters_orders_and_annotates() {
        let facilities = vec![
            north_of_user("1", 3.2, FacilityType::Hospital),
            north_of_user("2", 1.1, FacilityType::Clinica),
            north_of_user("3", 7.0, FacilityType::Ips),
        ];
        let query = FacilityQuery::new(USER)
            .with_max_distance_km(Some(5.0))
            .with_limit(Some(10));

        let ranked = rank_facilities(facilities, &query);
        assert_eq!(ids(&ranked), vec!["2", "1"]);
        assert_eq!(ranked[0].distance_km, Some(1.1));
        assert_eq!(ranked[1].distance_km, Some(3.2));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(rank_facilities(Vec::new(), &FacilityQuery::new(USER)).is_empty());
    }

    #[test]
    fn equal_distances_keep_input_order() {
        let facilities = vec![
            north_of_user("b", 2.0, FacilityType::Hospital),
            north_of_user("a", 2.0, FacilityType::Hospital),
            north_of_user("c", 0.5, FacilityType::Hospital),
        ];
        let ranked = rank_facilities(facilities, &FacilityQuery::new(USER));
        assert_eq!(ids(&ranked), vec!["c", "b", "a"]);
    }

    #[test]
    fn radius_is_inclusive() {
        let facilities = vec![north_of_user("edge", 5.0, FacilityType::Eps)];
        let query = FacilityQuery::new(USER).with_max_distance_km(Some(5.0));
        assert_eq!(rank_facilities(facilities, &query).len(), 1);
    }

    #[test]
    fn non_finite_locations_are_dropped() {
        let mut broken = north_of_user("nan", 1.0, FacilityType::Eps);
        broken.location = Coordinate::new(f64::NAN, 0.0);
        let ranked = rank_facilities(vec![broken], &FacilityQuery::new(USER));
        assert!(ranked.is_empty());
    }

    #[test]
    fn ranking_properties_hold_for_a_spread_of_inputs() {
        let facilities: Vec<Facility> = (0..40)
            .map(|i| north_of_user(&i.to_string(), ((i * 37) % 60) as f64 * 0.75, FacilityType::Ips))
            .collect();
        for (max, limit) in [(5.0, 3), (20.0, 10), (50.0, 100), (0.1, 5)] {
            let query = FacilityQuery::new(USER)
                .with_max_distance_km(Some(max))
                .with_limit(Some(limit));
            let ranked = rank_facilities(facilities.clone(), &query);

            assert!(ranked.len() <= limit);
            assert!(ranked.iter().all(|f| f.distance_km.unwrap() <= max));
            assert!(ranked
                .windows(2)
                .all(|w| w[0].distance_km <= w[1].distance_km));

            let kept: Vec<&str> = ids(&ranked);
            let in_range = facilities
                .iter()
                .filter(|f| round_to_tenth(distance_km(USER, f.location)) <= max)
                .count();
            assert_eq!(ranked.len(), in_range.min(limit));
            for f in &facilities {
                if !kept.contains(&f.id.as_str()) && ranked.len() < limit {
                    assert!(round_to_tenth(distance_km(USER, f.location)) > max);
                }
            }
        }
    }

    #[test]
    fn type_filter_and_text_search() {
        let facilities = vec![
            north_of_user("1", 1.0, FacilityType::Hospital),
            north_of_user("2", 2.0, FacilityType::Clinica),
            north_of_user("3", 3.0, FacilityType::Hospital),
        ];
        assert_eq!(ids(&filter_by_type(&facilities, FacilityType::Hospital)), vec!["1", "3"]);
        assert!(filter_by_type(&facilities, FacilityType::Eps).is_empty());

        assert_eq!(ids(&search_text(&facilities, "SEDE 2")), vec!["2"]);
        assert_eq!(ids(&search_text(&facilities, "calle 3")), vec!["3"]);
        assert_eq!(search_text(&facilities, "  ").len(), 3);
        assert!(search_text(&facilities, "farmacia").is_empty());
    }

    #[test]
    fn counts_per_type() {
        let facilities = vec![
            north_of_user("1", 1.0, FacilityType::Hospital),
            north_of_user("2", 2.0, FacilityType::Clinica),
            north_of_user("3", 3.0, FacilityType::Hospital),
        ];
        let counts = count_by_type(&facilities);
        assert_eq!(counts.get("Hospital"), Some(&2));
        assert_eq!(counts.get("Clínica"), Some(&1));
        assert_eq!(counts.get("EPS"), None);
        assert!(count_by_type(&[]).is_empty());
    }
}
