use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use triage_engine::{
    count_by_type, filter_by_type, rank_facilities, search_text, Facility, FacilityQuery,
    FacilityType,
};

use crate::cache::FacilityCache;
use crate::directory::{Directory, DirectoryError, EpsSummary};

#[derive(Debug, thiserror::Error)]
pub enum FacilityError {
    #[error("EPS not found: {0}")]
    EpsNotFound(Uuid),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Narrows partner facilities before they are ranked, so `limit` counts matches only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacilityFilter {
    pub facility_type: Option<FacilityType>,
    /// Case-insensitive text matched against name and address. Blank matches all.
    pub search: Option<String>,
}

impl FacilityFilter {
    /// Search text as matched, or `None` when it would match everything.
    pub fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    fn apply(&self, facilities: Vec<Facility>) -> Vec<Facility> {
        let facilities = match self.facility_type {
            Some(facility_type) => filter_by_type(&facilities, facility_type),
            None => facilities,
        };
        match self.needle() {
            Some(needle) => search_text(&facilities, &needle),
            None => facilities,
        }
    }
}

/// Ranked facilities of one EPS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EpsFacilities {
    pub eps: EpsSummary,
    pub facilities: Vec<Facility>,
    /// Partner facilities before the radius filter and limit.
    pub affiliated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EpsStats {
    pub eps: EpsSummary,
    pub total_facilities: usize,
    pub facilities_by_type: BTreeMap<String, usize>,
}

/// Directory lookups with ranking and caching.
#[derive(Clone)]
pub struct FacilityService {
    directory: Directory,
    cache: FacilityCache,
}

impl FacilityService {
    pub fn new(directory: Directory, cache: FacilityCache) -> Self {
        Self { directory, cache }
    }

    pub async fn list_eps(&self) -> Result<Vec<EpsSummary>, FacilityError> {
        if let Some(eps) = self.cache.get_eps_list().await {
            debug!(count = eps.len(), "eps list cache hit");
            return Ok(eps);
        }
        let eps = self.directory.list_eps().await?;
        self.cache.set_eps_list(&eps).await;
        Ok(eps)
    }

    async fn require_eps(&self, eps_id: Uuid) -> Result<EpsSummary, FacilityError> {
        self.directory
            .find_eps(eps_id)
            .await?
            .ok_or(FacilityError::EpsNotFound(eps_id))
    }

    /// Partner facilities of `eps_id` matching `filter`, ranked against `query`.
    pub async fn ranked_for_eps(
        &self,
        eps_id: Uuid,
        query: &FacilityQuery,
        filter: &FacilityFilter,
    ) -> Result<EpsFacilities, FacilityError> {
        if let Some(hit) = self.cache.get_ranked(eps_id, query, filter).await {
            debug!(eps_id = %eps_id, "ranked facilities cache hit");
            return Ok(hit);
        }

        let eps = self.require_eps(eps_id).await?;
        let facilities = self.directory.facilities_for_eps(eps_id).await?;
        let affiliated = facilities.len();
        let ranked = rank_facilities(filter.apply(facilities), query);
        info!(
            eps_id = %eps_id,
            affiliated,
            returned = ranked.len(),
            max_distance_km = query.max_distance_km,
            "ranked eps facilities"
        );

        let result = EpsFacilities {
            eps,
            facilities: ranked,
            affiliated,
        };
        self.cache.set_ranked(eps_id, query, filter, &result).await;
        Ok(result)
    }

    /// Partner facility totals per type.
    pub async fn stats_for_eps(&self, eps_id: Uuid) -> Result<EpsStats, FacilityError> {
        if let Some(hit) = self.cache.get_stats(eps_id).await {
            return Ok(hit);
        }
        let eps = self.require_eps(eps_id).await?;
        let facilities = self.directory.facilities_for_eps(eps_id).await?;
        let stats = EpsStats {
            eps,
            total_facilities: facilities.len(),
            facilities_by_type: count_by_type(&facilities),
        };
        self.cache.set_stats(eps_id, &stats).await;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_engine::Coordinate;

    const SALUD_TOTAL: &str = "940eee3c-ba6f-475c-ae84-496e7857dd86";
    const SANITAS: &str = "b938451e-e325-4aa6-b340-6bc44dc2a627";
    const BOGOTA: Coordinate = Coordinate::new(4.6097, -74.0817);

    fn service() -> FacilityService {
        FacilityService::new(Directory::bundled().unwrap(), FacilityCache::disabled())
    }

    #[tokio::test]
    async fn ranks_partner_facilities_nearest_first() {
        let id: Uuid = SALUD_TOTAL.parse().unwrap();
        let result = service()
            .ranked_for_eps(id, &FacilityQuery::new(BOGOTA), &FacilityFilter::default())
            .await
            .unwrap();
        assert_eq!(result.eps.name, "Salud Total EPS S.A.");
        assert_eq!(result.affiliated, 4);
        assert_eq!(result.facilities[0].name, "Hospital San Juan de Dios");
        assert_eq!(result.facilities[0].distance_km, Some(0.0));
        assert!(result
            .facilities
            .windows(2)
            .all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[tokio::test]
    async fn radius_and_limit_apply() {
        let id: Uuid = SANITAS.parse().unwrap();
        // Sanitas also partners with a clinic in Cali, far outside 50 km.
        let wide = service()
            .ranked_for_eps(id, &FacilityQuery::new(BOGOTA), &FacilityFilter::default())
            .await
            .unwrap();
        assert_eq!(wide.affiliated, 4);
        assert_eq!(wide.facilities.len(), 3);

        let narrow = service()
            .ranked_for_eps(
                id,
                &FacilityQuery::new(BOGOTA).with_limit(Some(1)),
                &FacilityFilter::default(),
            )
            .await
            .unwrap();
        assert_eq!(narrow.facilities.len(), 1);
    }

    #[tokio::test]
    async fn filters_apply_before_the_limit() {
        let id: Uuid = SALUD_TOTAL.parse().unwrap();
        // All four partners are within 10 km; the hospital is not the nearest.
        let query = FacilityQuery::new(Coordinate::new(4.6482, -74.0648))
            .with_max_distance_km(Some(10.0))
            .with_limit(Some(1));

        let nearest = service()
            .ranked_for_eps(id, &query, &FacilityFilter::default())
            .await
            .unwrap();
        assert_ne!(nearest.facilities[0].facility_type, FacilityType::Hospital);

        let hospitals = FacilityFilter {
            facility_type: Some(FacilityType::Hospital),
            search: None,
        };
        let result = service().ranked_for_eps(id, &query, &hospitals).await.unwrap();
        assert_eq!(result.facilities.len(), 1);
        assert_eq!(result.facilities[0].name, "Hospital San Juan de Dios");
        assert_eq!(result.affiliated, 4);

        let by_text = FacilityFilter {
            facility_type: None,
            search: Some("  SAN JUAN ".to_string()),
        };
        let result = service().ranked_for_eps(id, &query, &by_text).await.unwrap();
        assert_eq!(result.facilities[0].name, "Hospital San Juan de Dios");
    }

    #[test]
    fn blank_search_is_no_filter() {
        let blank = FacilityFilter {
            facility_type: None,
            search: Some("   ".to_string()),
        };
        assert_eq!(blank.needle(), None);
    }

    #[tokio::test]
    async fn unknown_eps_is_not_found() {
        let err = service()
            .ranked_for_eps(Uuid::nil(), &FacilityQuery::new(BOGOTA), &FacilityFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FacilityError::EpsNotFound(id) if id.is_nil()));
        assert!(matches!(
            service().stats_for_eps(Uuid::nil()).await,
            Err(FacilityError::EpsNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stats_count_types() {
        let stats = service()
            .stats_for_eps(SALUD_TOTAL.parse().unwrap())
            .await
            .unwrap();
        assert_eq!(stats.total_facilities, 4);
        assert_eq!(stats.facilities_by_type.get("Hospital"), Some(&1));
        assert_eq!(stats.facilities_by_type.get("Centro de Salud"), Some(&1));
        assert_eq!(stats.facilities_by_type.values().sum::<usize>(), 4);
    }

    #[tokio::test]
    async fn lists_all_eps() {
        assert_eq!(service().list_eps().await.unwrap().len(), 21);
    }
}
