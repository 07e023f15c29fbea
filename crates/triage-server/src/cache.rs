/// Redis caching layer for directory lookups.
///
/// All operations degrade to a miss when Redis is unavailable; callers fall through to
/// the directory.
///
/// Key schema:
/// - `vitalcol:v1:eps`: JSON Vec<EpsSummary> (TTL: 3600s)
/// - `vitalcol:v1:ranked:{sha256(query, filter)}`: JSON EpsFacilities (TTL: 1800s)
/// - `vitalcol:v1:stats:{eps_id}`: JSON EpsStats (TTL: 1800s)
use sha2::{Digest, Sha256};
use uuid::Uuid;

use triage_engine::FacilityQuery;
use vitalcol_common::redis::RedisCache;

use crate::directory::EpsSummary;
use crate::facilities::{EpsFacilities, EpsStats, FacilityFilter};

const KEY_PREFIX: &str = "vitalcol:v1:";
pub const EPS_LIST_TTL_SECS: u64 = 3600;
pub const RANKED_TTL_SECS: u64 = 1800;

#[derive(Clone)]
pub struct FacilityCache {
    redis: RedisCache,
}

impl FacilityCache {
    pub fn new(redis: RedisCache) -> Self {
        Self { redis }
    }

    /// A cache that never hits.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::new(RedisCache::disabled())
    }

    // --- EPS list ---

    pub async fn get_eps_list(&self) -> Option<Vec<EpsSummary>> {
        self.redis.get_json(&format!("{KEY_PREFIX}eps")).await
    }

    pub async fn set_eps_list(&self, eps: &[EpsSummary]) {
        self.redis
            .set_json_with_ttl(&format!("{KEY_PREFIX}eps"), eps, EPS_LIST_TTL_SECS)
            .await;
    }

    // --- Ranked facilities ---

    pub async fn get_ranked(
        &self,
        eps_id: Uuid,
        query: &FacilityQuery,
        filter: &FacilityFilter,
    ) -> Option<EpsFacilities> {
        self.redis.get_json(&ranked_key(eps_id, query, filter)).await
    }

    pub async fn set_ranked(
        &self,
        eps_id: Uuid,
        query: &FacilityQuery,
        filter: &FacilityFilter,
        value: &EpsFacilities,
    ) {
        self.redis
            .set_json_with_ttl(&ranked_key(eps_id, query, filter), value, RANKED_TTL_SECS)
            .await;
    }

    // --- Stats ---

    pub async fn get_stats(&self, eps_id: Uuid) -> Option<EpsStats> {
        self.redis.get_json(&format!("{KEY_PREFIX}stats:{eps_id}")).await
    }

    pub async fn set_stats(&self, eps_id: Uuid, stats: &EpsStats) {
        self.redis
            .set_json_with_ttl(&format!("{KEY_PREFIX}stats:{eps_id}"), stats, RANKED_TTL_SECS)
            .await;
    }
}

/// Deterministic key for one ranking request. Floats are hashed by their bit pattern.
fn ranked_key(eps_id: Uuid, query: &FacilityQuery, filter: &FacilityFilter) -> String {
    let mut hasher = Sha256::new();
    hasher.update(eps_id.as_bytes());
    hasher.update(query.user_location.latitude.to_bits().to_be_bytes());
    hasher.update(query.user_location.longitude.to_bits().to_be_bytes());
    hasher.update(query.max_distance_km.to_bits().to_be_bytes());
    hasher.update((query.limit as u64).to_be_bytes());
    match filter.facility_type {
        Some(t) => {
            hasher.update([1]);
            hasher.update(t.as_str().as_bytes());
        }
        None => hasher.update([0]),
    }
    match filter.needle() {
        Some(needle) => {
            hasher.update([1]);
            hasher.update(needle.as_bytes());
        }
        None => hasher.update([0]),
    }
    let hash = hasher.finalize();
    format!("{KEY_PREFIX}ranked:{:x}", hash)
}
