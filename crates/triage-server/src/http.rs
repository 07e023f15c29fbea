/// JSON HTTP API.
///
/// Every error body has the shape `{ error, code, details? }`.
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, ETAG};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use triage_engine::model::{DEFAULT_LIMIT, DEFAULT_MAX_DISTANCE_KM, MAX_LIMIT};
use triage_engine::places::LIVE_SEARCH_RADIUS_KM;
use triage_engine::{facilities_from_places, Coordinate, Facility, FacilityQuery, PlaceSearchBatch};

use crate::directory::parse_eps_id;
use crate::facilities::{FacilityError, FacilityFilter, FacilityService};
use crate::triage::TriageService;

const EPS_LIST_CACHE_CONTROL: &str = "public, max-age=3600";
const FACILITIES_CACHE_CONTROL: &str = "public, max-age=1800";
const NO_FACILITIES_MESSAGE: &str = "No se encontraron centros médicos afiliados a esta EPS";

#[derive(Clone)]
pub struct AppState {
    pub triage: TriageService,
    pub facilities: FacilityService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/eps", get(list_eps))
        .route("/api/eps-facilities", get(eps_facilities))
        .route("/api/eps/{id}/stats", get(eps_stats))
        .route("/api/triage", post(triage))
        .route("/api/places/rank", post(rank_places))
        .fallback(not_found)
        .with_state(state)
}

// --- Errors ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid query parameters")]
    InvalidQuery(Vec<FieldError>),
    #[error("malformed query string: {0}")]
    MalformedQuery(String),
    #[error("invalid EPS id")]
    InvalidEpsId,
    #[error("EPS not found")]
    EpsNotFound,
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("eps query failed: {0}")]
    EpsQuery(String),
    #[error("facilities query failed: {0}")]
    FacilitiesQuery(String),
    #[error("stats query failed: {0}")]
    StatsQuery(String),
    #[error("endpoint not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::InvalidQuery(fields) => (
                StatusCode::BAD_REQUEST,
                "INVALID_QUERY_PARAMS",
                "Parámetros de consulta inválidos",
                Some(json!(fields)),
            ),
            ApiError::MalformedQuery(detail) => (
                StatusCode::BAD_REQUEST,
                "INVALID_QUERY_PARAMS",
                "Parámetros de consulta inválidos",
                Some(json!(detail)),
            ),
            ApiError::InvalidEpsId => (
                StatusCode::BAD_REQUEST,
                "INVALID_EPS_ID",
                "ID de EPS inválido",
                None,
            ),
            ApiError::EpsNotFound => (
                StatusCode::NOT_FOUND,
                "EPS_NOT_FOUND",
                "EPS no encontrada",
                None,
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "Solicitud inválida",
                Some(json!(detail)),
            ),
            ApiError::EpsQuery(detail) => {
                error!(detail, "eps query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EPS_QUERY_ERROR",
                    "Error al consultar EPS",
                    Some(json!(detail)),
                )
            }
            ApiError::FacilitiesQuery(detail) => {
                error!(detail, "facilities query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "FACILITIES_QUERY_ERROR",
                    "Error al consultar centros médicos",
                    Some(json!(detail)),
                )
            }
            ApiError::StatsQuery(detail) => {
                error!(detail, "stats query failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STATS_QUERY_ERROR",
                    "Error al consultar estadísticas",
                    Some(json!(detail)),
                )
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "Endpoint not found", None),
        };

        let body = ErrorBody {
            error: message.to_string(),
            code,
            details,
        };
        (status, Json(body)).into_response()
    }
}

/// Map a service failure, choosing the 500 variant for the endpoint.
fn facility_error(err: FacilityError, internal: fn(String) -> ApiError) -> ApiError {
    match err {
        FacilityError::EpsNotFound(_) => ApiError::EpsNotFound,
        FacilityError::Directory(e) => internal(e.to_string()),
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn cache_headers(cache_control: &'static str, etag: Option<String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
    if let Some(value) = etag.and_then(|tag| HeaderValue::from_str(&tag).ok()) {
        headers.insert(ETAG, value);
    }
    headers
}

// --- Handlers ---

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn list_eps(State(state): State<AppState>) -> Result<Response, ApiError> {
    let eps = state
        .facilities
        .list_eps()
        .await
        .map_err(|e| facility_error(e, ApiError::EpsQuery))?;
    let body = json!({ "total": eps.len(), "eps": eps });
    Ok((cache_headers(EPS_LIST_CACHE_CONTROL, None), Json(body)).into_response())
}

/// Raw `/api/eps-facilities` parameters, validated by [`parse_facilities_query`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFacilitiesQuery {
    pub eps_id: Option<String>,
    pub user_lat: Option<String>,
    pub user_lng: Option<String>,
    pub max_distance: Option<String>,
    pub limit: Option<String>,
}

/// Validate every field, collecting all failures.
pub fn parse_facilities_query(
    raw: &RawFacilitiesQuery,
) -> Result<(Uuid, FacilityQuery), Vec<FieldError>> {
    let mut errors = Vec::new();
    let mut fail = |field, message| errors.push(FieldError { field, message });

    let eps_id = raw.eps_id.as_deref().and_then(parse_eps_id);
    if eps_id.is_none() {
        fail("epsId", "EPS ID debe ser un UUID válido");
    }

    let lat = parse_f64(raw.user_lat.as_deref()).filter(|v| (-90.0..=90.0).contains(v));
    if lat.is_none() {
        fail("userLat", "Latitud inválida");
    }
    let lng = parse_f64(raw.user_lng.as_deref()).filter(|v| (-180.0..=180.0).contains(v));
    if lng.is_none() {
        fail("userLng", "Longitud inválida");
    }

    let max_distance = match raw.max_distance.as_deref() {
        None => Some(DEFAULT_MAX_DISTANCE_KM),
        value => parse_f64(value).filter(|v| *v > 0.0),
    };
    if max_distance.is_none() {
        fail("maxDistance", "Distancia máxima inválida");
    }

    let limit = match raw.limit.as_deref() {
        None => Some(DEFAULT_LIMIT),
        Some(s) => s
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=MAX_LIMIT).contains(n)),
    };
    if limit.is_none() {
        fail("limit", "Límite inválido");
    }

    match (eps_id, lat, lng, max_distance, limit) {
        (Some(eps_id), Some(lat), Some(lng), Some(max_distance), Some(limit)) => Ok((
            eps_id,
            FacilityQuery::new(Coordinate::new(lat, lng))
                .with_max_distance_km(Some(max_distance))
                .with_limit(Some(limit)),
        )),
        _ => Err(errors),
    }
}

fn parse_f64(value: Option<&str>) -> Option<f64> {
    value?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EpsFacilitiesResponse {
    eps: EpsRef,
    facilities: Vec<Facility>,
    total: usize,
    query: QueryEcho,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct EpsRef {
    id: Uuid,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryEcho {
    max_distance: f64,
    limit: usize,
    user_location: LatLng,
}

#[derive(Debug, Serialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

async fn eps_facilities(
    State(state): State<AppState>,
    raw: Result<Query<RawFacilitiesQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(raw) = raw.map_err(|rejection| ApiError::MalformedQuery(rejection.body_text()))?;
    let (eps_id, query) = parse_facilities_query(&raw).map_err(ApiError::InvalidQuery)?;
    let result = state
        .facilities
        .ranked_for_eps(eps_id, &query, &FacilityFilter::default())
        .await
        .map_err(|e| facility_error(e, ApiError::FacilitiesQuery))?;

    let location = query.user_location;
    let body = EpsFacilitiesResponse {
        eps: EpsRef {
            id: result.eps.id,
            name: result.eps.name,
        },
        total: result.facilities.len(),
        facilities: result.facilities,
        query: QueryEcho {
            max_distance: query.max_distance_km,
            limit: query.limit,
            user_location: LatLng {
                lat: location.latitude,
                lng: location.longitude,
            },
        },
        message: (result.affiliated == 0).then_some(NO_FACILITIES_MESSAGE),
    };
    let etag = format!("\"{eps_id}-{}-{}\"", location.latitude, location.longitude);
    Ok((cache_headers(FACILITIES_CACHE_CONTROL, Some(etag)), Json(body)).into_response())
}

async fn eps_stats(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let eps_id = id
        .ok()
        .and_then(|Path(id)| parse_eps_id(&id))
        .ok_or(ApiError::InvalidEpsId)?;
    let stats = state
        .facilities
        .stats_for_eps(eps_id)
        .await
        .map_err(|e| facility_error(e, ApiError::StatsQuery))?;
    let body = json!({
        "eps": { "id": stats.eps.id, "name": stats.eps.name },
        "totalFacilities": stats.total_facilities,
        "facilitiesByType": stats.facilities_by_type,
    });
    Ok((cache_headers(FACILITIES_CACHE_CONTROL, None), Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriageRequest {
    message: String,
    #[serde(default)]
    user_name: Option<String>,
}

async fn triage(
    State(state): State<AppState>,
    body: Result<Json<TriageRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(body)?;
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }
    let assessment = state
        .triage
        .assess(&request.message, request.user_name.as_deref())
        .await;
    Ok(Json(assessment).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankPlacesRequest {
    user_location: Coordinate,
    #[serde(default)]
    results: Vec<PlaceSearchBatch>,
    #[serde(default)]
    max_distance: Option<f64>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn rank_places(
    body: Result<Json<RankPlacesRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(body)?;
    if !request.user_location.is_valid() {
        return Err(ApiError::BadRequest("userLocation out of range".to_string()));
    }
    let max_distance = request.max_distance.unwrap_or(LIVE_SEARCH_RADIUS_KM);
    if !(max_distance.is_finite() && max_distance > 0.0) {
        return Err(ApiError::BadRequest("maxDistance must be positive".to_string()));
    }
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!("limit must be within 1..={MAX_LIMIT}")));
    }

    let query = FacilityQuery::new(request.user_location)
        .with_max_distance_km(Some(max_distance))
        .with_limit(Some(limit));
    let facilities = facilities_from_places(&request.results, &query);
    Ok(Json(json!({ "total": facilities.len(), "facilities": facilities })).into_response())
}
