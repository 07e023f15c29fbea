use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use triage_engine::model::{DEFAULT_LIMIT, DEFAULT_MAX_DISTANCE_KM, MAX_LIMIT};
use triage_engine::{classify_facility_type, Coordinate, FacilityQuery, FacilityType, PlaceRecord};

use crate::directory::{parse_eps_id, EpsSummary};
use crate::facilities::{EpsFacilities, FacilityError, FacilityFilter, FacilityService};
use crate::triage::{TriageAssessment, TriageService};

#[derive(Clone)]
pub struct VitalColServer {
    triage: TriageService,
    facilities: FacilityService,
    tool_router: ToolRouter<VitalColServer>,
}

impl VitalColServer {
    pub fn new(triage: TriageService, facilities: FacilityService) -> Self {
        Self {
            triage,
            facilities,
            tool_router: Self::tool_router(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AssessSymptomsParams {
    /// Free-text message in Spanish describing how the user feels.
    message: String,
    user_name: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FindFacilitiesParams {
    /// EPS UUID, as returned by list_eps.
    eps_id: String,
    latitude: f64,
    longitude: f64,
    /// Search radius in kilometres (default 50).
    max_distance_km: Option<f64>,
    /// Maximum number of facilities (1-100, default 20).
    limit: Option<usize>,
    /// Keep only facilities of this type.
    facility_type: Option<FacilityType>,
    /// Case-insensitive text matched against facility name and address.
    search: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ClassifyPlaceParams {
    name: String,
    #[serde(default)]
    category_tags: Vec<String>,
    #[serde(default)]
    address_text: String,
    /// The facility type the place search was looking for.
    search_type: FacilityType,
}

#[derive(Debug, Serialize, JsonSchema)]
struct EpsListResponse {
    eps: Vec<EpsSummary>,
    total: usize,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ClassifyPlaceResponse {
    facility_type: FacilityType,
}

fn tool_error(err: FacilityError) -> String {
    match err {
        FacilityError::EpsNotFound(id) => format!("unknown eps_id: {id}"),
        FacilityError::Directory(e) => format!("directory lookup failed: {e}"),
    }
}

#[tool_router]
impl VitalColServer {
    #[tool(description = "Detect symptoms in a Spanish message, classify severity (mild, moderate, severe) and return care guidance. urgentCare is true when the user should seek immediate attention.")]
    async fn assess_symptoms(
        &self,
        Parameters(params): Parameters<AssessSymptomsParams>,
    ) -> Result<Json<TriageAssessment>, String> {
        let message = params.message.trim();
        if message.is_empty() {
            return Err("message must not be empty".to_string());
        }
        let assessment = self
            .triage
            .assess(message, params.user_name.as_deref())
            .await;
        Ok(Json(assessment))
    }

    #[tool(description = "List the EPS (health insurance administrators) known to the facility directory, ordered by name.")]
    async fn list_eps(&self) -> Result<Json<EpsListResponse>, String> {
        let eps = self.facilities.list_eps().await.map_err(tool_error)?;
        Ok(Json(EpsListResponse {
            total: eps.len(),
            eps,
        }))
    }

    #[tool(description = "Find facilities partnered with an EPS near a location, nearest first, each annotated with distanceKm. Optionally narrow by facility type or by text in the name or address.")]
    async fn find_facilities(
        &self,
        Parameters(params): Parameters<FindFacilitiesParams>,
    ) -> Result<Json<EpsFacilities>, String> {
        let eps_id = parse_eps_id(&params.eps_id)
            .ok_or_else(|| format!("eps_id must be a hyphenated UUID: {}", params.eps_id))?;
        let location = Coordinate::new(params.latitude, params.longitude);
        if !location.is_valid() {
            return Err("latitude/longitude out of range".to_string());
        }
        let max_distance = params.max_distance_km.unwrap_or(DEFAULT_MAX_DISTANCE_KM);
        if !(max_distance.is_finite() && max_distance > 0.0) {
            return Err("max_distance_km must be positive".to_string());
        }
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(format!("limit must be within 1..={MAX_LIMIT}"));
        }

        let query = FacilityQuery::new(location)
            .with_max_distance_km(Some(max_distance))
            .with_limit(Some(limit));
        let filter = FacilityFilter {
            facility_type: params.facility_type,
            search: params.search,
        };
        let result = self
            .facilities
            .ranked_for_eps(eps_id, &query, &filter)
            .await
            .map_err(tool_error)?;
        Ok(Json(result))
    }

    #[tool(description = "Classify a place-search result (name, category tags, address) as Hospital, EPS, IPS, Clínica or Centro de Salud.")]
    async fn classify_place(
        &self,
        Parameters(params): Parameters<ClassifyPlaceParams>,
    ) -> Result<Json<ClassifyPlaceResponse>, String> {
        let record = PlaceRecord {
            name: params.name,
            category_tags: params.category_tags,
            address_text: params.address_text,
        };
        Ok(Json(ClassifyPlaceResponse {
            facility_type: classify_facility_type(&record, params.search_type),
        }))
    }
}

#[tool_handler]
impl ServerHandler for VitalColServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "vitalcol-triage".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "VitalCol triage assistant for Colombia. Call assess_symptoms with the user's \
message to get severity and guidance. If urgentCare is true, direct the user to the nearest \
hospital. Use list_eps to resolve the user's EPS, then find_facilities with their location. \
classify_place types raw place-search results."
                    .to_string(),
            ),
        }
    }
}
