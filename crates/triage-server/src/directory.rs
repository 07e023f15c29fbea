/// Read-only directory of EPS entities, medical facilities and their partnerships.
///
/// Two backends: the Supabase REST API (tables `eps`, `medical_facilities`,
/// `eps_facility_partnerships`) or a static JSON document loaded once at startup.
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use triage_engine::{Coordinate, Facility, FacilityType};
use vitalcol_common::error::CommonError;
use vitalcol_common::postgrest::{eq, in_list, PostgrestClient};

const BUNDLED_DIRECTORY: &str = include_str!("../data/fallback_directory.json");

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("failed to read directory file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid directory document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// An EPS as listed to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EpsSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// Parse an EPS id written in the hyphenated 8-4-4-4-12 form. Simple, braced and
/// `urn:uuid:` spellings are rejected.
pub fn parse_eps_id(text: &str) -> Option<Uuid> {
    let text = text.trim();
    if text.len() != 36 {
        return None;
    }
    Uuid::try_parse(text).ok()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partnership {
    pub eps_id: Uuid,
    pub facility_id: String,
}

/// The static directory file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryDocument {
    #[serde(default)]
    pub eps: Vec<EpsSummary>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub partnerships: Vec<Partnership>,
}

#[derive(Clone)]
pub enum Directory {
    Static(Arc<DirectoryDocument>),
    Supabase(PostgrestClient),
}

impl Directory {
    /// The directory compiled into the binary.
    pub fn bundled() -> Result<Self, DirectoryError> {
        Self::from_json(BUNDLED_DIRECTORY)
    }

    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let mut doc: DirectoryDocument = serde_json::from_str(json)?;
        doc.eps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Directory::Static(Arc::new(doc)))
    }

    pub fn from_path(path: &Path) -> Result<Self, DirectoryError> {
        let json = std::fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Directory::Static(_) => "static",
            Directory::Supabase(_) => "supabase",
        }
    }

    /// Every EPS, ordered by name.
    pub async fn list_eps(&self) -> Result<Vec<EpsSummary>, DirectoryError> {
        match self {
            Directory::Static(doc) => Ok(doc.eps.clone()),
            Directory::Supabase(client) => {
                let rows: Vec<EpsRow> = client
                    .select("eps", "id,name,logo_url", &[("order", "name.asc".to_string())])
                    .await?;
                Ok(rows.into_iter().map(EpsSummary::from).collect())
            }
        }
    }

    pub async fn find_eps(&self, id: Uuid) -> Result<Option<EpsSummary>, DirectoryError> {
        match self {
            Directory::Static(doc) => Ok(doc.eps.iter().find(|e| e.id == id).cloned()),
            Directory::Supabase(client) => {
                let rows: Vec<EpsRow> = client
                    .select("eps", "id,name,logo_url", &[("id", eq(id)), ("limit", "1".to_string())])
                    .await?;
                Ok(rows.into_iter().next().map(EpsSummary::from))
            }
        }
    }

    /// Facilities partnered with `eps_id`, in directory order. Rows that fail to decode
    /// are skipped with a warning.
    pub async fn facilities_for_eps(&self, eps_id: Uuid) -> Result<Vec<Facility>, DirectoryError> {
        match self {
            Directory::Static(doc) => {
                let ids: HashSet<&str> = doc
                    .partnerships
                    .iter()
                    .filter(|p| p.eps_id == eps_id)
                    .map(|p| p.facility_id.as_str())
                    .collect();
                Ok(doc
                    .facilities
                    .iter()
                    .filter(|f| ids.contains(f.id.as_str()))
                    .cloned()
                    .collect())
            }
            Directory::Supabase(client) => {
                let partnerships: Vec<PartnershipRow> = client
                    .select("eps_facility_partnerships", "facility_id", &[("eps_id", eq(eps_id))])
                    .await?;
                if partnerships.is_empty() {
                    return Ok(Vec::new());
                }
                let ids: Vec<String> = partnerships.into_iter().map(|p| p.facility_id).collect();
                let rows: Vec<serde_json::Value> = client
                    .select(
                        "medical_facilities",
                        "id,name,type,address,latitude,longitude,phone,schedule,services,photo_url,rating",
                        &[("id", in_list(&ids))],
                    )
                    .await?;
                Ok(rows.into_iter().filter_map(decode_facility_row).collect())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct EpsRow {
    id: Uuid,
    name: String,
    logo_url: Option<String>,
}

impl From<EpsRow> for EpsSummary {
    fn from(row: EpsRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            logo_url: row.logo_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PartnershipRow {
    facility_id: String,
}

/// `medical_facilities` row: flat coordinates, snake_case columns.
#[derive(Debug, Deserialize)]
struct FacilityRow {
    id: String,
    name: String,
    #[serde(rename = "type")]
    facility_type: FacilityType,
    address: String,
    latitude: f64,
    longitude: f64,
    phone: Option<String>,
    schedule: Option<String>,
    services: Option<Vec<String>>,
    photo_url: Option<String>,
    rating: Option<f64>,
}

impl From<FacilityRow> for Facility {
    fn from(row: FacilityRow) -> Self {
        Facility {
            id: row.id,
            name: row.name,
            facility_type: row.facility_type,
            address: row.address,
            location: Coordinate::new(row.latitude, row.longitude),
            phone: row.phone,
            schedule: row.schedule,
            services: row.services,
            rating: row.rating,
            photo_url: row.photo_url,
            distance_km: None,
        }
    }
}

fn decode_facility_row(value: serde_json::Value) -> Option<Facility> {
    let id = value.get("id").cloned();
    serde_json::from_value::<FacilityRow>(value)
        .inspect_err(|e| warn!(error = %e, id = ?id, "skipping invalid facility row"))
        .ok()
        .map(Facility::from)
}
