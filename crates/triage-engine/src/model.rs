use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default search radius for directory lookups, in kilometres.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;
/// Default number of ranked facilities returned.
pub const DEFAULT_LIMIT: usize = 20;
/// Upper bound accepted for `FacilityQuery::limit`.
pub const MAX_LIMIT: usize = 100;

/// A point on the Earth's surface, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components finite and within [-90, 90] / [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Coarse triage bucket. Ordered `Mild < Moderate < Severe`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Mild,
    Moderate,
    Severe,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Mild => "mild",
            SeverityLevel::Moderate => "moderate",
            SeverityLevel::Severe => "severe",
        }
    }

    /// Spanish adjective used in prompts and messages.
    pub fn label_es(&self) -> &'static str {
        match self {
            SeverityLevel::Mild => "leve",
            SeverityLevel::Moderate => "moderada",
            SeverityLevel::Severe => "grave",
        }
    }

    /// Fixed advice sentence shown alongside any generated guidance.
    pub fn recommendation(&self) -> &'static str {
        match self {
            SeverityLevel::Mild => {
                "Te recomiendo descansar, mantenerte hidratado y tomar medicamentos de venta libre \
                 según sea necesario. Monitorea tus síntomas y si empeoran, consulta con un médico."
            }
            SeverityLevel::Moderate => {
                "Te recomiendo programar una consulta por telemedicina lo antes posible. Un \
                 profesional médico podrá evaluar mejor tu situación y darte un diagnóstico más \
                 preciso."
            }
            SeverityLevel::Severe => {
                "Debes buscar atención médica inmediata. Te recomiendo acudir al hospital o centro \
                 de urgencias más cercano. Tus síntomas requieren evaluación profesional sin demora."
            }
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of healthcare facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum FacilityType {
    #[serde(rename = "Hospital")]
    Hospital,
    #[serde(rename = "EPS")]
    Eps,
    #[serde(rename = "IPS")]
    Ips,
    #[serde(rename = "Clínica")]
    Clinica,
    #[serde(rename = "Centro de Salud")]
    CentroDeSalud,
}

impl FacilityType {
    /// Every type, in the order used to break classification ties.
    pub const ALL: [FacilityType; 5] = [
        FacilityType::Hospital,
        FacilityType::Eps,
        FacilityType::Ips,
        FacilityType::Clinica,
        FacilityType::CentroDeSalud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityType::Hospital => "Hospital",
            FacilityType::Eps => "EPS",
            FacilityType::Ips => "IPS",
            FacilityType::Clinica => "Clínica",
            FacilityType::CentroDeSalud => "Centro de Salud",
        }
    }

    /// Keyword the live place search uses when looking for this type.
    pub fn search_keyword(&self) -> &'static str {
        match self {
            FacilityType::Hospital => "hospital",
            FacilityType::Eps => "eps salud",
            FacilityType::Ips => "ips salud",
            FacilityType::Clinica => "clinica",
            FacilityType::CentroDeSalud => "centro de salud",
        }
    }
}

impl fmt::Display for FacilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown facility type: {0}")]
pub struct ParseFacilityTypeError(pub String);

impl FromStr for FacilityType {
    type Err = ParseFacilityTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hospital" => Ok(FacilityType::Hospital),
            "eps" => Ok(FacilityType::Eps),
            "ips" => Ok(FacilityType::Ips),
            "clínica" | "clinica" => Ok(FacilityType::Clinica),
            "centro de salud" => Ok(FacilityType::CentroDeSalud),
            _ => Err(ParseFacilityTypeError(s.to_string())),
        }
    }
}

/// A healthcare facility. `distance_km` is derived by ranking, never stored at the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub facility_type: FacilityType,
    pub address: String,
    pub location: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Parameters of one ranking request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacilityQuery {
    pub user_location: Coordinate,
    pub max_distance_km: f64,
    pub limit: usize,
}

impl FacilityQuery {
    /// Query around `user_location` with the default radius and limit.
    pub fn new(user_location: Coordinate) -> Self {
        Self {
            user_location,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_max_distance_km(mut self, max_distance_km: Option<f64>) -> Self {
        if let Some(km) = max_distance_km {
            self.max_distance_km = km;
        }
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.limit = limit;
        }
        self
    }
}
