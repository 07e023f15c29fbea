use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use vitalcol_common::error::CommonError;
use vitalcol_common::openai::{parse_var, OpenAiClientConfig};
use vitalcol_common::postgrest::PostgrestConfig;

use crate::error::AppError;

pub const DEFAULT_GUIDANCE_MODEL: &str = "openai/gpt-4-turbo-preview";
const SUPABASE_TIMEOUT: Duration = Duration::from_secs(10);

/// Application configuration loaded explicitly from environment variables.
///
/// Everything is optional: with nothing set the server speaks MCP on stdio, serves the
/// bundled facility directory, renders template guidance and runs without a cache.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address for the HTTP API. `None` selects the MCP stdio transport.
    pub http_listen_addr: Option<SocketAddr>,
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379"). `None` disables caching.
    pub redis_url: Option<String>,
    /// JSON facility directory on disk, used when Supabase is not configured.
    pub directory_path: Option<PathBuf>,
    pub supabase: Option<PostgrestConfig>,
    pub openai: OpenAiClientConfig,
    pub guidance_model: String,
    /// Generated-guidance requests per second. `None` disables the limiter.
    pub rate_limit_rps: Option<u32>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `HTTP_LISTEN_ADDR`: serve the HTTP API on this socket address
    /// - `REDIS_URL`: Redis connection string (omit to disable caching)
    /// - `FACILITY_DIRECTORY_PATH`: JSON directory file (must exist when set)
    /// - `SUPABASE_URL` + `SUPABASE_ANON_KEY`: live directory (both or neither)
    /// - `GUIDANCE_MODEL`: chat model for generated guidance
    /// - `RATE_LIMIT_RPS`: cap on generated-guidance requests per second
    /// - `OPENAI_*`: see [`OpenAiClientConfig::from_env`]
    ///
    /// A variable that is set but malformed is an error, never a silent default.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let non_empty_var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let http_listen_addr = match non_empty_var("HTTP_LISTEN_ADDR") {
            Some(addr) => Some(addr.parse::<SocketAddr>().map_err(|e| {
                AppError::Config(format!("HTTP_LISTEN_ADDR is not a socket address ({addr}): {e}"))
            })?),
            None => None,
        };

        let directory_path = non_empty_var("FACILITY_DIRECTORY_PATH").map(PathBuf::from);
        if let Some(path) = &directory_path {
            if !path.is_file() {
                return Err(AppError::Config(format!(
                    "FACILITY_DIRECTORY_PATH not found at {}",
                    path.display()
                )));
            }
        }

        let supabase = match (non_empty_var("SUPABASE_URL"), non_empty_var("SUPABASE_ANON_KEY")) {
            (Some(url), Some(api_key)) => Some(PostgrestConfig {
                url,
                api_key,
                timeout: SUPABASE_TIMEOUT,
            }),
            (None, None) => None,
            _ => {
                return Err(AppError::Config(
                    "SUPABASE_URL and SUPABASE_ANON_KEY must be set together".to_string(),
                ))
            }
        };

        let openai = OpenAiClientConfig::from_lookup(&lookup).map_err(config_error)?;
        let rate_limit_rps = parse_var(&non_empty_var, "RATE_LIMIT_RPS", 0u32)
            .map_err(config_error)?;

        Ok(Self {
            http_listen_addr,
            redis_url: non_empty_var("REDIS_URL"),
            directory_path,
            supabase,
            openai,
            guidance_model: non_empty_var("GUIDANCE_MODEL")
                .unwrap_or_else(|| DEFAULT_GUIDANCE_MODEL.to_string()),
            rate_limit_rps: Some(rate_limit_rps).filter(|rps| *rps > 0),
        })
    }
}

fn config_error(err: CommonError) -> AppError {
    match err {
        CommonError::Config(msg) => AppError::Config(msg),
        other => AppError::Common(other),
    }
}
