/// Error types shared across VitalCol service crates.
///
/// These errors represent failures talking to infrastructure (the Supabase REST
/// directory). Application-specific errors are defined in each service crate and wrap
/// `CommonError` via `#[from]`.
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} body={body}")]
    Upstream { status: StatusCode, body: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}
