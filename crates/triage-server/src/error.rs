use vitalcol_common::error::CommonError;
use vitalcol_common::openai::OpenAiClientError;

use crate::directory::DirectoryError;

/// Startup and wiring failures. Request-level failures use the per-service error types
/// and [`crate::http::ApiError`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    OpenAi(#[from] OpenAiClientError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("config error: {0}")]
    Config(String),
}
