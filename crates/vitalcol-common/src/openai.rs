/// Client for OpenAI-compatible chat completion hosts (OpenRouter, OpenAI, local gateways).
///
/// Requests are retried with capped exponential backoff on timeouts, connection errors,
/// HTTP 429 and 5xx. Error bodies are read up to a byte limit so a misbehaving upstream
/// cannot flood the logs.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CommonError;

#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    /// Bearer token. `None` means the host is not configured and callers should not call it.
    pub api_key: Option<String>,
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl OpenAiClientConfig {
    /// Read the `OPENAI_*` environment variables.
    ///
    /// - `OPENAI_BASE_URL` (default OpenRouter)
    /// - `OPENAI_API_KEY` (unset: not configured)
    /// - `OPENAI_TIMEOUT_SECS` (30), `OPENAI_MAX_RETRIES` (2)
    /// - `OPENAI_RETRY_INITIAL_MS` (200), `OPENAI_RETRY_MAX_MS` (5000)
    /// - `OPENAI_MAX_ERROR_BODY_BYTES` (8192)
    ///
    /// Unset or blank values take the default; anything else must parse.
    pub fn from_env() -> Result<Self, CommonError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CommonError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = var("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string());

        let timeout_secs = parse_var(&var, "OPENAI_TIMEOUT_SECS", 30)?;
        let initial_ms = parse_var(&var, "OPENAI_RETRY_INITIAL_MS", 200)?;
        let max_ms = parse_var(&var, "OPENAI_RETRY_MAX_MS", 5_000)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: var("OPENAI_API_KEY"),
            default_timeout: Duration::from_secs(timeout_secs),
            max_retries: parse_var(&var, "OPENAI_MAX_RETRIES", 2)?,
            initial_backoff: Duration::from_millis(initial_ms),
            max_backoff: Duration::from_millis(max_ms),
            max_error_body_bytes: parse_var(&var, "OPENAI_MAX_ERROR_BODY_BYTES", 8 * 1024)?,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenAiClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },
}

#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, OpenAiClientError> {
        let http = reqwest::Client::builder()
            .user_agent("vitalcol/triage-server")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiClientConfig {
        &self.config
    }

    pub async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
        timeout_override: Option<Duration>,
    ) -> Result<ChatCompletionResponse, OpenAiClientError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let timeout = timeout_override.unwrap_or(self.config.default_timeout);
        self.request_with_retry(|| {
            let req = request.clone();
            let url = url.clone();
            async move {
                let mut builder = self
                    .http
                    .post(&url)
                    .timeout(timeout)
                    .header("X-Title", "VitalCol - Asistente Medico")
                    .json(&req);
                if let Some(key) = &self.config.api_key {
                    builder = builder.bearer_auth(key);
                }
                let resp = builder.send().await?;
                Self::parse_json_response(resp, self.config.max_error_body_bytes).await
            }
        })
        .await
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, OpenAiClientError> {
        if resp.status().is_success() {
            let json = resp.json::<T>().await?;
            return Ok(json);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> OpenAiClientError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        upstream_error(status, body)
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, OpenAiClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, OpenAiClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "chat completion request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// `default` when `name` is unset, otherwise its parsed value.
pub fn parse_var<T>(
    var: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, CommonError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| CommonError::Config(format!("{name} is not a valid number ({raw}): {e}"))),
    }
}

fn upstream_error(status: StatusCode, body: String) -> OpenAiClientError {
    if let Ok(parsed) = serde_json::from_str::<OpenAiErrorEnvelope>(&body) {
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| "unknown upstream error".to_string());
        return OpenAiClientError::Upstream { status, message };
    }
    OpenAiClientError::UpstreamBody { status, body }
}

fn should_retry(err: &OpenAiClientError) -> bool {
    match err {
        OpenAiClientError::Request(e) => {
            e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
        }
        OpenAiClientError::Upstream { status, .. }
        | OpenAiClientError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        OpenAiClientError::InvalidJson(_) => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

pub(crate) async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorEnvelope {
    error: OpenAiErrorObject,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorObject {
    message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: Option<String>,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<ChatCompletionUsage>,
}

impl ChatCompletionResponse {
    /// Trimmed content of the first choice, `None` when missing or blank.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: Option<u32>,
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped_with_bounded_jitter() {
        let initial = Duration::from_millis(200);
        let max = Duration::from_millis(1_000);

        let first = backoff_delay(initial, max, 0);
        assert!(first >= Duration::from_millis(200) && first <= Duration::from_millis(250));

        let capped = backoff_delay(initial, max, 10);
        assert!(capped >= Duration::from_millis(1_000) && capped <= Duration::from_millis(1_250));

        // Huge exponents must not overflow.
        let huge = backoff_delay(initial, max, 200);
        assert!(huge <= Duration::from_millis(1_250));
    }

    #[test]
    fn retries_only_transient_upstream_statuses() {
        let throttled = OpenAiClientError::Upstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: "slow down".to_string(),
        };
        let unavailable = OpenAiClientError::UpstreamBody {
            status: StatusCode::BAD_GATEWAY,
            body: "<html>".to_string(),
        };
        let unauthorized = OpenAiClientError::Upstream {
            status: StatusCode::UNAUTHORIZED,
            message: "bad key".to_string(),
        };
        assert!(should_retry(&throttled));
        assert!(should_retry(&unavailable));
        assert!(!should_retry(&unauthorized));
    }

    #[test]
    fn upstream_error_prefers_json_message() {
        let err = upstream_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"model not found","type":"invalid_request"}}"#.to_string(),
        );
        match err {
            OpenAiClientError::Upstream { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "model not found");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = upstream_error(StatusCode::BAD_GATEWAY, "gateway down".to_string());
        assert!(matches!(err, OpenAiClientError::UpstreamBody { .. }));
    }

    #[test]
    fn config_defaults_when_unset() {
        let config = OpenAiClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
        assert!(!config.is_configured());
        assert_eq!(config.default_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_error_body_bytes, 8 * 1024);
    }

    #[test]
    fn config_reads_overrides_and_rejects_malformed_numbers() {
        fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
            move |name| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == name)
                    .map(|(_, v)| v.to_string())
            }
        }

        let config = OpenAiClientConfig::from_lookup(env(&[
            ("OPENAI_BASE_URL", "http://localhost:4000/v1/"),
            ("OPENAI_API_KEY", " sk-test "),
            ("OPENAI_TIMEOUT_SECS", "5"),
            ("OPENAI_MAX_RETRIES", " "),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:4000/v1");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.default_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 2);

        for name in [
            "OPENAI_TIMEOUT_SECS",
            "OPENAI_MAX_RETRIES",
            "OPENAI_RETRY_INITIAL_MS",
            "OPENAI_RETRY_MAX_MS",
            "OPENAI_MAX_ERROR_BODY_BYTES",
        ] {
            let lookup = |k: &str| (k == name).then(|| "thirty".to_string());
            let err = OpenAiClientConfig::from_lookup(lookup).unwrap_err();
            match err {
                CommonError::Config(msg) => assert!(msg.starts_with(name), "{msg}"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn first_content_skips_blank_replies() {
        let json = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  \n "},"finish_reason":"stop"}]}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_content(), None);

        let json = r#"{"choices":[{"message":{"content":"  Hola  "}}]}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_content(), Some("Hola"));
    }
}
