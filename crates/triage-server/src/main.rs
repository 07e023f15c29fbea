mod cache;
mod config;
mod directory;
mod error;
mod facilities;
mod guidance;
mod http;
mod rate_limit;
mod server;
mod triage;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vitalcol_common::openai::OpenAiClient;
use vitalcol_common::postgrest::PostgrestClient;
use vitalcol_common::redis::RedisCache;

use cache::FacilityCache;
use config::Config;
use directory::Directory;
use error::AppError;
use facilities::FacilityService;
use guidance::{GuidanceService, LlmGuidance};
use server::VitalColServer;
use triage::TriageService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting vitalcol triage server");

    let config = Config::from_env()?;
    info!(
        http = config.http_listen_addr.is_some(),
        redis = config.redis_url.is_some(),
        supabase = config.supabase.is_some(),
        guidance_model = %config.guidance_model,
        "configuration loaded"
    );

    let directory = open_directory(&config)?;
    info!(backend = directory.backend_name(), "facility directory ready");

    let redis_cache = RedisCache::new(config.redis_url.as_deref());
    if redis_cache.is_available().await {
        info!("redis connected");
    } else {
        info!("redis unavailable, running without cache");
    }
    let facilities = FacilityService::new(directory, FacilityCache::new(redis_cache));

    let guidance = if config.openai.is_configured() {
        info!(
            base_url = %config.openai.base_url,
            timeout_ms = config.openai.default_timeout.as_millis(),
            max_retries = config.openai.max_retries,
            "openai client configured"
        );
        let client = Arc::new(OpenAiClient::new(config.openai.clone())?);
        let limiter = config.rate_limit_rps.and_then(rate_limit::RateLimiter::new);
        if let Some(limiter) = &limiter {
            info!(rps = limiter.rps(), "guidance rate limit enabled");
        }
        GuidanceService::new(Some(LlmGuidance::new(
            client,
            config.guidance_model.clone(),
            limiter,
        )))
    } else {
        info!("OPENAI_API_KEY not set, guidance uses templates only");
        GuidanceService::template_only()
    };
    let triage = TriageService::new(guidance);

    if let Some(addr) = config.http_listen_addr {
        let app = http::router(http::AppState { triage, facilities });
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "HTTP API ready");
        axum::serve(listener, app).await?;
        info!("HTTP API shut down");
    } else {
        let server = VitalColServer::new(triage, facilities);
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}

/// Supabase when configured, else the directory file, else the bundled directory.
fn open_directory(config: &Config) -> Result<Directory, AppError> {
    if let Some(supabase) = &config.supabase {
        return Ok(Directory::Supabase(PostgrestClient::new(supabase.clone())?));
    }
    match &config.directory_path {
        Some(path) => Ok(Directory::from_path(path)?),
        None => Ok(Directory::bundled()?),
    }
}
