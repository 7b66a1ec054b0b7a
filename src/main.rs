use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::directive_service::DirectiveService;
use services::fetch_service::OriginFetcher;
use services::proxy_service::ProxyService;
use services::transform_service::{ImageEngine, RasterEngine};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting resize-proxy with config: {:?}", cfg);

    let config = Arc::new(cfg);

    // --- Outbound client (the one shared pool for the whole process) ---
    let fetcher =
        OriginFetcher::new(&config).context("building the outbound HTTP client")?;

    // --- Image engine ---
    let engine: Arc<dyn ImageEngine> = Arc::new(RasterEngine);

    // --- Core services ---
    let state = AppState {
        directives: DirectiveService::new(config.clone()),
        proxy: ProxyService::new(config.clone(), fetcher, engine),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = config.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(config.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", config.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
