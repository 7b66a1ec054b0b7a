//! src/services/fetch_service.rs
//!
//! OriginFetcher — retrieves the source image from the origin over HTTP.
//! Pure I/O: a single GET per request, no retries, no transform logic.
//! Retry policy, if anyone ever wants one, belongs to the caller.

use crate::config::AppConfig;
use crate::models::payload::ImagePayload;
use axum::http::StatusCode;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Fixed identity sent with every origin request.
pub const USER_AGENT: &str = concat!("resize-proxy/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("origin answered status {status}")]
    UpstreamStatus { status: StatusCode },
    #[error("transport failure talking to origin: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Status the proxy should answer with: the origin's own status when it
    /// responded at all, 500 for transport-level failures.
    pub fn status(&self) -> StatusCode {
        match self {
            FetchError::UpstreamStatus { status } => *status,
            FetchError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Holds the one outbound client for the process. Constructed at startup
/// from injected configuration and passed by handle, so tests can point it
/// at a mock origin instead of relying on a hidden global.
#[derive(Clone)]
pub struct OriginFetcher {
    client: Client,
}

impl OriginFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch the raw image bytes and declared content type for `url`.
    ///
    /// The body is read to completion on every path, non-200 included, so
    /// the connection always goes back to the pool drained.
    pub async fn fetch(&self, url: &Url) -> Result<ImagePayload, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let bytes = response.bytes().await?;
        if status != StatusCode::OK {
            return Err(FetchError::UpstreamStatus { status });
        }

        Ok(ImagePayload::new(bytes, content_type))
    }
}
