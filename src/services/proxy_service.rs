//! src/services/proxy_service.rs
//!
//! ProxyService — the request pipeline. Orchestrates fetch → transform for
//! the fetch flow and transform-only for the direct-body flow, applying the
//! configured partial-failure fallbacks. HTTP status mapping stays in the
//! handlers; this layer decides *what* to answer, not how to frame it.

use crate::config::AppConfig;
use crate::models::directive::TransformDirective;
use crate::models::payload::ImagePayload;
use crate::services::fetch_service::{FetchError, OriginFetcher};
use crate::services::transform_service::{ImageEngine, TransformError};
use axum::http::StatusCode;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// 1x1 transparent PNG fed through the engine by the readiness probe.
const PROBE_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0xf8, 0x5f, 0x0f, 0x00, 0x02, 0x87, 0x01, 0x80, 0xeb, 0x47, 0xba, 0x92, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("fetch flow reached the pipeline without a source URL")]
    MissingSourceUrl,
    #[error("transform task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Fetch(err) => err.status(),
            ProxyError::Transform(_) | ProxyError::MissingSourceUrl | ProxyError::TaskJoin(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;

/// The pipeline: read-only config snapshot, the shared outbound fetcher, and
/// the image engine. Cheap to clone into each request handler.
#[derive(Clone)]
pub struct ProxyService {
    config: Arc<AppConfig>,
    fetcher: OriginFetcher,
    engine: Arc<dyn ImageEngine>,
}

impl ProxyService {
    pub fn new(
        config: Arc<AppConfig>,
        fetcher: OriginFetcher,
        engine: Arc<dyn ImageEngine>,
    ) -> Self {
        Self {
            config,
            fetcher,
            engine,
        }
    }

    /// Fetch flow: retrieve the source image from the origin, then transform.
    ///
    /// Fallbacks, in order: fetch failures propagate untouched; a zero-length
    /// body short-circuits past the engine when `skip_empty_images` is set;
    /// a transform failure degrades to the original fetched payload when
    /// `skip_resize_errors` is set.
    pub async fn fetch_and_transform(
        &self,
        directive: &TransformDirective,
    ) -> ProxyResult<ImagePayload> {
        let url = directive
            .source_url
            .as_ref()
            .ok_or(ProxyError::MissingSourceUrl)?;
        let source = self.fetcher.fetch(url).await?;

        if self.config.skip_empty_images && source.bytes.is_empty() {
            warn!(source = %url, "empty image skipped, passing through");
            return Ok(source);
        }

        match self.run_engine(source.bytes.clone(), directive.clone()).await {
            Ok(transformed) => Ok(transformed),
            Err(ProxyError::Transform(err)) if self.config.skip_resize_errors => {
                warn!(source = %url, error = %err, "transform failed, passing original through");
                Ok(source)
            }
            Err(err) => Err(err),
        }
    }

    /// Direct-body flow: transform the client-supplied bytes.
    ///
    /// No degrade-to-original here: echoing back the untransformed client
    /// body would defeat the flow's purpose, so failures stay failures
    /// whatever `skip_resize_errors` says.
    pub async fn transform_body(
        &self,
        directive: &TransformDirective,
        body: Bytes,
    ) -> ProxyResult<ImagePayload> {
        self.run_engine(body, directive.clone()).await
    }

    /// Run the engine over a tiny known-good image. Used by the readiness
    /// probe.
    pub async fn probe_engine(&self) -> ProxyResult<()> {
        let directive = TransformDirective {
            source_url: None,
            width: 0,
            height: 0,
            quality: self.config.default_quality,
            compression: self.config.default_compression,
            format: None,
        };
        self.run_engine(Bytes::from_static(PROBE_PNG), directive)
            .await
            .map(|_| ())
    }

    /// The engine is synchronous and CPU-bound; keep it off the reactor.
    async fn run_engine(
        &self,
        bytes: Bytes,
        directive: TransformDirective,
    ) -> ProxyResult<ImagePayload> {
        let engine = Arc::clone(&self.engine);
        let payload =
            tokio::task::spawn_blocking(move || engine.transform(&bytes, &directive)).await??;
        Ok(payload)
    }
}
