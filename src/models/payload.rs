//! An image body moving through the pipeline.

use bytes::Bytes;

/// Raw image bytes plus the content type declared for them.
///
/// Used both for the source image (fetched from the origin or taken from the
/// request body) and for the finished response payload. `Bytes` keeps the
/// degrade-to-original fallback a cheap clone rather than a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Bytes,

    /// Declared MIME type. Origins are free to omit it; response assembly
    /// falls back to `application/octet-stream`.
    pub content_type: Option<String>,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }
}
