use crate::services::directive_service::ParseError;
use crate::services::proxy_service::ProxyError;
use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// A lightweight wrapper for request failures that keeps the message local.
///
/// Unlike a JSON API, an image proxy answers bytes or nothing: the message is
/// logged server-side and the client gets a bare status with an empty body.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(status = %self.status, "{}", self.message);
        (self.status, Body::empty()).into_response()
    }
}

/// Malformed directives are always the client's fault.
impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

/// Pipeline failures carry their own status: the origin's where known,
/// 500 otherwise.
impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        AppError::new(err.status(), err.to_string())
    }
}
