//! HTTP handlers for the two transform flows.
//! Derives the directive from the raw request and delegates the actual work
//! to `ProxyService`; nothing here touches pixel data or the network.

use crate::{
    errors::AppError,
    models::{directive::Flow, payload::ImagePayload},
    state::AppState,
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::Response,
};
use bytes::Bytes;
use tracing::debug;

/// GET `/{*path}` — fetch the source image from the origin named by the
/// request headers, transform it per directive, and answer the result.
pub async fn get_resize(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let directive = state.directives.parse(Flow::Fetch, &uri, &headers)?;
    debug!(source = %directive.source_display(), "handling fetch-flow request");

    let payload = state.proxy.fetch_and_transform(&directive).await?;
    Ok(image_response(&payload))
}

/// POST `/{*path}` — transform the request's own body per directive. No
/// origin fetch; the source header only feeds log lines here.
pub async fn post_resize(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let directive = state.directives.parse(Flow::Direct, &uri, &headers)?;
    debug!(
        source = %directive.source_display(),
        bytes = body.len(),
        "handling direct-body request"
    );

    let payload = state.proxy.transform_body(&directive, body).await?;
    Ok(image_response(&payload))
}

/// Assemble the 200 response around a finished payload.
fn image_response(payload: &ImagePayload) -> Response {
    let mut response = Response::new(Body::from(payload.bytes.clone()));
    *response.status_mut() = StatusCode::OK;
    set_payload_headers(response.headers_mut(), payload);
    response
}

fn set_payload_headers(headers: &mut HeaderMap, payload: &ImagePayload) {
    let content_type = payload
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&payload.bytes.len().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
}
