//! Defines routes for the transformation proxy.
//!
//! ## Structure
//! - **Transform endpoints** (catch-all — any path is an image path)
//!   - `GET  /{*path}` — fetch the image from the origin named in the
//!     request headers, transform per directive, answer the result
//!   - `POST /{*path}` — transform the request body per directive
//!
//! - **Health endpoints**
//!   - `GET /healthz` — liveness
//!   - `GET /readyz`  — readiness (runs the image engine once)
//!
//! The resize directive rides on the path itself (`/img/cat.jpg@80x60`) and
//! the `qlt`/`cmp`/`fmt` query arguments. Health routes register before the
//! wildcard and therefore shadow origin paths of the same name.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        resize_handlers::{get_resize, post_resize},
    },
    state::AppState,
};
use axum::{Router, routing::get};

/// Build and return the router for the whole inbound surface.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // everything else is an image path; the wildcard misses the bare
        // root, so that is routed explicitly
        .route("/", get(get_resize).post(post_resize))
        .route("/{*path}", get(get_resize).post(post_resize))
}
