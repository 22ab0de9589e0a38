// src/routes/health.rs
//! Liveness endpoint.
//!
//! `GET /health` answers without touching the database, so orchestrators can
//! tell a running process apart from a reachable store.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Subrouter with the single `GET /health` route, generic over the gateway
/// state so it merges regardless of what the other routes share.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
