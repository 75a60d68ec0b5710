//! HTTP handlers. Each one extracts, delegates to `crate::services`, and wraps
//! the result; business rules live in the services.

pub mod activities;
pub mod auth;
pub mod banned;
pub mod emergency;
pub mod errors;
pub mod extract;
pub mod incidents;
pub mod sites;
pub mod subscriptions;
pub mod visitors;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Axum handler for `GET /api/health`.
pub async fn health_handler() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse { status: "ok" })
}
