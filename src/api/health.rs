//! Health check endpoints

use crate::cache::UserCache;
use crate::state::HasGateway;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness: the cache backend must answer a ping.
pub async fn ready<S: HasGateway>(State(state): State<S>) -> impl IntoResponse {
    match state.gateway().cache().ping().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(op = "cache_ping", error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
        }
    }
}
