//! Health check endpoints.
//!
//! `/health` returns 200 when both PostgreSQL and Redis are reachable and
//! 503 otherwise. `/health/live` only reports that the process is serving.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct Checks {
    postgres: bool,
    redis: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    checks: Checks,
    /// Entries in the in-process cache tier.
    cached_entries: u64,
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (postgres, redis) = tokio::join!(state.postgres_healthy(), state.redis_healthy());
    let healthy = postgres && redis;

    let status_code = if healthy {
        StatusCode::OK
    } else {
        tracing::warn!(postgres, redis, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            version: env!("CARGO_PKG_VERSION"),
            checks: Checks { postgres, redis },
            cached_entries: state.cache().l1_entry_count(),
        }),
    )
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
