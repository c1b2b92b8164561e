use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::{ApiResponse, AppState};

const CACHE_PROBE_KEY: &str = "health:probe";

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
    pub cache: ComponentHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub checks: HealthChecks,
}

fn component<E: std::fmt::Display>(started: Instant, result: Result<(), E>) -> ComponentHealth {
    let latency_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(()) => ComponentHealth {
            status: ComponentStatus::Up,
            latency_ms,
            message: None,
        },
        Err(e) => ComponentHealth {
            status: ComponentStatus::Down,
            latency_ms,
            message: Some(e.to_string()),
        },
    }
}

/// GET /health: database ping and cache round-trip.
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let started = Instant::now();
    let database = component(started, crate::db::check_connection(&state.db).await);

    let started = Instant::now();
    let cache_result = match state
        .cache
        .set(CACHE_PROBE_KEY, "1", Some(Duration::from_secs(5)))
        .await
    {
        Ok(()) => state.cache.get(CACHE_PROBE_KEY).await.map(|_| ()),
        Err(e) => Err(e),
    };
    let cache = component(started, cache_result);

    let healthy = database.status == ComponentStatus::Up && cache.status == ComponentStatus::Up;
    if !healthy {
        warn!(database = ?database.status, cache = ?cache.status, "health check failed");
    }

    let response = HealthResponse {
        status: if healthy {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks { database, cache },
    };
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(ApiResponse::success(response)))
}
