//! Health check handlers

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use crate::AppState;
use papervault_common::errors::AppError;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: CheckResult,
    pub storage: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn from_probe(result: papervault_common::Result<()>, start: std::time::Instant) -> Self {
        match result {
            Ok(()) => CheckResult {
                status: "up".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => CheckResult {
                status: "down".to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: papervault_common::VERSION,
    })
}

/// Readiness probe - checks the database and the upload directory
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let start = std::time::Instant::now();
    let database = CheckResult::from_probe(state.db.ping().await, start);

    let start = std::time::Instant::now();
    let storage = CheckResult::from_probe(state.files.check().await, start);

    let all_healthy = database.is_up() && storage.is_up();
    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks { database, storage },
        }),
    )
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(ref handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => AppError::NotFound {
            resource_type: "endpoint".to_string(),
            id: "/metrics".to_string(),
        }
        .into_response(),
    }
}
