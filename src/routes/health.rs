/**
 * Health Routes
 * Liveness, readiness, and dependency checks
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::routes::AppState;

lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

/// Result of probing one dependency
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceCheck {
    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub database: ServiceCheck,
    pub section_store: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

async fn check_database() -> ServiceCheck {
    match crate::db::health_check().await {
        Ok(duration) => ServiceCheck {
            status: "healthy".to_string(),
            response_time: Some(duration.as_millis() as u64),
            error: None,
        },
        Err(e) => ServiceCheck {
            status: "unhealthy".to_string(),
            response_time: None,
            error: Some(e.to_string()),
        },
    }
}

fn store_label(state: &AppState) -> String {
    if state.sections.is_some() {
        "configured".to_string()
    } else {
        "not configured".to_string()
    }
}

/// GET /health
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/detailed
/// Always "ok" while the process serves requests; dependency state is in `checks`.
pub async fn health_detailed(State(state): State<AppState>) -> impl IntoResponse {
    let response = DetailedHealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime: SERVER_START.elapsed().as_secs(),
        checks: HealthChecks {
            database: check_database().await,
            section_store: store_label(&state),
        },
    };

    (StatusCode::OK, Json(response))
}

/// GET /health/database
pub async fn health_database() -> impl IntoResponse {
    (StatusCode::OK, Json(check_database().await))
}

/// GET /health/ready
/// Running without a database is allowed; only a pool that stops answering
/// makes the service not ready.
pub async fn health_ready() -> impl IntoResponse {
    let uptime = SERVER_START.elapsed().as_secs();

    let reason = if crate::db::get_pool().is_some() && !check_database().await.is_healthy() {
        Some("Database is not healthy".to_string())
    } else {
        None
    };

    let status = if reason.is_none() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if reason.is_none() { "ready" } else { "not ready" }.to_string(),
            timestamp: Utc::now(),
            uptime,
            reason,
        }),
    )
}
