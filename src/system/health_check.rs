use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::InnerState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub service: &'static str,
    pub version: &'static str,
    pub environment: HealthEnvironment,
}

/// Configuration summary. Secrets are only reported as present or absent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEnvironment {
    pub debug: bool,
    pub log_level: String,
    pub max_concurrent_jobs: usize,
    pub database_url: String,
    pub has_youtube_api_key: bool,
    pub has_deepgram_api_key: bool,
}

fn mask_database_url(url: &str) -> String {
    if url.contains("://") {
        "***".to_string()
    } else {
        url.to_string()
    }
}

pub async fn health_check(State(inner): State<InnerState>) -> Json<HealthResponse> {
    let settings = &inner.settings;
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        service: "YouTube Transcription Tool API",
        version: env!("CARGO_PKG_VERSION"),
        environment: HealthEnvironment {
            debug: settings.debug,
            log_level: settings.log_level.clone(),
            max_concurrent_jobs: settings.max_concurrent_jobs,
            database_url: mask_database_url(&settings.database_url),
            has_youtube_api_key: settings.youtube_api_key.is_some(),
            has_deepgram_api_key: settings.deepgram_api_key.is_some(),
        },
    })
}

/// Ready once the database answers.
pub async fn readiness_check(State(inner): State<InnerState>) -> (StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&inner.db).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

pub async fn liveness_check() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}
