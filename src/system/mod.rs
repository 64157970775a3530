//! Unversioned operational routes.

pub mod health_check;

use axum::{routing::get, Router};

use crate::InnerState;

#[tracing::instrument(name = "create_system_router", skip(state))]
pub fn create_system_router(state: InnerState) -> Router {
    tracing::info!("Creating system router");

    Router::new()
        .route("/health", get(health_check::health_check))
        .route("/health/ready", get(health_check::readiness_check))
        .route("/health/live", get(health_check::liveness_check))
        .with_state(state)
}
