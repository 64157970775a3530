//! HTTP API, organised by version.

pub mod common;
pub mod v1;

use axum::Router;

use crate::InnerState;

#[tracing::instrument(name = "create_api_router", skip(state))]
pub fn create_api_router(state: InnerState) -> Router {
    tracing::info!("Creating API router with versioned endpoints");

    v1::routes::create_v1_routes(state)
}
