mod api;
mod config;
mod db;
mod entities;
mod errors;
mod services;
mod system;

use std::error::Error;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::api::common::tracing::{
    make_custom_span, on_custom_failure, on_custom_request, on_custom_response,
};
use crate::config::Settings;
use crate::db::init_db;
use crate::errors::AppError;
use crate::services::deepgram::DeepgramClient;
use crate::services::media::YtDlpFetcher;
use crate::services::transcription::TranscriptionPipeline;
use crate::services::youtube_api::YoutubeClient;

#[derive(Clone)]
pub struct InnerState {
    pub db: SqlitePool,
    pub settings: Arc<Settings>,
    pub youtube: Option<YoutubeClient>,
    pub pipeline: TranscriptionPipeline,
}

impl InnerState {
    pub fn from_settings(db: SqlitePool, settings: Settings) -> Self {
        let youtube = settings.youtube_api_key.clone().map(YoutubeClient::new);
        let pipeline = TranscriptionPipeline::new(
            db.clone(),
            Arc::new(YtDlpFetcher::new(settings.temp_audio_dir.clone())),
            Arc::new(DeepgramClient::new(settings.deepgram_api_key.clone())),
            settings.transcript_output_dir.clone(),
        );

        Self {
            db,
            settings: Arc::new(settings),
            youtube,
            pipeline,
        }
    }

    pub fn youtube(&self) -> Result<&YoutubeClient, AppError> {
        self.youtube
            .as_ref()
            .ok_or_else(|| AppError::NotConfigured("YouTube API key not configured".to_string()))
    }
}

/// Routes and middleware shared by the server and router tests. The metrics
/// layer is added in `main` because its recorder can only be installed once.
pub fn build_app(state: InnerState) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);

    Router::new()
        .merge(system::create_system_router(state.clone()))
        .nest("/api/v1", api::create_api_router(state))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_custom_span)
                .on_request(on_custom_request)
                .on_response(on_custom_response)
                .on_failure(on_custom_failure),
        )
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&settings.transcript_output_dir).await?;
    tokio::fs::create_dir_all(settings.temp_audio_dir.join("videos")).await?;

    let db = init_db(&settings.database_url).await?;

    if settings.youtube_api_key.is_none() {
        tracing::warn!("YOUTUBE_API_KEY not set; channel metadata lookups are disabled");
    }
    if settings.deepgram_api_key.is_none() {
        tracing::warn!("DEEPGRAM_API_KEY not set; transcription jobs will fail");
    }

    let bind_address = settings.bind_address();
    let state = InnerState::from_settings(db, settings);

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = build_app(state)
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
