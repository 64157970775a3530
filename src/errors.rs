use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error as StdError;

use crate::services::youtube_api::YoutubeError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict error: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("YouTube API quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("YouTube API access denied: {0}")]
    AccessDenied(String),

    #[error("External service error: {0}")]
    ExternalService(#[source] anyhow::Error),

    #[error("Service not configured: {0}")]
    NotConfigured(String),

    #[error("An unexpected error occurred: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", e),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::QuotaExceeded(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("YouTube API quota exceeded: {}", msg),
            ),
            AppError::AccessDenied(msg) => (
                StatusCode::FORBIDDEN,
                format!("YouTube API access denied: {}", msg),
            ),
            AppError::ExternalService(e) => (
                StatusCode::BAD_GATEWAY,
                format!("External service error: {}", e),
            ),
            AppError::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Unexpected(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An unexpected error occurred: {}", e),
            ),
        };

        tracing::error!(
            error_type = %self,
            error_message = %error_message,
            status_code = %status,
            "Request error"
        );

        if let AppError::Unexpected(e) | AppError::Database(e) | AppError::ExternalService(e) =
            &self
        {
            let mut source_chain = String::new();
            let mut current_err: Option<&(dyn StdError + 'static)> = e.chain().nth(1);
            while let Some(err) = current_err {
                source_chain.push_str(&format!("\n  Caused by: {}", err));
                current_err = err.source();
            }
            if !source_chain.is_empty() {
                tracing::error!("Error source chain:{}", source_chain);
            }
        }

        let body = Json(json!({
            "message": error_message,
            "status": status.as_u16()
        }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Database record not found".to_string()),
            _ => AppError::Database(anyhow::Error::new(err).context("SQLx operation failed")),
        }
    }
}

impl From<YoutubeError> for AppError {
    fn from(err: YoutubeError) -> Self {
        match err {
            YoutubeError::QuotaExceeded(msg) => AppError::QuotaExceeded(msg),
            YoutubeError::AccessDenied(msg) => AppError::AccessDenied(msg),
            YoutubeError::NotFound(msg) => AppError::NotFound(msg),
            YoutubeError::Transport(e) => AppError::from(e),
            other @ YoutubeError::Provider { .. } => {
                AppError::ExternalService(anyhow::Error::new(other))
            }
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let mut context_parts = Vec::new();

        if let Some(url) = err.url() {
            // Provider keys travel as query parameters; keep them out of responses.
            let mut url = url.clone();
            url.set_query(None);
            context_parts.push(format!("URL: {}", url));
        }

        if let Some(status) = err.status() {
            context_parts.push(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            ));
        }

        let error_type = match &err {
            e if e.is_timeout() => "Request Timeout",
            e if e.is_connect() => "Connection Failed",
            e if e.is_decode() => "Response Decode Failed",
            e if e.is_redirect() => "Redirect Loop or Invalid Redirect",
            e if e.is_request() => "Invalid Request",
            e if e.is_body() => "Request Body Error",
            _ => "Unknown HTTP Error",
        };
        context_parts.push(format!("Type: {}", error_type));

        let context = format!("External HTTP request failed - {}", context_parts.join(", "));

        tracing::error!(
            error = %err,
            status = ?err.status(),
            is_timeout = err.is_timeout(),
            is_connect = err.is_connect(),
            is_decode = err.is_decode(),
            "HTTP request failed with detailed context"
        );

        AppError::ExternalService(anyhow::Error::new(err.without_url()).context(context))
    }
}
