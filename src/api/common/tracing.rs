//! Span and event hooks for `tower_http::trace::TraceLayer`.

use std::time::Duration;

use axum::http::{HeaderMap, Request, Response};
use tower_http::classify::ServerErrorsFailureClass;
use tracing::{info_span, Span};

const REDACTED_MARKERS: [&str; 4] = ["authorization", "cookie", "token", "api-key"];

fn loggable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let lowered = name.as_str().to_lowercase();
            if REDACTED_MARKERS.iter().any(|m| lowered.contains(m)) {
                Some((name.to_string(), "[REDACTED]".to_string()))
            } else {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            }
        })
        .collect()
}

pub fn make_custom_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        query = ?request.uri().query(),
        request_id = request_id,
        user_agent = ?request.headers().get("user-agent"),
    )
}

pub fn on_custom_request<B>(request: &Request<B>, _span: &Span) {
    tracing::debug!(
        method = %request.method(),
        uri = %request.uri(),
        headers = ?loggable_headers(request.headers()),
        "Incoming HTTP request"
    );
}

/// Logs at info for 1xx-3xx, warn for 4xx, error for 5xx.
pub fn on_custom_response<B>(response: &Response<B>, latency: Duration, _span: &Span) {
    let status = response.status();
    let latency_ms = latency.as_millis();

    if status.is_server_error() {
        tracing::error!(status = %status, latency_ms, "HTTP request completed with server error");
    } else if status.is_client_error() {
        tracing::warn!(status = %status, latency_ms, "HTTP request completed with client error");
    } else {
        tracing::info!(status = %status, latency_ms, "HTTP request completed");
    }
}

pub fn on_custom_failure(error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
    let error_type = match &error {
        ServerErrorsFailureClass::StatusCode(code) => format!("HTTP {}", code.as_u16()),
        ServerErrorsFailureClass::Error(_) => "Internal Error".to_string(),
    };

    tracing::error!(
        error = ?error,
        latency_ms = latency.as_millis(),
        error_type = error_type,
        "HTTP request failed"
    );
}
