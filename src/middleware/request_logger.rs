use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::utils::sanitize::{sanitize_headers, sanitize_json};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_BODY_LOG_SIZE: usize = 10 * 1024; // 10KB limit for body logging
const MAX_REQUEST_ID_LEN: usize = 128;

/// Signed or credential-bearing bodies are never logged.
const SKIP_BODY_PATHS: &[&str] = &["/webhook", "/auth", "/login"];

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogSettings {
    pub log_body: bool,
}

pub async fn request_logger_middleware(
    State(settings): State<RequestLogSettings>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = inbound_request_id(&req).unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    // Insert request ID into headers for downstream handlers
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let span = tracing::info_span!("request", request_id = %request_id);

    tracing::debug!(
        parent: &span,
        method = %method,
        uri = %uri,
        headers = ?sanitize_headers(req.headers()),
        "Request headers"
    );

    if settings.log_body && should_log_body(&req) {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BODY_LOG_SIZE).await {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(
                    parent: &span,
                    method = %method,
                    uri = %uri,
                    "Failed to read request body"
                );
                return with_request_id(
                    (StatusCode::BAD_REQUEST, "Failed to read request body").into_response(),
                    &request_id,
                );
            }
        };

        let sanitized_body = match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(json) => sanitize_json(&json).to_string(),
            Err(_) => format!("[non-json, {} bytes]", bytes.len()),
        };

        tracing::info!(
            parent: &span,
            method = %method,
            uri = %uri,
            body_size = bytes.len(),
            body = %sanitized_body,
            "Incoming request"
        );

        // Reconstruct request with body
        req = Request::from_parts(parts, Body::from(bytes));
    } else {
        tracing::info!(
            parent: &span,
            method = %method,
            uri = %uri,
            "Incoming request"
        );
    }

    let response = next.run(req).instrument(span.clone()).await;

    let latency_ms = start.elapsed().as_millis();
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(parent: &span, method = %method, uri = %uri, status = status.as_u16(), latency_ms, "Outgoing response");
    } else if status.is_client_error() {
        tracing::warn!(parent: &span, method = %method, uri = %uri, status = status.as_u16(), latency_ms, "Outgoing response");
    } else {
        tracing::info!(parent: &span, method = %method, uri = %uri, status = status.as_u16(), latency_ms, "Outgoing response");
    }

    with_request_id(response, &request_id)
}

/// Keeps a caller's id when it is short and limited to `[A-Za-z0-9._-]`.
fn inbound_request_id(req: &Request) -> Option<String> {
    let id = req.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?;
    let well_formed = !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    well_formed.then(|| id.to_string())
}

fn should_log_body(req: &Request) -> bool {
    if SKIP_BODY_PATHS.contains(&req.uri().path()) {
        return false;
    }

    // Only bodies that announce a small length are buffered for logging.
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .map(|len| len > 0 && len <= MAX_BODY_LOG_SIZE)
        .unwrap_or(false)
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
