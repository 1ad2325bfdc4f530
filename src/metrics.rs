use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;

use crate::error::ErrorKind;

pub const MONITORING_KEY_HEADER: &str = "x-monitoring-key";
const NAMESPACE: &str = "autopay";

/// Prometheus collectors for the HTTP surface and ingestion outcomes.
#[derive(Clone)]
pub struct Metrics {
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub errors_total: IntCounterVec,
    pub webhook_outcomes_total: IntCounterVec,
    registry: Arc<Registry>,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
            &["method", "path", "status"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Errors returned to clients, by kind").namespace(NAMESPACE),
            &["kind", "path"],
        )?;

        let webhook_outcomes_total = IntCounterVec::new(
            Opts::new("webhook_outcomes_total", "Accepted webhook deliveries, by outcome")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(webhook_outcomes_total.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
            webhook_outcomes_total,
            registry: Arc::new(registry),
        })
    }

    pub fn record_request(
        &self,
        method: &str,
        path: &str,
        status: u16,
        duration: std::time::Duration,
    ) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration.as_secs_f64());
    }

    pub fn record_error(&self, kind: ErrorKind, path: &str) {
        self.errors_total
            .with_label_values(&[kind.as_str(), path])
            .inc();
    }

    pub fn record_webhook_outcome(&self, outcome: &str) {
        self.webhook_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Text exposition format of every registered collector.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Route-level layer: counts requests and the error kind carried by
/// `AppError` responses. Paths are the matched route templates, so ids do
/// not inflate label cardinality.
pub async fn metrics_middleware(
    State(metrics): State<Metrics>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(req).await;

    metrics.record_request(&method, &path, response.status().as_u16(), start.elapsed());
    if let Some(kind) = response.extensions().get::<ErrorKind>() {
        metrics.record_error(*kind, &path);
    }

    response
}

pub async fn metrics_handler(State(metrics): State<Metrics>) -> Response {
    exposition_response(metrics.render())
}

/// Encoding failures are logged and returned as a bare 500 outside `AppError`.
fn exposition_response(rendered: Result<String, prometheus::Error>) -> Response {
    match rendered {
        Ok(body) => {
            let mut response = body.into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Expected `X-Monitoring-Key`. `None` closes the endpoint to everyone.
#[derive(Clone, Default)]
pub struct MonitoringKey(pub Option<Arc<str>>);

impl MonitoringKey {
    pub fn new(key: Option<&str>) -> Self {
        Self(key.filter(|k| !k.is_empty()).map(Arc::from))
    }

    fn matches(&self, provided: &str) -> bool {
        match &self.0 {
            Some(expected) => expected.as_bytes().ct_eq(provided.as_bytes()).into(),
            None => false,
        }
    }
}

pub async fn metrics_auth_middleware(
    State(key): State<MonitoringKey>,
    request: Request,
    next: Next,
) -> Response {
    if key.0.is_none() {
        tracing::warn!("Monitoring endpoint requested but MONITORING_API_KEY is not set");
        return forbidden("Monitoring access not configured");
    }

    let provided = request
        .headers()
        .get(MONITORING_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() || !key.matches(provided) {
        tracing::warn!("Rejected monitoring request with invalid credentials");
        return forbidden("Invalid monitoring credentials");
    }

    next.run(request).await
}

fn forbidden(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "Forbidden", "message": message })),
    )
        .into_response()
}
