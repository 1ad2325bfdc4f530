pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod ports;
pub mod security;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::{Metrics, MonitoringKey};
use crate::middleware::rate_limit::RouteRateLimiter;
use crate::middleware::request_logger::RequestLogSettings;
use crate::ports::TransactionStore;
use crate::security::SignatureVerifier;
use crate::services::{IngestionService, RetrievalService};

#[derive(Clone)]
pub struct AppState {
    pub ingestion: IngestionService,
    pub retrieval: RetrievalService,
    pub verifier: Arc<SignatureVerifier>,
    pub store: Arc<dyn TransactionStore>,
    pub webhook_limiter: RouteRateLimiter,
    pub api_limiter: RouteRateLimiter,
    pub metrics: Metrics,
    pub monitoring_key: MonitoringKey,
    pub request_log: RequestLogSettings,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn TransactionStore>) -> anyhow::Result<Self> {
        let verifier = SignatureVerifier::new(
            config.hmac_secret_key.as_deref(),
            config.max_webhook_age_seconds,
        );
        if !verifier.is_configured() {
            tracing::warn!("HMAC_SECRET_KEY is not set; every webhook will be rejected");
        }

        let policy = config.store_policy();
        let metrics = Metrics::new()
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics: {}", e))?;

        Ok(Self {
            ingestion: IngestionService::new(store.clone(), policy),
            retrieval: RetrievalService::new(store.clone(), policy),
            verifier: Arc::new(verifier),
            store,
            webhook_limiter: RouteRateLimiter::new(config.webhook_rate_limit),
            api_limiter: RouteRateLimiter::new(config.api_rate_limit),
            metrics,
            monitoring_key: MonitoringKey::new(config.monitoring_api_key.as_deref()),
            request_log: RequestLogSettings {
                log_body: config.log_request_body,
            },
            start_time: Instant::now(),
        })
    }
}

impl FromRef<AppState> for Metrics {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

pub fn create_app(state: AppState) -> Router {
    let metrics_route = Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .route_layer(from_fn_with_state(
            state.monitoring_key.clone(),
            metrics::metrics_auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/webhook", post(handlers::webhook::receive_webhook))
        .route(
            "/transaction/:tx_id",
            get(handlers::webhook::get_transaction),
        )
        .merge(metrics_route)
        .route_layer(from_fn_with_state(
            state.metrics.clone(),
            metrics::metrics_middleware,
        ))
        .layer(from_fn_with_state(
            state.request_log,
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
