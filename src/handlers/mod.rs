pub mod webhook;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::health::{check_health, StoreChecker};
use crate::AppState;

pub const SERVICE_NAME: &str = "AutoPay";

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub description: &'static str,
}

/// `GET /` liveness probe. Touches no dependencies.
pub async fn root() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "active",
        service: SERVICE_NAME,
        description: "Secure webhook payment processing system is running",
    })
}

/// `GET /health`. 503 when the store is unreachable.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let checker = StoreChecker::new(state.store.clone());
    let response = check_health(&checker, state.start_time).await;

    let status_code = if response.is_unhealthy() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}
