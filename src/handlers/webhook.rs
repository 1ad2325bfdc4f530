use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::middleware::rate_limit::ClientKey;
use crate::security::signature::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::services::IngestOutcome;
use crate::validation::WebhookPayload;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub message: String,
    pub status: String,
    pub tx_id: String,
}

impl From<IngestOutcome> for PaymentResponse {
    fn from(outcome: IngestOutcome) -> Self {
        PaymentResponse {
            success: true,
            message: outcome.message().to_string(),
            status: outcome.status().to_string(),
            tx_id: outcome.tx_id().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub success: bool,
    pub message: String,
    pub status: String,
    pub transaction: Transaction,
}

/// `POST /webhook`. The signature is checked over the exact received bytes
/// before anything else looks at the body.
pub async fn receive_webhook(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PaymentResponse>, AppError> {
    state.verifier.verify_now(
        header_str(&headers, TIMESTAMP_HEADER),
        header_str(&headers, SIGNATURE_HEADER),
        &body,
    )?;

    let new_tx = WebhookPayload::from_slice(&body)?.validate()?;

    state.webhook_limiter.check(&client)?;

    let outcome = state.ingestion.ingest(new_tx).await?;
    state.metrics.record_webhook_outcome(outcome.status());

    Ok(Json(PaymentResponse::from(outcome)))
}

/// `GET /transaction/:tx_id`
pub async fn get_transaction(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    Path(tx_id): Path<String>,
) -> Result<Json<TransactionResponse>, AppError> {
    state.api_limiter.check(&client)?;

    let transaction = state.retrieval.get_by_id(&tx_id).await?;

    Ok(Json(TransactionResponse {
        success: true,
        message: "Transaction found successfully".to_string(),
        status: "found".to_string(),
        transaction,
    }))
}

/// Missing and non-UTF-8 header values are treated alike.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
