//! Idempotent webhook ingestion.
//!
//! The lookup before insert only short-circuits the common redelivery case.
//! Two concurrent deliveries can both miss it; the store's uniqueness
//! constraint then decides, and the loser is reported as a duplicate.

use chrono::Utc;
use std::sync::Arc;

use crate::domain::{NewTransaction, Transaction};
use crate::error::AppError;
use crate::ports::{StoreError, TransactionStore};
use crate::services::store_policy::StorePolicy;

const PROCESS_FAILED: &str = "Failed to process transaction";

/// Result of a successful ingestion. A redelivery is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Processed(String),
    Duplicate(String),
}

impl IngestOutcome {
    pub fn tx_id(&self) -> &str {
        match self {
            IngestOutcome::Processed(tx_id) | IngestOutcome::Duplicate(tx_id) => tx_id,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            IngestOutcome::Processed(_) => "processed",
            IngestOutcome::Duplicate(_) => "duplicate",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            IngestOutcome::Processed(_) => "Transaction stored successfully",
            IngestOutcome::Duplicate(_) => "Transaction was previously processed",
        }
    }
}

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn TransactionStore>,
    policy: StorePolicy,
}

impl IngestionService {
    pub fn new(store: Arc<dyn TransactionStore>, policy: StorePolicy) -> Self {
        Self { store, policy }
    }

    pub async fn ingest(&self, payload: NewTransaction) -> Result<IngestOutcome, AppError> {
        check_business_rules(&payload)?;

        let store = self.store.as_ref();
        let tx_id = payload.tx_id.clone();

        let existing = self
            .policy
            .run("find_transaction", || store.find_by_id(&tx_id))
            .await
            .map_err(|e| {
                tracing::error!(tx_id = %tx_id, operation = "find_transaction", error = %e, "Store lookup failed");
                AppError::database(PROCESS_FAILED, "find_transaction", e)
            })?;

        if existing.is_some() {
            tracing::info!(tx_id = %tx_id, "Transaction already processed");
            return Ok(IngestOutcome::Duplicate(tx_id));
        }

        let record = Transaction::create(payload, Utc::now());
        let mut attempts = 0u32;
        let insert_result = self
            .policy
            .run("insert_transaction", || {
                attempts += 1;
                store.insert(&record)
            })
            .await;

        match insert_result {
            Ok(()) => {
                tracing::info!(tx_id = %tx_id, amount = %record.amount, currency = %record.currency, "Transaction stored");
                Ok(IngestOutcome::Processed(tx_id))
            }
            // An earlier attempt may have committed before its error reached us.
            Err(StoreError::UniqueViolation(_)) if attempts > 1 => {
                self.resolve_retried_insert(&record).await
            }
            Err(StoreError::UniqueViolation(constraint)) => {
                tracing::info!(tx_id = %tx_id, constraint = %constraint, "Concurrent delivery lost the insert race");
                Ok(IngestOutcome::Duplicate(tx_id))
            }
            Err(e) => {
                tracing::error!(tx_id = %tx_id, operation = "insert_transaction", error = %e, "Store insert failed");
                Err(AppError::database(PROCESS_FAILED, "insert_transaction", e))
            }
        }
    }

    async fn resolve_retried_insert(&self, record: &Transaction) -> Result<IngestOutcome, AppError> {
        let store = self.store.as_ref();
        let tx_id = record.tx_id.clone();

        let stored = self
            .policy
            .run("find_transaction", || store.find_by_id(&tx_id))
            .await
            .map_err(|e| {
                tracing::error!(tx_id = %tx_id, operation = "find_transaction", error = %e, "Store lookup failed");
                AppError::database(PROCESS_FAILED, "find_transaction", e)
            })?;

        match stored {
            Some(stored) if is_same_write(&stored, record) => {
                tracing::info!(tx_id = %tx_id, "Retried insert had already committed");
                Ok(IngestOutcome::Processed(tx_id))
            }
            _ => {
                tracing::info!(tx_id = %tx_id, "Concurrent delivery won the insert race");
                Ok(IngestOutcome::Duplicate(tx_id))
            }
        }
    }
}

/// Postgres keeps microseconds, so timestamps are compared at that precision.
fn is_same_write(stored: &Transaction, record: &Transaction) -> bool {
    let drift = (stored.timestamp - record.timestamp)
        .num_microseconds()
        .map_or(false, |us| us.abs() <= 1);

    drift
        && stored.amount == record.amount
        && stored.currency == record.currency
        && stored.sender_account == record.sender_account
        && stored.receiver_account == record.receiver_account
        && stored.description == record.description
}

fn check_business_rules(payload: &NewTransaction) -> Result<(), AppError> {
    if payload.tx_id.trim().is_empty() {
        return Err(AppError::validation("Transaction ID cannot be empty", "tx_id"));
    }

    if payload.amount <= bigdecimal::BigDecimal::from(0) {
        return Err(AppError::validation_with_value(
            "Transaction amount must be positive",
            "amount",
            &payload.amount,
        ));
    }

    if payload.currency.trim().is_empty() {
        return Err(AppError::validation("Currency cannot be empty", "currency"));
    }

    if payload.sender_account.trim().is_empty() {
        return Err(AppError::validation(
            "Sender account cannot be empty",
            "sender_account",
        ));
    }

    if payload.receiver_account.trim().is_empty() {
        return Err(AppError::validation(
            "Receiver account cannot be empty",
            "receiver_account",
        ));
    }

    if payload.sender_account == payload.receiver_account {
        return Err(AppError::validation(
            "Sender and receiver accounts must be different",
            "accounts",
        ));
    }

    Ok(())
}
