use std::sync::Arc;

use crate::domain::Transaction;
use crate::error::AppError;
use crate::ports::TransactionStore;
use crate::services::store_policy::StorePolicy;

/// Read-only lookup of stored transactions.
#[derive(Clone)]
pub struct RetrievalService {
    store: Arc<dyn TransactionStore>,
    policy: StorePolicy,
}

impl RetrievalService {
    pub fn new(store: Arc<dyn TransactionStore>, policy: StorePolicy) -> Self {
        Self { store, policy }
    }

    pub async fn get_by_id(&self, tx_id: &str) -> Result<Transaction, AppError> {
        let store = self.store.as_ref();

        let found = self
            .policy
            .run("find_transaction", || store.find_by_id(tx_id))
            .await
            .map_err(|e| {
                tracing::error!(tx_id = %tx_id, operation = "find_transaction", error = %e, "Store lookup failed");
                AppError::database("Failed to retrieve transaction", "find_transaction", e)
            })?;

        found.ok_or_else(|| AppError::not_found("Transaction", tx_id))
    }
}
