//! In-memory TransactionStore.
//!
//! Used by tests and by `serve --in-memory`. The uniqueness check and the
//! write happen under the same write lock, so it gives the same
//! insert-if-absent guarantee as the Postgres constraint within one process.

use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::Transaction;
use crate::ports::{StoreError, StoreResult, TransactionStore};

#[derive(Clone, Default)]
pub struct MemoryTransactionStore {
    records: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn find_by_id(&self, tx_id: &str) -> StoreResult<Option<Transaction>> {
        let records = self.records.read().await;
        Ok(records.get(tx_id).cloned())
    }

    async fn insert(&self, tx: &Transaction) -> StoreResult<()> {
        let mut records = self.records.write().await;
        match records.entry(tx.tx_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::UniqueViolation(format!(
                "tx_id {} already exists",
                tx.tx_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(tx.clone());
                Ok(())
            }
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
