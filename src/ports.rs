//! Persistence port for transactions.
//!
//! Correctness of duplicate detection rests on the store rejecting a second
//! record with the same `tx_id`; the lookup before insert is only a shortcut.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::Transaction;

/// SQLSTATE raised by Postgres on a unique constraint violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Failures that may clear up on their own and are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                StoreError::UniqueViolation(
                    db_err
                        .constraint()
                        .unwrap_or("transactions_tx_id_key")
                        .to_string(),
                )
            }
            transient @ (sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed) => StoreError::Unavailable(transient.to_string()),
            other => StoreError::Other(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find_by_id(&self, tx_id: &str) -> StoreResult<Option<Transaction>>;

    /// Inserts `tx`, failing with [`StoreError::UniqueViolation`] when a record
    /// with the same `tx_id` already exists.
    async fn insert(&self, tx: &Transaction) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}
