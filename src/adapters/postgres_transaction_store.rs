//! Postgres implementation of TransactionStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Transaction, TransactionStatus};
use crate::ports::{StoreError, StoreResult, TransactionStore};

/// Postgres-backed transaction store. Relies on the `transactions_tx_id_key`
/// unique constraint created by the migrations.
#[derive(Clone)]
pub struct PostgresTransactionStore {
    pool: PgPool,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn find_by_id(&self, tx_id: &str) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT tx_id, amount, currency, sender_account, receiver_account,
                status, description, created_at
            FROM transactions
            WHERE tx_id = $1
            "#,
        )
        .bind(tx_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn insert(&self, tx: &Transaction) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                tx_id, amount, currency, sender_account, receiver_account,
                status, description, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&tx.tx_id)
        .bind(&tx.amount)
        .bind(&tx.currency)
        .bind(&tx.sender_account)
        .bind(&tx.receiver_account)
        .bind(tx.status.as_str())
        .bind(&tx.description)
        .bind(tx.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    tx_id: String,
    amount: BigDecimal,
    currency: String,
    sender_account: String,
    receiver_account: String,
    status: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> StoreResult<Transaction> {
        let status = self.status.parse::<TransactionStatus>().map_err(|e| {
            StoreError::Other(format!("corrupted row for tx_id {}: {}", self.tx_id, e))
        })?;

        Ok(Transaction {
            tx_id: self.tx_id,
            amount: self.amount,
            currency: self.currency,
            sender_account: self.sender_account,
            receiver_account: self.receiver_account,
            status,
            description: self.description,
            timestamp: self.created_at,
        })
    }
}
