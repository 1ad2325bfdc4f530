//! Transaction domain entity.
//! Framework-agnostic representation of an ingested payment.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scale every stored amount is normalized to.
pub const AMOUNT_SCALE: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// Schema-validated input for a transaction that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub tx_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub sender_account: String,
    pub receiver_account: String,
    pub description: Option<String>,
}

/// A persisted transaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub tx_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub sender_account: String,
    pub receiver_account: String,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Builds the record stored on first delivery. Status is `success`
    /// since settlement is not modelled.
    pub fn create(new: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            tx_id: new.tx_id,
            amount: new.amount.with_scale(AMOUNT_SCALE),
            currency: new.currency,
            sender_account: new.sender_account,
            receiver_account: new.receiver_account,
            status: TransactionStatus::Success,
            description: new.description,
            timestamp: now,
        }
    }
}
