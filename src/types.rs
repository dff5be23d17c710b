//! Shared data structures for wallet classification
//!
//! Field names serialize in camelCase; this JSON shape is both the response
//! body of the check endpoint and the value stored in the cache. The cached
//! encoding carries no schema version, so changing these structs silently
//! invalidates existing cache entries (they fail to decode and are refetched).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message returned when the submitted address fails validation
pub const INVALID_ADDRESS_MESSAGE: &str = "Please enter a valid wallet address";

/// Message returned for any provider failure
pub const UPSTREAM_ERROR_MESSAGE: &str = "error occurred";

/// One historical transaction, as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub signature: String,
    /// Unix seconds
    pub timestamp: i64,
    /// Provider category, e.g. "TRANSFER"
    #[serde(rename = "type")]
    pub tx_type: String,
    /// Free-text summary; absent for some transaction kinds
    pub description: Option<String>,
    /// Fee in lamports
    pub fee: u64,
    /// Fee-paying account
    pub sender: String,
}

/// Derived liveness snapshot for one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatus {
    pub is_dead: bool,
    pub last_activity: DateTime<Utc>,
    /// Whole days since `last_activity`; `None` when the wallet has never been active
    pub days_since_last_activity: Option<i64>,
    pub total_transactions: u64,
    pub incoming_transactions: u64,
    pub outgoing_transactions: u64,
    /// Net SOL movement estimated from transfer descriptions
    pub balance_change: f64,
    /// 0-100
    pub activity_score: u8,
    /// Transactions in provider order
    pub transactions: Vec<Transaction>,
}

impl WalletStatus {
    /// Status for a wallet with no transaction history at all
    pub fn never_active() -> Self {
        Self {
            is_dead: true,
            last_activity: DateTime::<Utc>::UNIX_EPOCH,
            days_since_last_activity: None,
            total_transactions: 0,
            incoming_transactions: 0,
            outgoing_transactions: 0,
            balance_change: 0.0,
            activity_score: 0,
            transactions: Vec::new(),
        }
    }
}

/// Human-readable failure returned in place of a status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub message: String,
}

impl ErrorResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn invalid_address() -> Self {
        Self::new(INVALID_ADDRESS_MESSAGE)
    }

    pub fn upstream() -> Self {
        Self::new(UPSTREAM_ERROR_MESSAGE)
    }
}

/// Outcome of a wallet check: exactly one of status or error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckResponse {
    Status(WalletStatus),
    Error(ErrorResult),
}

impl CheckResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, CheckResponse::Error(_))
    }

    pub fn status(&self) -> Option<&WalletStatus> {
        match self {
            CheckResponse::Status(status) => Some(status),
            CheckResponse::Error(_) => None,
        }
    }
}

impl From<WalletStatus> for CheckResponse {
    fn from(status: WalletStatus) -> Self {
        CheckResponse::Status(status)
    }
}

impl From<ErrorResult> for CheckResponse {
    fn from(error: ErrorResult) -> Self {
        CheckResponse::Error(error)
    }
}
