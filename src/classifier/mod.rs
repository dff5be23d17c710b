//! Wallet activity classification
//!
//! Turns a raw transaction history into a [`WalletStatus`]: recency,
//! transfer direction counts, estimated SOL movement, a 0-100 activity
//! score and the dead/alive verdict. Pure; never fails.

use chrono::{DateTime, Utc};

use crate::types::{Transaction, WalletStatus};

pub mod heuristics;

pub use heuristics::{estimate_transfer, Direction, TransferEstimate};

/// Provider category for plain transfers
pub const TRANSFER_TYPE: &str = "TRANSFER";

/// No activity for this many days means dead
pub const DEAD_AFTER_DAYS: i64 = 90;

/// Sparse wallets (fewer than `SPARSE_TX_COUNT` transactions) are dead after this many days
pub const SPARSE_DEAD_AFTER_DAYS: i64 = 30;
pub const SPARSE_TX_COUNT: u64 = 3;

/// Scores below this are dead
pub const MIN_ALIVE_SCORE: f64 = 20.0;

const SECS_PER_DAY: i64 = 86_400;
const OUTGOING_BONUS: f64 = 20.0;

/// Classify a wallet's history as of now
pub fn classify(address: &str, history: &[Transaction]) -> WalletStatus {
    classify_at(address, history, Utc::now())
}

/// Classify a wallet's history as of `now`
pub fn classify_at(address: &str, history: &[Transaction], now: DateTime<Utc>) -> WalletStatus {
    if history.is_empty() {
        return WalletStatus::never_active();
    }

    let mut last_timestamp = i64::MIN;
    let mut incoming = 0u64;
    let mut outgoing = 0u64;
    let mut balance_change = 0.0;

    // Provider order is not guaranteed to be newest-first
    for tx in history {
        last_timestamp = last_timestamp.max(tx.timestamp);

        if tx.tx_type != TRANSFER_TYPE {
            continue;
        }

        // No description, no direction
        let Some(description) = tx.description.as_deref() else {
            continue;
        };

        let estimate = estimate_transfer(address, description);
        match estimate.direction {
            Direction::Outgoing => outgoing += 1,
            Direction::Incoming => incoming += 1,
        }
        if let Some(delta) = estimate.sol_delta {
            balance_change += delta;
        }
    }

    let last_activity =
        DateTime::from_timestamp(last_timestamp, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let days = (now - last_activity).num_seconds().div_euclid(SECS_PER_DAY);
    let total = history.len() as u64;

    let raw_score = raw_activity_score(days, total, outgoing > 0);
    let is_dead = is_dead(days, total, raw_score);

    WalletStatus {
        is_dead,
        last_activity,
        days_since_last_activity: Some(days),
        total_transactions: total,
        incoming_transactions: incoming,
        outgoing_transactions: outgoing,
        balance_change,
        activity_score: raw_score.round() as u8,
        transactions: history.to_vec(),
    }
}

/// Unrounded activity score, clamped to [0, 100]
///
/// `100 - 2*days + 10*ln(total) + 20 if any outgoing transfer`. `total` must be
/// at least 1.
pub fn raw_activity_score(days: i64, total: u64, has_outgoing: bool) -> f64 {
    let recency = 100.0 - 2.0 * days as f64;
    let volume = 10.0 * (total.max(1) as f64).ln();
    let bonus = if has_outgoing { OUTGOING_BONUS } else { 0.0 };

    (recency + volume + bonus).clamp(0.0, 100.0)
}

/// Dead/alive verdict; any one condition is enough
pub fn is_dead(days: i64, total: u64, raw_score: f64) -> bool {
    days > DEAD_AFTER_DAYS
        || (total < SPARSE_TX_COUNT && days > SPARSE_DEAD_AFTER_DAYS)
        || raw_score < MIN_ALIVE_SCORE
}
