//! Best-effort transfer direction and amount inference
//!
//! Helius attaches a human-readable description to parsed transactions, e.g.
//! `"<from> transferred 2.5 SOL to <to>."`. Direction and SOL amount are read
//! from that text, not from ledger balances.
//!
//! Known failure modes:
//! - Amounts without a fractional part ("transferred 2 SOL") are not
//!   extracted; the direction is still counted.
//! - Token transfers ("transferred 100 BONK") never contribute an amount.
//! - Only the first amount in a multi-transfer description is used.
//! - A wallet that receives from itself is counted as outgoing.
//! - Any phrasing change on the provider side degrades every transfer to
//!   "incoming, no amount".
//!
//! TODO: decide whether the structured `nativeTransfers` lamport amounts in
//! the Helius payload should replace text parsing for `balance_change`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENT_AMOUNT: Regex =
        Regex::new(r"transferred (\d+\.\d+) SOL").expect("static regex");
    static ref RECEIVED_AMOUNT: Regex =
        Regex::new(r"transferred (\d+\.\d+) SOL to").expect("static regex");
}

/// Inferred direction of a transfer relative to the checked wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Direction plus the signed SOL delta it contributes (if parseable)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferEstimate {
    pub direction: Direction,
    pub sol_delta: Option<f64>,
}

/// Infer the direction and signed SOL amount of a transfer description
pub fn estimate_transfer(wallet: &str, description: &str) -> TransferEstimate {
    let outgoing_marker = format!("{} transferred", wallet);

    if description.contains(&outgoing_marker) {
        TransferEstimate {
            direction: Direction::Outgoing,
            sol_delta: capture_amount(&SENT_AMOUNT, description).map(|sol| -sol),
        }
    } else {
        TransferEstimate {
            direction: Direction::Incoming,
            sol_delta: capture_amount(&RECEIVED_AMOUNT, description),
        }
    }
}

fn capture_amount(pattern: &Regex, text: &str) -> Option<f64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
