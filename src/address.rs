//! Wallet address validation
//!
//! An address is accepted when it parses as a Solana public key: base58
//! alphabet, decoding to exactly 32 bytes. Curve membership is not checked,
//! so program-derived addresses are accepted as well.

use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

use crate::error::{Error, Result};

/// Parse a user-supplied address into a public key
pub fn parse_address(input: &str) -> Result<Pubkey> {
    if input.trim().is_empty() {
        return Err(Error::InvalidAddress("empty address".to_string()));
    }

    Pubkey::from_str(input).map_err(|e| Error::InvalidAddress(format!("{}: {}", input, e)))
}

/// Check whether a string is a syntactically valid wallet address
pub fn is_valid_address(input: &str) -> bool {
    parse_address(input).is_ok()
}
