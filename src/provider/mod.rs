//! Transaction history providers

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Transaction;

pub mod helius;

pub use helius::HeliusClient;

/// Source of recent transactions for an address
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    /// Fetch the provider's most recent page of transactions
    ///
    /// An address with no history yields an empty list, not an error.
    async fn fetch_transactions(&self, address: &str) -> Result<Vec<Transaction>>;
}
