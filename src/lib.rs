//! Dead Wallet Checker Library
//!
//! Classifies Solana wallets as alive or dead from their recent Helius
//! transaction history, with a cache-aside layer in front of the provider.

pub mod address;
pub mod cache;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod provider;
pub mod server;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use service::ClassificationService;
pub use types::{CheckResponse, ErrorResult, Transaction, WalletStatus};
