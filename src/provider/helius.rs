//! Helius API client for wallet transaction history
//!
//! Uses the enhanced transactions endpoint
//! `GET {base}/v0/addresses/{address}/transactions?api-key={key}`, which
//! returns parsed transactions with a human-readable `description`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::TransactionProvider;
use crate::config::HeliusConfig;
use crate::error::{Error, Result};
use crate::types::Transaction;

/// Helius API client
pub struct HeliusClient {
    /// HTTP client
    client: Client,
    /// API key
    api_key: String,
    /// Base URL for REST API
    rest_base_url: String,
    /// Optional page size
    limit: Option<u32>,
    /// Request timeout
    timeout: Duration,
}

impl HeliusClient {
    /// Create a new Helius client
    pub fn new(config: &HeliusConfig) -> Result<Self> {
        let timeout = config.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            rest_base_url: config.base_url.trim_end_matches('/').to_string(),
            limit: config.limit,
            timeout,
        })
    }

    fn transactions_url(&self, address: &str) -> String {
        format!("{}/v0/addresses/{}/transactions", self.rest_base_url, address)
    }

    /// Map a transport error without leaking the request URL (it carries the api key)
    fn request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::ProviderTimeout(self.timeout.as_millis() as u64)
        } else {
            Error::Provider(format!("Helius request failed: {}", e.without_url()))
        }
    }
}

#[async_trait]
impl TransactionProvider for HeliusClient {
    async fn fetch_transactions(&self, address: &str) -> Result<Vec<Transaction>> {
        debug!("Fetching transaction history for {}", address);

        let mut request = self
            .client
            .get(self.transactions_url(address))
            .query(&[("api-key", self.api_key.as_str())])
            .timeout(self.timeout);
        if let Some(limit) = self.limit {
            request = request.query(&[("limit", limit)]);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(address, status = status.as_u16(), "Helius API error");
            return Err(Error::ProviderStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| self.request_error(e))?;
        let transactions = parse_transactions(&body)?;

        debug!(address, count = transactions.len(), "Fetched transaction history");
        Ok(transactions)
    }
}

/// Decode a transactions payload; an empty or `null` body means no history
fn parse_transactions(body: &str) -> Result<Vec<Transaction>> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let transactions: Option<Vec<HeliusTransaction>> = serde_json::from_str(body)
        .map_err(|e| Error::Deserialization(format!("Failed to parse Helius response: {}", e)))?;

    Ok(transactions
        .unwrap_or_default()
        .into_iter()
        .map(Transaction::from)
        .collect())
}

// ============ Helius API Response Types ============

#[derive(Debug, Deserialize)]
struct HeliusTransaction {
    signature: Option<String>,
    #[serde(rename = "type")]
    r#type: Option<String>,
    timestamp: Option<i64>,
    description: Option<String>,
    fee: Option<u64>,
    #[serde(rename = "feePayer")]
    fee_payer: Option<String>,
}

impl From<HeliusTransaction> for Transaction {
    fn from(tx: HeliusTransaction) -> Self {
        Self {
            signature: tx.signature.unwrap_or_default(),
            timestamp: tx.timestamp.unwrap_or_default(),
            tx_type: tx.r#type.unwrap_or_default(),
            description: tx.description,
            fee: tx.fee.unwrap_or_default(),
            sender: tx.fee_payer.unwrap_or_default(),
        }
    }
}
