//! CLI command implementations

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::cache::{self, CacheStatsSnapshot, CacheStore};
use crate::config::Config;
use crate::provider::{HeliusClient, TransactionProvider};
use crate::server;
use crate::service::ClassificationService;

/// The system program always has history
const HEALTH_CHECK_ADDRESS: &str = "11111111111111111111111111111111";

/// Build the service from configuration
pub async fn build_service(config: &Config) -> Result<Arc<ClassificationService>> {
    let provider = HeliusClient::new(&config.helius).context("Failed to create Helius client")?;
    let cache = cache::connect(&config.cache)
        .await
        .context("Failed to connect cache backend")?;

    info!(backend = cache.name(), ttl_secs = config.cache.ttl_secs, "Cache ready");

    Ok(Arc::new(ClassificationService::new(
        Arc::new(provider),
        cache,
        &config.cache,
    )))
}

/// Check a single wallet and print the JSON response
pub async fn check(config: &Config, address: &str, pretty: bool) -> Result<()> {
    let service = build_service(config).await?;
    let response = service.check(address).await;

    let stats = service.stats().snapshot();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        backend_errors = stats.backend_errors,
        "Cache stats"
    );

    let output = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", output);

    if response.is_error() {
        anyhow::bail!("Wallet check did not produce a status");
    }
    Ok(())
}

/// Run the HTTP server
pub async fn serve(config: &Config) -> Result<()> {
    let service = build_service(config).await?;
    server::serve(service, &config.server.bind_addr, &config.server.route).await?;
    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;

    // Check Helius
    print!("Helius API... ");
    match check_provider(config).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    // Check cache backend
    print!("Cache ({:?})... ", config.cache.backend);
    match check_cache(config).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    // Full check path: the second lookup must be served from cache
    print!("Check round trip... ");
    match check_round_trip(config).await {
        Ok(stats) if stats.hits > 0 => println!(
            "OK (hits: {}, misses: {}, backend errors: {}, hit rate: {:.0}%)",
            stats.hits,
            stats.misses,
            stats.backend_errors,
            stats.hit_rate * 100.0
        ),
        Ok(stats) => {
            println!(
                "FAILED: nothing served from cache (misses: {}, backend errors: {})",
                stats.misses, stats.backend_errors
            );
            all_healthy = false;
        }
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    println!();
    if all_healthy {
        println!("All systems healthy");
        Ok(())
    } else {
        anyhow::bail!("One or more health checks failed")
    }
}

async fn check_provider(config: &Config) -> Result<u64> {
    let client = HeliusClient::new(&config.helius)?;

    let start = Instant::now();
    client.fetch_transactions(HEALTH_CHECK_ADDRESS).await?;
    Ok(start.elapsed().as_millis() as u64)
}

async fn check_cache(config: &Config) -> Result<u64> {
    let start = Instant::now();
    let cache: Arc<dyn CacheStore> = cache::connect(&config.cache).await?;
    cache.get(&format!("{}health-check", config.cache.key_prefix)).await?;
    Ok(start.elapsed().as_millis() as u64)
}

async fn check_round_trip(config: &Config) -> Result<CacheStatsSnapshot> {
    let service = build_service(config).await?;
    for _ in 0..2 {
        if service.check(HEALTH_CHECK_ADDRESS).await.is_error() {
            anyhow::bail!("Wallet check did not produce a status");
        }
    }
    Ok(service.stats().snapshot())
}
