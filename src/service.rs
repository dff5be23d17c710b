//! Cache-aside wallet classification
//!
//! `check` runs: validate -> cache lookup -> (miss) fetch, classify, store.
//! Provider failures are reported but never cached, so the next call for
//! the same address retries upstream. Cache backend failures degrade to a
//! miss; the cache is an optimization only.
//!
//! Concurrent misses for one key are coalesced in-process: the first
//! caller fetches and every caller waiting on the same key receives its
//! result, failures included. If the fetching caller is cancelled, a waiter
//! takes over the fetch. Separate processes sharing a Redis backend can
//! still fetch the same address concurrently.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::address::parse_address;
use crate::cache::{CacheStats, CacheStore};
use crate::classifier;
use crate::config::CacheConfig;
use crate::provider::TransactionProvider;
use crate::types::{CheckResponse, ErrorResult};

/// Result slot shared by every caller checking the same key
type InFlight = Arc<OnceCell<CheckResponse>>;

/// Orchestrates validation, caching and classification
pub struct ClassificationService {
    provider: Arc<dyn TransactionProvider>,
    cache: Arc<dyn CacheStore>,
    key_prefix: String,
    ttl: Duration,
    /// Per-key result slots for in-flight provider fetches
    in_flight: DashMap<String, InFlight>,
    stats: CacheStats,
}

/// Drops the in-flight slot once its last holder is done, even when the
/// holding future is cancelled
struct InFlightGuard<'a> {
    map: &'a DashMap<String, InFlight>,
    key: String,
    slot: InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        // One reference in the map, one in this guard
        self.map.remove_if(&self.key, |_, slot| {
            Arc::ptr_eq(slot, &self.slot) && Arc::strong_count(slot) == 2
        });
    }
}

impl ClassificationService {
    pub fn new(
        provider: Arc<dyn TransactionProvider>,
        cache: Arc<dyn CacheStore>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            key_prefix: config.key_prefix.clone(),
            ttl: config.ttl(),
            in_flight: DashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Cache key for an address
    pub fn cache_key(&self, address: &str) -> String {
        format!("{}{}", self.key_prefix, address)
    }

    /// Check whether a wallet is dead, serving from cache when possible
    pub async fn check(&self, raw_address: &str) -> CheckResponse {
        if let Err(e) = parse_address(raw_address) {
            debug!("Rejected address: {}", e);
            return ErrorResult::invalid_address().into();
        }

        let key = self.cache_key(raw_address);
        if let Some(cached) = self.cached(&key, false).await {
            info!(address = raw_address, "Serving from cache");
            return cached;
        }

        let slot = self.in_flight.entry(key.clone()).or_default().clone();
        let guard = InFlightGuard {
            map: &self.in_flight,
            key,
            slot,
        };

        let response = guard
            .slot
            .get_or_init(|| async {
                // Another caller may have filled the entry since the first lookup
                match self.cached(&guard.key, true).await {
                    Some(cached) => {
                        info!(address = raw_address, "Serving from cache after in-flight fetch");
                        cached
                    }
                    None => self.fetch_and_store(raw_address, &guard.key).await,
                }
            })
            .await
            .clone();
        // Bound so the borrow of `guard` ends before it drops
        response
    }

    /// Cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Cache backend in use
    pub fn cache_backend(&self) -> &'static str {
        self.cache.name()
    }

    /// Look up and decode a cached response; misses are only counted when
    /// `record_miss` is set so one request never counts twice
    async fn cached(&self, key: &str, record_miss: bool) -> Option<CheckResponse> {
        let miss = || {
            if record_miss {
                self.stats.record_miss();
            }
            None
        };

        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return miss(),
            Err(e) => {
                warn!(key, "Cache read failed, treating as miss: {}", e);
                self.stats.record_backend_error();
                return miss();
            }
        };

        match serde_json::from_slice::<CheckResponse>(&bytes) {
            Ok(response) => {
                self.stats.record_hit();
                Some(response)
            }
            Err(e) => {
                // Stale schema or corrupt entry; refetch and overwrite
                warn!(key, "Discarding undecodable cache entry: {}", e);
                miss()
            }
        }
    }

    async fn fetch_and_store(&self, address: &str, key: &str) -> CheckResponse {
        let history = match self.provider.fetch_transactions(address).await {
            Ok(history) => history,
            Err(e) => {
                warn!(address, retryable = e.is_retryable(), "Transaction fetch failed: {}", e);
                return ErrorResult::upstream().into();
            }
        };

        info!(address, transactions = history.len(), "Serving from API");
        let response = CheckResponse::from(classifier::classify(address, &history));

        match serde_json::to_vec(&response) {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(key, &bytes, Some(self.ttl)).await {
                    warn!(key, "Cache write failed: {}", e);
                    self.stats.record_backend_error();
                }
            }
            Err(e) => warn!(key, "Failed to encode status for cache: {}", e),
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::{Error, Result};
    use crate::types::{Transaction, INVALID_ADDRESS_MESSAGE, UPSTREAM_ERROR_MESSAGE};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    const OTHER: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    enum Behavior {
        History(Vec<Transaction>),
        Malformed,
        Slow(Vec<Transaction>),
        SlowFailure,
    }

    const SLOW_FAILURE_DELAY: Duration = Duration::from_millis(200);

    struct FakeProvider {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransactionProvider for FakeProvider {
        async fn fetch_transactions(&self, _address: &str) -> Result<Vec<Transaction>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::History(txs) => Ok(txs.clone()),
                Behavior::Malformed => Err(Error::Deserialization("expected value".to_string())),
                Behavior::Slow(txs) => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(txs.clone())
                }
                Behavior::SlowFailure => {
                    tokio::time::sleep(SLOW_FAILURE_DELAY).await;
                    Err(Error::ProviderTimeout(SLOW_FAILURE_DELAY.as_millis() as u64))
                }
            }
        }
    }

    /// Wraps a cache and counts calls; optionally fails every operation
    struct CountingCache {
        inner: MemoryCache,
        failing: bool,
        gets: AtomicUsize,
        sets: AtomicUsize,
    }

    impl CountingCache {
        fn new(failing: bool) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryCache::default(),
                failing,
                gets: AtomicUsize::new(0),
                sets: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CacheStore for CountingCache {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(Error::Cache("connection refused".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            if self.failing {
                return Err(Error::Cache("connection refused".to_string()));
            }
            self.inner.set(key, value, ttl).await
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn recent_history() -> Vec<Transaction> {
        let now = chrono::Utc::now().timestamp();
        (0..4)
            .map(|i| Transaction {
                signature: format!("sig{}", i),
                timestamp: now - i * 3600,
                tx_type: "TRANSFER".to_string(),
                description: Some(format!("{} transferred 1.5 SOL to {}.", WALLET, OTHER)),
                fee: 5000,
                sender: WALLET.to_string(),
            })
            .collect()
    }

    fn service(
        provider: Arc<FakeProvider>,
        cache: Arc<CountingCache>,
    ) -> ClassificationService {
        ClassificationService::new(provider, cache, &CacheConfig::default())
    }

    #[tokio::test]
    async fn test_invalid_address_touches_nothing() {
        let provider = FakeProvider::new(Behavior::History(recent_history()));
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        let response = svc.check("not-an-address").await;
        assert_eq!(response, CheckResponse::Error(ErrorResult::new(INVALID_ADDRESS_MESSAGE)));
        assert_eq!(provider.calls(), 0);
        assert_eq!(cache.gets.load(Ordering::SeqCst), 0);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let provider = FakeProvider::new(Behavior::History(recent_history()));
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        let first = svc.check(WALLET).await;
        let second = svc.check(WALLET).await;

        assert_eq!(first, second);
        assert_eq!(provider.calls(), 1);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 1);

        let status = first.status().unwrap();
        assert_eq!(status.total_transactions, 4);
        assert_eq!(status.outgoing_transactions, 4);
        assert!((status.balance_change + 6.0).abs() < 1e-9);
        assert!(!status.is_dead);

        assert_eq!(svc.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(svc.stats().misses.load(Ordering::Relaxed), 1);
        assert!(cache.inner.get(&format!("wallet:{}", WALLET)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_history_is_cached_dead_status() {
        let provider = FakeProvider::new(Behavior::History(Vec::new()));
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        let status = svc.check(WALLET).await.status().cloned().unwrap();
        assert!(status.is_dead);
        assert_eq!(status.activity_score, 0);
        assert_eq!(status.days_since_last_activity, None);

        svc.check(WALLET).await;
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_cached() {
        let provider = FakeProvider::new(Behavior::Malformed);
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        let response = svc.check(WALLET).await;
        assert_eq!(response, CheckResponse::Error(ErrorResult::new(UPSTREAM_ERROR_MESSAGE)));
        assert_eq!(cache.sets.load(Ordering::SeqCst), 0);
        assert!(cache.inner.get(&svc.cache_key(WALLET)).await.unwrap().is_none());

        // Next call retries upstream
        svc.check(WALLET).await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_backend_failure_degrades_to_fetch() {
        let provider = FakeProvider::new(Behavior::History(recent_history()));
        let cache = CountingCache::new(true);
        let svc = service(provider.clone(), cache.clone());

        let first = svc.check(WALLET).await;
        let second = svc.check(WALLET).await;

        assert!(first.status().is_some());
        assert!(second.status().is_some());
        assert_eq!(provider.calls(), 2);
        assert!(svc.stats().backend_errors.load(Ordering::Relaxed) >= 2);
    }

    #[tokio::test]
    async fn test_cached_error_is_returned_verbatim() {
        let provider = FakeProvider::new(Behavior::History(recent_history()));
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        let stored = serde_json::to_vec(&ErrorResult::new("stored earlier")).unwrap();
        cache
            .inner
            .set(&svc.cache_key(WALLET), &stored, None)
            .await
            .unwrap();

        let response = svc.check(WALLET).await;
        assert_eq!(response, CheckResponse::Error(ErrorResult::new("stored earlier")));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_refetched() {
        let provider = FakeProvider::new(Behavior::History(recent_history()));
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        cache
            .inner
            .set(&svc.cache_key(WALLET), b"{\"legacy\":true}", None)
            .await
            .unwrap();

        assert!(svc.check(WALLET).await.status().is_some());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_are_coalesced() {
        let provider = FakeProvider::new(Behavior::Slow(recent_history()));
        let cache = CountingCache::new(false);
        let svc = Arc::new(service(provider.clone(), cache.clone()));

        let tasks = (0..8).map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.check(WALLET).await })
        });
        let responses: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(provider.calls(), 1);
        assert!(responses.windows(2).all(|w| w[0] == w[1]));
        assert!(svc.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_cold_check_counts_one_miss() {
        let provider = FakeProvider::new(Behavior::History(recent_history()));
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        svc.check(WALLET).await;

        assert_eq!(svc.stats().misses.load(Ordering::Relaxed), 1);
        assert_eq!(svc.stats().hits.load(Ordering::Relaxed), 0);
        assert_eq!(svc.stats().hit_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_failures_share_one_fetch() {
        let provider = FakeProvider::new(Behavior::SlowFailure);
        let cache = CountingCache::new(false);
        let svc = Arc::new(service(provider.clone(), cache.clone()));

        let started = std::time::Instant::now();
        let tasks = (0..8).map(|_| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.check(WALLET).await })
        });
        let responses: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let elapsed = started.elapsed();

        // Waiters get the failure instead of queueing their own fetch
        assert_eq!(provider.calls(), 1);
        assert!(elapsed < SLOW_FAILURE_DELAY * 2, "took {:?}", elapsed);
        assert!(responses
            .iter()
            .all(|r| *r == CheckResponse::Error(ErrorResult::upstream())));
        assert_eq!(cache.sets.load(Ordering::SeqCst), 0);
        assert!(svc.in_flight.is_empty());

        // Failure is not remembered once the fetch is over
        svc.check(WALLET).await;
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_checks_release_in_flight_slots() {
        let provider = FakeProvider::new(Behavior::SlowFailure);
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        let wallets = [
            WALLET,
            OTHER,
            "11111111111111111111111111111111",
            "So11111111111111111111111111111111111111112",
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
        ];
        for wallet in wallets {
            let result = tokio::time::timeout(Duration::from_millis(20), svc.check(wallet)).await;
            assert!(result.is_err());
        }

        assert_eq!(provider.calls(), wallets.len());
        assert!(svc.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_takes_over_when_fetcher_is_cancelled() {
        let provider = FakeProvider::new(Behavior::Slow(recent_history()));
        let cache = CountingCache::new(false);
        let svc = Arc::new(service(provider.clone(), cache.clone()));

        let fetcher = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.check(WALLET).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let waiter = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.check(WALLET).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        fetcher.abort();

        let response = waiter.await.unwrap();
        assert!(response.status().is_some());
        assert_eq!(provider.calls(), 2);
        assert!(svc.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_addresses_fetch_independently() {
        let provider = FakeProvider::new(Behavior::History(recent_history()));
        let cache = CountingCache::new(false);
        let svc = service(provider.clone(), cache.clone());

        svc.check(WALLET).await;
        svc.check(OTHER).await;
        assert_eq!(provider.calls(), 2);
    }
}
