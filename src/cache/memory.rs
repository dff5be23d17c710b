//! In-process cache backend

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::CacheStore;
use crate::error::Result;

/// Entry with optional expiry
#[derive(Clone)]
struct CachedValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CachedValue {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

/// DashMap-backed cache, local to one process
pub struct MemoryCache {
    entries: DashMap<String, CachedValue>,
    capacity: usize,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: DashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of stored entries, expired ones included until touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make room for one insert: drop expired entries, then ~10% if still full
    fn evict(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());

        if self.entries.len() >= self.capacity {
            let to_remove = (self.capacity / 10).max(1);
            let keys: Vec<_> = self
                .entries
                .iter()
                .take(to_remove)
                .map(|r| r.key().clone())
                .collect();
            for key in keys {
                self.entries.remove(&key);
            }
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(10_000)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
            // Entry expired, remove it
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.evict();
        }

        self.entries
            .insert(key.to_string(), CachedValue::new(value.to_vec(), ttl));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
