//! Time-boxed key/value cache for derived views.
//!
//! Values are stored as JSON strings with an explicit TTL. Expired entries are
//! dropped lazily on read; there is no background sweeper. Writers replace a
//! key's value wholesale, so concurrent recomputations resolve as last writer
//! wins.
//!
//! Every invalidation bumps a generation counter. A `get_or_set` computation
//! that overlapped an invalidation returns its value but does not store it.

use dashmap::DashMap;
use metrics::counter;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid TTL")]
    InvalidTTL,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process cache shared by the application through `AppState`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<DashMap<String, CacheEntry>>,
    generation: Arc<AtomicU64>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value when present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.store.remove_if(key, |_, entry| entry.is_expired());
            debug!(key, "cache entry expired");
        }
        None
    }

    pub fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTTL);
        }
        self.store
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.bump_generation();
        self.store.remove(key).is_some()
    }

    /// Removes every key matching `pattern`, where `*` matches any run of
    /// characters. Returns the number of removed keys.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        self.bump_generation();
        let before = self.store.len();
        self.store.retain(|key, _| !glob_match(pattern, key));
        let removed = before.saturating_sub(self.store.len());
        debug!(pattern, removed, "cache invalidated");
        removed
    }

    pub fn clear(&self) {
        self.bump_generation();
        self.store.clear();
    }

    /// Incremented by every `delete`, `invalidate_pattern` and `clear`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns the cached value for `key` or computes, stores and returns it.
    ///
    /// A stored value that no longer deserializes into `T` counts as a miss.
    pub async fn get_or_set<T, E, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(raw) = self.get(key) {
            match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!("cardstock.cache.hit", 1);
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(key, error = %e, "discarding undecodable cache entry");
                    self.store.remove(key);
                }
            }
        }

        counter!("cardstock.cache.miss", 1);
        debug!(key, "cache miss");
        let started = self.generation();
        let value = compute().await?;
        if self.generation() != started {
            debug!(key, "invalidated during compute, not storing");
            return Ok(value);
        }
        let raw = serde_json::to_string(&value).map_err(CacheError::from)?;
        self.set(key, raw, ttl)?;
        // An invalidation that landed between the check and the insert
        // must still win.
        if self.generation() != started {
            self.store.remove(key);
        }
        Ok(value)
    }
}

/// `*` wildcard matching over the whole key.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p = pattern.as_bytes();
    let k = key.as_bytes();
    let (mut pi, mut ki) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while ki < k.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some(pi);
            pi += 1;
            resume = ki;
        } else if pi < p.len() && p[pi] == k[ki] {
            pi += 1;
            ki += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            resume += 1;
            ki = resume;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}
