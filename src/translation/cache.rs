/*!
 * Translation caching functionality.
 *
 * Translations are stored under a fingerprint of everything that can change
 * the output: provider name, cache-impacting parameters, the resolved
 * language pair and the source text. Transport configuration (endpoints,
 * credentials) never enters the key.
 *
 * Storage is pluggable through `CacheStore`. `MemoryCacheStore` lives here;
 * the SQLite store is in `database::cache_store`.
 */

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::RwLock;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

/// Deterministic cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// SHA-256 hex over the canonical JSON encoding of
    /// `(provider, params, source_language, target_language, text)`.
    ///
    /// `params` is a `BTreeMap`, so its encoding is sorted by key and the
    /// fingerprint does not depend on insertion order.
    pub fn compute(
        provider: &str,
        params: &BTreeMap<String, Value>,
        source_language: &str,
        target_language: &str,
        text: &str,
    ) -> Self {
        let canonical = serde_json::json!([provider, params, source_language, target_language, text]);
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        Self(format!("{:x}", digest))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Stored entries
    pub entries: usize,
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
}

impl CacheStats {
    /// Hits over lookups, 0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Key-value substrate behind the translation cache
///
/// Implementations must tolerate concurrent `get`/`set` from many workers.
/// A duplicate `set` on one key may simply overwrite.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Stored value for `key`
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Store `value` under `key`
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Number of stored entries
    async fn len(&self) -> anyhow::Result<usize>;

    /// Whether nothing is stored
    async fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every entry
    async fn clear(&self) -> anyhow::Result<()>;

    /// Counters for reporting
    async fn stats(&self) -> anyhow::Result<CacheStats>;
}

/// Process-local store
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    /// Internal cache storage
    entries: Arc<RwLock<HashMap<String, String>>>,

    /// Cache hit counter
    hits: Arc<RwLock<u64>>,

    /// Cache miss counter
    misses: Arc<RwLock<u64>>,
}

impl MemoryCacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = self.entries.read().get(key).cloned();
        match value {
            Some(_) => *self.hits.write() += 1,
            None => *self.misses.write() += 1,
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn len(&self) -> anyhow::Result<usize> {
        Ok(self.entries.read().len())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.entries.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;
        debug!("Memory cache cleared");
        Ok(())
    }

    async fn stats(&self) -> anyhow::Result<CacheStats> {
        Ok(CacheStats {
            entries: self.entries.read().len(),
            hits: *self.hits.read(),
            misses: *self.misses.read(),
        })
    }
}

/// Fingerprint-addressed view over a store
///
/// Store failures never fail a translation: a failed read is a miss, a
/// failed write is dropped. Both are logged.
#[derive(Debug, Clone)]
pub struct TranslationCache {
    store: Arc<dyn CacheStore>,
}

impl TranslationCache {
    /// Wrap a store
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// In-memory cache
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()))
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Cached translation for `fingerprint`
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<String> {
        match self.store.get(fingerprint.as_str()).await {
            Ok(Some(translation)) => {
                debug!("Cache hit for {}", short(fingerprint));
                Some(translation)
            }
            Ok(None) => {
                debug!("Cache miss for {}", short(fingerprint));
                None
            }
            Err(e) => {
                warn!("Cache read failed for {}, treating as miss: {}", short(fingerprint), e);
                None
            }
        }
    }

    /// Store a translation under `fingerprint`
    pub async fn set(&self, fingerprint: &Fingerprint, translation: &str) {
        match self.store.set(fingerprint.as_str(), translation).await {
            Ok(()) => debug!("Cached translation for {}", short(fingerprint)),
            Err(e) => warn!("Cache write failed for {}, dropping: {}", short(fingerprint), e),
        }
    }
}

fn short(fingerprint: &Fingerprint) -> &str {
    &fingerprint.as_str()[..12]
}
