//! Content-addressed read-through cache, keyed on `(tool, capability,
//! symbol?, params)` fingerprints, with TTL expiry and glob-pattern
//! invalidation. Generalized from the teacher's `ResponseCache`: the stored
//! value here is a [`CacheEntry`] (payload + provenance), not a bare JSON
//! value, so a cache hit restores the original `SourceMeta` verbatim.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use glob::Pattern;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::model::CacheEntry;

/// Thread-safe cache of [`CacheEntry`] values with TTL expiry.
pub struct ResponseCache {
    entries: DashMap<String, Stored>,
    stats: CacheStats,
    /// `0` means unbounded. When set, `set()` evicts an arbitrary entry
    /// before inserting once this many entries are held.
    max_entries: usize,
    /// When `false`, `get` always misses and `set` is a no-op — the
    /// config-driven "caching disabled" path, without making every caller
    /// thread an `Option<ResponseCache>` through the fallback engine.
    enabled: bool,
}

struct Stored {
    entry: CacheEntry,
    cached_at: Instant,
    ttl: Duration,
}

impl Stored {
    fn is_expired(&self) -> bool {
        Instant::now().duration_since(self.cached_at) > self.ttl
    }
}

/// Cache statistics tracked atomically.
#[derive(Debug)]
pub struct CacheStats {
    /// Total cache hits.
    pub hits: AtomicU64,
    /// Total cache misses.
    pub misses: AtomicU64,
    /// Total evictions (expired entries removed).
    pub evictions: AtomicU64,
}

impl CacheStats {
    fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Current hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Current miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Current eviction count.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hit rate as a fraction in `[0.0, 1.0]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 { 0.0 } else { hits as f64 / total as f64 }
    }
}

impl ResponseCache {
    /// Create a new, empty, unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: CacheStats::new(),
            max_entries: 0,
            enabled: true,
        }
    }

    /// Create a cache that evicts an arbitrary entry before each insert
    /// once it holds `max_entries` entries. `0` means unbounded, same as
    /// [`Self::new`].
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::new()
        }
    }

    /// Create a cache that always misses and never stores anything — the
    /// config-driven "caching disabled" path.
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::new() }
    }

    /// Get a cached entry if it exists and hasn't expired. Never fails
    /// loudly: any backend issue is surfaced as a miss by construction,
    /// since this implementation cannot itself error.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        if !self.enabled {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        if let Some(stored) = self.entries.get(key) {
            if stored.is_expired() {
                drop(stored);
                self.entries.remove(key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            } else {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(stored.entry.clone())
            }
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Store an entry with the given TTL. Overwrites any existing entry at
    /// the same key.
    pub fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) {
        if !self.enabled {
            return;
        }
        if self.max_entries > 0 && self.entries.len() >= self.max_entries && !self.entries.contains_key(key) {
            if let Some(evict_key) = self.entries.iter().next().map(|e| e.key().clone()) {
                self.entries.remove(&evict_key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.entries.insert(
            key.to_string(),
            Stored {
                entry,
                cached_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Delete every key matching a glob pattern (e.g. `"crypto_overview:*"`).
    /// Used operationally, never in the request path.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let Ok(glob) = Pattern::new(pattern) else {
            tracing::warn!(pattern, "invalid cache invalidation pattern, ignoring");
            return 0;
        };
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter_map(|e| glob.matches(e.key()).then(|| e.key().clone()))
            .collect();
        let count = keys.len();
        for key in keys {
            self.entries.remove(&key);
        }
        count
    }

    /// Snapshot current statistics.
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            evictions: self.stats.evictions(),
            size: self.entries.len(),
            hit_rate: self.stats.hit_rate(),
        }
    }

    /// Build the canonical fingerprint for `(tool, capability, symbol,
    /// params)`: lower-cased tool, colon, lower-cased capability, colon,
    /// upper-cased symbol if present, colon, first 8 hex chars of a stable
    /// hash of the params' canonical JSON (sorted keys).
    #[must_use]
    pub fn fingerprint(tool: &str, capability: &str, symbol: Option<&str>, params: &Value) -> String {
        let symbol_part = symbol.map(str::to_uppercase).unwrap_or_default();
        let hash = Self::hash_params(params);
        format!("{}:{}:{symbol_part}:{}", tool.to_lowercase(), capability.to_lowercase(), &hash[..8])
    }

    /// SHA-256 hex digest of a params value's canonical (sorted-key) JSON
    /// form. `serde_json::Value`'s `Ord` for objects serializes with keys
    /// in sorted order, which is what canonical fingerprinting needs here.
    fn hash_params(params: &Value) -> String {
        let canonical = serde_json::to_string(&Self::sort_keys(params)).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Recursively rebuild a `Value` with object keys in sorted order so
    /// semantically-equal params with differently-ordered keys fingerprint
    /// identically.
    fn sort_keys(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted = serde_json::Map::new();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    sorted.insert(key.clone(), Self::sort_keys(&map[key]));
                }
                Value::Object(sorted)
            }
            Value::Array(items) => Value::Array(items.iter().map(Self::sort_keys).collect()),
            other => other.clone(),
        }
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Evict expired entries. Background maintenance; never called on the
    /// request path.
    pub fn evict_expired(&self) {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter_map(|e| e.value().is_expired().then(|| e.key().clone()))
            .collect();
        let count = keys.len();
        for key in keys {
            self.entries.remove(&key);
        }
        if count > 0 {
            self.stats.evictions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of cache statistics, serializable for the `/health` endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatsSnapshot {
    /// Total hits.
    pub hits: u64,
    /// Total misses.
    pub misses: u64,
    /// Total evictions.
    pub evictions: u64,
    /// Current entry count.
    pub size: usize,
    /// Hit rate, `[0.0, 1.0]`.
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::SourceMeta;

    fn entry(price: f64) -> CacheEntry {
        CacheEntry {
            payload: json!({ "price": price }),
            source_meta: SourceMeta::new("coingecko", "/simple/price", 60, 100),
        }
    }

    #[test]
    fn fingerprint_is_order_insensitive_over_params() {
        let a = ResponseCache::fingerprint("crypto_overview", "market", Some("btc"), &json!({"a": 1, "b": 2}));
        let b = ResponseCache::fingerprint("crypto_overview", "market", Some("BTC"), &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_by_capability() {
        let a = ResponseCache::fingerprint("crypto_overview", "market", Some("btc"), &json!({}));
        let b = ResponseCache::fingerprint("crypto_overview", "holders", Some("btc"), &json!({}));
        assert_ne!(a, b);
    }

    #[test]
    fn get_returns_none_on_miss() {
        let cache = ResponseCache::new();
        assert!(cache.get("nonexistent").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn set_then_get_round_trips_the_entry() {
        let cache = ResponseCache::new();
        cache.set("k", entry(95_000.0), Duration::from_secs(60));
        let hit = cache.get("k").unwrap();
        assert_eq!(hit.payload, json!({"price": 95_000.0}));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = ResponseCache::new();
        cache.set("k", entry(1.0), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn invalidate_removes_matching_keys_only() {
        let cache = ResponseCache::new();
        cache.set("crypto_overview:market::aaaaaaaa", entry(1.0), Duration::from_secs(60));
        cache.set("crypto_overview:holders::bbbbbbbb", entry(2.0), Duration::from_secs(60));
        cache.set("onchain_tvl_fees:tvl::cccccccc", entry(3.0), Duration::from_secs(60));

        let removed = cache.invalidate("crypto_overview:*");
        assert_eq!(removed, 2);
        assert!(cache.get("onchain_tvl_fees:tvl::cccccccc").is_some());
    }

    #[test]
    fn disabled_cache_always_misses_and_never_stores() {
        let cache = ResponseCache::disabled();
        cache.set("k", entry(1.0), Duration::from_secs(60));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn bounded_cache_evicts_before_exceeding_max_entries() {
        let cache = ResponseCache::with_max_entries(2);
        cache.set("a", entry(1.0), Duration::from_secs(60));
        cache.set("b", entry(2.0), Duration::from_secs(60));
        cache.set("c", entry(3.0), Duration::from_secs(60));
        assert_eq!(cache.stats().size, 2);
    }

    #[test]
    fn cache_hit_does_not_mutate_source_meta() {
        let cache = ResponseCache::new();
        let original = entry(95_000.0);
        let as_of = original.source_meta.as_of_utc;
        cache.set("k", original, Duration::from_secs(60));

        let first = cache.get("k").unwrap();
        let second = cache.get("k").unwrap();
        assert_eq!(first.source_meta.as_of_utc, as_of);
        assert_eq!(second.source_meta.as_of_utc, as_of);
    }
}
