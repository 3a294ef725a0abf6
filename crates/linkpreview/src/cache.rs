//! Content cache: TTL plus byte-budget eviction
//!
//! One store is shared process-wide, namespaced by service ("page",
//! "transcript", provider names). Entries are fully replaced on write, so
//! last-writer-wins races are acceptable. Expiry is lazy: an expired entry is
//! treated as a miss on read and removed. When the store's total size would
//! exceed its byte budget on insert, least-recently-accessed entries are
//! evicted until the new entry fits.
//!
//! A poisoned lock degrades to bypass (reads miss, writes drop), never to a
//! request failure.

use crate::types::TranscriptSource;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default byte budget for the shared store
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Default TTL for cached page content
pub const PAGE_CONTENT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default TTL for cached transcripts
pub const TRANSCRIPT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Logical cache key: URL + service namespace + resource key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Final (post-redirect) URL the value was resolved for
    pub url: String,
    /// Namespace, e.g. "page" or "transcript"
    pub service: String,
    /// Provider- or resource-specific discriminator
    pub resource: String,
}

impl CacheKey {
    /// Build a key for the given URL and namespace
    pub fn new(
        url: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            service: service.into(),
            resource: resource.into(),
        }
    }

    fn composite(&self) -> String {
        format!(
            "{}::{}::{}",
            self.service,
            self.resource,
            normalize_url(&self.url)
        )
    }
}

/// Lowercase and strip the trailing slash so trivially different spellings
/// of the same URL share an entry.
fn normalize_url(url: &str) -> String {
    url.to_lowercase().trim_end_matches('/').to_string()
}

/// Cached payload
#[derive(Debug, Clone)]
pub struct CacheValue {
    /// The cached content
    pub content: String,
    /// Transcript source, when the value is a transcript
    pub source: Option<TranscriptSource>,
    /// Free-form metadata stored alongside the content
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug)]
struct CacheEntry {
    value: CacheValue,
    expires_at: Instant,
    size: usize,
    last_access: Instant,
}

/// Store statistics
#[derive(Debug)]
pub struct CacheStats {
    /// Live entries
    pub entries: usize,
    /// Total size of live entries in bytes
    pub total_bytes: usize,
    /// Configured byte budget
    pub max_bytes: usize,
}

/// Shared TTL + byte-budget cache
///
/// Opened once per run and explicitly closed on shutdown; concurrent callers
/// share it read/write through an `Arc`.
pub struct ContentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_bytes: usize,
}

impl ContentCache {
    /// Create a store with the given byte budget
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_bytes,
        }
    }

    /// Create a store with the default byte budget
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CACHE_BYTES)
    }

    /// Look up a value; expired entries are removed and reported as a miss
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        // Write lock: lazy expiry and the LRU timestamp both mutate.
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(_) => {
                tracing::warn!("cache lock poisoned, treating get as a miss");
                return None;
            }
        };

        let composite = key.composite();
        let now = Instant::now();
        let expired = match entries.get(&composite) {
            Some(entry) => entry.expires_at <= now,
            None => return None,
        };
        if expired {
            entries.remove(&composite);
            return None;
        }

        entries.get_mut(&composite).map(|entry| {
            entry.last_access = now;
            entry.value.clone()
        })
    }

    /// Insert a value, replacing any existing entry for the same key
    pub fn set(&self, key: &CacheKey, value: CacheValue, ttl: Duration) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(_) => {
                tracing::warn!("cache lock poisoned, dropping write");
                return;
            }
        };

        let composite = key.composite();
        let size = entry_size(&composite, &value);
        if size > self.max_bytes {
            tracing::warn!(size, "cache entry larger than the whole budget, skipping");
            return;
        }

        entries.remove(&composite);

        let mut total: usize = entries.values().map(|e| e.size).sum();
        while total + size > self.max_bytes {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    if let Some(evicted) = entries.remove(&k) {
                        total -= evicted.size;
                        tracing::debug!(key = %k, "evicted cache entry for space");
                    }
                }
                None => break,
            }
        }

        let now = Instant::now();
        entries.insert(
            composite,
            CacheEntry {
                value,
                expires_at: now + ttl,
                size,
                last_access: now,
            },
        );
    }

    /// Store statistics
    pub fn stats(&self) -> CacheStats {
        match self.entries.read() {
            Ok(entries) => CacheStats {
                entries: entries.len(),
                total_bytes: entries.values().map(|e| e.size).sum(),
                max_bytes: self.max_bytes,
            },
            Err(_) => CacheStats {
                entries: 0,
                total_bytes: 0,
                max_bytes: self.max_bytes,
            },
        }
    }

    /// Drop all entries; called at shutdown
    pub fn close(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

fn entry_size(composite: &str, value: &CacheValue) -> usize {
    let metadata_size: usize = value
        .metadata
        .as_ref()
        .map(|m| m.iter().map(|(k, v)| k.len() + v.len()).sum())
        .unwrap_or(0);
    composite.len() + value.content.len() + metadata_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(content: &str) -> CacheValue {
        CacheValue {
            content: content.to_string(),
            source: None,
            metadata: None,
        }
    }

    #[test]
    fn test_set_then_get() {
        let cache = ContentCache::with_defaults();
        let key = CacheKey::new("https://example.com/page", "page", "html");
        cache.set(&key, value("hello"), Duration::from_secs(60));

        let got = cache.get(&key).expect("entry should be live");
        assert_eq!(got.content, "hello");
    }

    #[test]
    fn test_get_normalizes_url() {
        let cache = ContentCache::with_defaults();
        let key = CacheKey::new("https://Example.com/Page/", "page", "html");
        cache.set(&key, value("hello"), Duration::from_secs(60));

        let other = CacheKey::new("https://example.com/page", "page", "html");
        assert!(cache.get(&other).is_some());
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = ContentCache::with_defaults();
        let key = CacheKey::new("https://example.com", "transcript", "captions");
        cache.set(&key, value("text"), Duration::from_millis(0));

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_set_replaces_existing_entry() {
        let cache = ContentCache::with_defaults();
        let key = CacheKey::new("https://example.com", "page", "html");
        cache.set(&key, value("first"), Duration::from_secs(60));
        cache.set(&key, value("second"), Duration::from_secs(60));

        assert_eq!(cache.get(&key).unwrap().content, "second");
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_byte_budget_evicts_least_recently_used() {
        // Budget fits roughly two of the three entries.
        let cache = ContentCache::new(250);
        let k1 = CacheKey::new("https://a.example", "page", "html");
        let k2 = CacheKey::new("https://b.example", "page", "html");
        let k3 = CacheKey::new("https://c.example", "page", "html");

        cache.set(&k1, value(&"x".repeat(80)), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(2));
        cache.set(&k2, value(&"y".repeat(80)), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(2));

        // Touch k1 so k2 becomes the eviction candidate.
        assert!(cache.get(&k1).is_some());
        std::thread::sleep(Duration::from_millis(2));

        cache.set(&k3, value(&"z".repeat(80)), Duration::from_secs(60));

        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn test_oversized_entry_is_dropped() {
        let cache = ContentCache::new(10);
        let key = CacheKey::new("https://example.com", "page", "html");
        cache.set(&key, value(&"x".repeat(100)), Duration::from_secs(60));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_close_clears_entries() {
        let cache = ContentCache::with_defaults();
        let key = CacheKey::new("https://example.com", "page", "html");
        cache.set(&key, value("hello"), Duration::from_secs(60));
        cache.close();
        assert!(cache.get(&key).is_none());
    }
}
