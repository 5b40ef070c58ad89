/*!
 * Translation caching functionality.
 *
 * This module provides a bounded in-memory cache for translations to avoid
 * redundant tool invocations. Eviction is by insertion order: when the cache
 * is full the entry that was inserted first makes room for the new one.
 */

use log::debug;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use super::options::TranslationOptions;

/// Default number of entries kept
pub const DEFAULT_CAPACITY: usize = 3000;

/// Cache key derived from every option that affects the output plus the exact text
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Create a new cache key
    pub fn new(
        source_lang: &str,
        target_lang: &str,
        model: &str,
        mode: &str,
        tone: &str,
        text: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        for field in [source_lang, target_lang, model, mode, tone, text] {
            // Length prefix keeps ("ab", "c") distinct from ("a", "bc")
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    /// Key for `text` translated under `options`
    pub fn for_item(options: &TranslationOptions, text: &str) -> Self {
        Self::new(
            &options.source_lang,
            &options.target_lang,
            &options.model,
            options.mode.as_str(),
            options.tone.as_str(),
            text,
        )
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey(")?;
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

struct CacheInner {
    entries: HashMap<CacheKey, String>,
    order: VecDeque<CacheKey>,
    stats: CacheStats,
}

/// Translation cache shared between concurrent requests
///
/// Cloning is cheap and yields a handle onto the same storage.
#[derive(Clone)]
pub struct TranslationCache {
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
}

impl TranslationCache {
    /// Create a cache holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity.min(4096)),
                order: VecDeque::with_capacity(capacity.min(4096)),
                stats: CacheStats::default(),
            })),
            capacity,
        }
    }

    /// Get a translation from the cache
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key).cloned() {
            Some(translation) => {
                inner.stats.hits += 1;
                debug!("Cache hit for {:?}", key);
                Some(translation)
            }
            None => {
                inner.stats.misses += 1;
                debug!("Cache miss for {:?}", key);
                None
            }
        }
    }

    /// Store a translation, evicting the oldest entry if the cache is full
    ///
    /// Overwriting an existing key keeps its original insertion position.
    pub fn put(&self, key: CacheKey, translation: String) {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = translation;
            return;
        }

        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.remove(&oldest).is_some() {
                inner.stats.evictions += 1;
                debug!("Evicted {:?} to make room", oldest);
            }
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, translation);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Clear the cache
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.stats = CacheStats::default();
        debug!("Translation cache cleared");
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
