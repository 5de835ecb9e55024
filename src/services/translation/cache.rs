use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

use crate::core::types::TranslationOutcome;
use crate::utils::Metrics;

/// In-memory LRU cache of remote translation outcomes.
///
/// Keys are xxHash3 digests of (target language, text). Only outcomes from a
/// remote tier should be stored here: a dictionary fallback is a degraded
/// result and must not shadow a service that has since recovered.
#[derive(Clone)]
pub struct TranslationCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    cache: RwLock<LruCache<String, TranslationOutcome>>,
    metrics: Option<Metrics>,
}

impl TranslationCache {
    pub fn new(max_entries: usize, metrics: Option<Metrics>) -> Self {
        let max = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Arc::new(CacheInner {
                cache: RwLock::new(LruCache::new(max)),
                metrics,
            }),
        }
    }

    /// Generate cache key from target language and text using xxHash3
    pub fn generate_key(target_language: &str, text: &str) -> String {
        let mut hash_input = Vec::with_capacity(target_language.len() + text.len() + 1);
        hash_input.extend_from_slice(target_language.as_bytes());
        hash_input.push(0);
        hash_input.extend_from_slice(text.as_bytes());

        format!("{:016x}", xxh3_64(&hash_input))
    }

    /// Look up a cached outcome, recording a hit or miss
    pub fn get(&self, key: &str) -> Option<TranslationOutcome> {
        let hit = self.inner.cache.write().get(key).cloned();

        if let Some(ref m) = self.inner.metrics {
            if hit.is_some() {
                m.record_cache_hit();
            } else {
                m.record_cache_miss();
            }
        }

        hit
    }

    pub fn put(&self, key: String, outcome: TranslationOutcome) {
        let mut cache = self.inner.cache.write();
        cache.put(key, outcome);

        if let Some(ref m) = self.inner.metrics {
            m.update_cache_size(cache.len());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.inner.cache.write().clear();

        if let Some(ref m) = self.inner.metrics {
            m.update_cache_size(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ProviderKind;

    fn outcome(text: &str) -> TranslationOutcome {
        TranslationOutcome {
            original_text: "hello".to_string(),
            translated_text: text.to_string(),
            target_language: "th".to_string(),
            provider: ProviderKind::MyMemory,
            note: None,
        }
    }

    #[test]
    fn test_cache_put_get() {
        let metrics = Metrics::new();
        let cache = TranslationCache::new(10, Some(metrics.clone()));

        let key = TranslationCache::generate_key("th", "hello");
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), outcome("สวัสดี"));
        assert_eq!(cache.get(&key).unwrap().translated_text, "สวัสดี");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_size, 1);
    }

    #[test]
    fn test_key_depends_on_target_and_text() {
        let key1 = TranslationCache::generate_key("th", "hello");
        let key2 = TranslationCache::generate_key("th", "hello");
        let key3 = TranslationCache::generate_key("ja", "hello");
        let key4 = TranslationCache::generate_key("t", "hhello");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key1, key4);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = TranslationCache::new(2, None);
        cache.put("a".to_string(), outcome("1"));
        cache.put("b".to_string(), outcome("2"));
        cache.get("a");
        cache.put("c".to_string(), outcome("3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }
}
