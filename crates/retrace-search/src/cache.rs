//! Bounded TTL cache for query results.
//!
//! Two layers: full result lists keyed by the normalized query string
//! plus options, and semantic candidate lists keyed by a hash of the
//! query embedding (so re-phrased queries that embed identically still
//! hit). Both are invalidated wholesale on any store mutation. Cache
//! misses are never surfaced to callers.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use retrace_core::types::{SearchOptions, SearchResult};

use crate::semantic::SemanticHit;

struct TimedEntry<T> {
    value: T,
    inserted_at: Instant,
}

/// LRU + TTL cache over search results and semantic candidates.
pub struct QueryCache {
    results: Mutex<LruCache<String, TimedEntry<Vec<SearchResult>>>>,
    semantic: Mutex<LruCache<u64, TimedEntry<Vec<SemanticHit>>>>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("max(1) is non-zero");
        Self {
            results: Mutex::new(LruCache::new(capacity)),
            semantic: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get_results(&self, key: &str) -> Option<Vec<SearchResult>> {
        let mut cache = self.results.lock().ok()?;
        match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put_results(&self, key: String, results: Vec<SearchResult>) {
        if let Ok(mut cache) = self.results.lock() {
            cache.put(
                key,
                TimedEntry {
                    value: results,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    pub fn get_semantic(&self, key: u64) -> Option<Vec<SemanticHit>> {
        let mut cache = self.semantic.lock().ok()?;
        match cache.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                cache.pop(&key);
                None
            }
            None => None,
        }
    }

    pub fn put_semantic(&self, key: u64, hits: Vec<SemanticHit>) {
        if let Ok(mut cache) = self.semantic.lock() {
            cache.put(
                key,
                TimedEntry {
                    value: hits,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Drop everything. Called on every index/delete/clear.
    pub fn invalidate_all(&self) {
        if let Ok(mut cache) = self.results.lock() {
            cache.clear();
        }
        if let Ok(mut cache) = self.semantic.lock() {
            cache.clear();
        }
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache").field("ttl", &self.ttl).finish()
    }
}

/// Whitespace-collapsed lowercase form of a query, shared by cache keys
/// and the rankers.
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cache key for a full result list: the normalized query plus every
/// option that affects ranking. Floats go in as bit patterns so 0.7
/// and 0.7000000001 never collide.
pub fn results_key(query: &str, opts: &SearchOptions) -> String {
    format!(
        "{}|{}|k={}|sim={:016x}|a={:016x}|br={}|bf={}|rw={:016x}|fw={:016x}",
        opts.mode.as_str(),
        normalize_query(query),
        opts.k,
        opts.min_similarity.to_bits(),
        opts.alpha.to_bits(),
        opts.boost_recent,
        opts.boost_frequent,
        opts.recency_weight.to_bits(),
        opts.frequency_weight.to_bits(),
    )
}

/// Key for a semantic candidate list: the query embedding's bit pattern
/// hashed together with the candidate count and selection threshold.
pub fn embedding_key(vector: &[f32], candidates: usize, min_similarity: f64) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for value in vector {
        value.to_bits().hash(&mut hasher);
    }
    candidates.hash(&mut hasher);
    min_similarity.to_bits().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::types::{Confidence, PageRecord, SearchMode};
    use uuid::Uuid;

    fn make_result() -> SearchResult {
        SearchResult {
            page: PageRecord {
                id: Uuid::new_v4(),
                url: "https://example.com".to_string(),
                title: "Example".to_string(),
                content: String::new(),
                passages: Vec::new(),
                timestamp: 0,
                last_accessed: 0,
                visit_count: 1,
                dwell_time_sec: 0.0,
            },
            similarity: 0.9,
            relevance: 0.9,
            mode: SearchMode::Hybrid,
            confidence: Confidence::High,
            keyword_score: None,
            matched_terms: None,
            top_snippet: None,
        }
    }

    #[test]
    fn test_results_hit_and_miss() {
        let cache = QueryCache::new(10, Duration::from_secs(300));
        assert!(cache.get_results("missing").is_none());

        cache.put_results("key".to_string(), vec![make_result()]);
        let hit = cache.get_results("key").unwrap();
        assert_eq!(hit.len(), 1);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = QueryCache::new(10, Duration::ZERO);
        cache.put_results("key".to_string(), vec![make_result()]);
        assert!(cache.get_results("key").is_none());
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = QueryCache::new(2, Duration::from_secs(300));
        cache.put_results("a".to_string(), vec![make_result()]);
        cache.put_results("b".to_string(), vec![make_result()]);
        cache.put_results("c".to_string(), vec![make_result()]);

        assert!(cache.get_results("a").is_none());
        assert!(cache.get_results("b").is_some());
        assert!(cache.get_results("c").is_some());
    }

    #[test]
    fn test_invalidate_all_clears_both_layers() {
        let cache = QueryCache::new(10, Duration::from_secs(300));
        cache.put_results("key".to_string(), vec![make_result()]);
        cache.put_semantic(42, Vec::new());

        cache.invalidate_all();

        assert!(cache.get_results("key").is_none());
        assert!(cache.get_semantic(42).is_none());
    }

    #[test]
    fn test_normalize_query_collapses_whitespace() {
        assert_eq!(normalize_query("  Rust   Docs \n"), "rust docs");
    }

    #[test]
    fn test_results_key_varies_with_options() {
        let query = "rust docs";
        let base = SearchOptions::default();
        let mut other_k = base.clone();
        other_k.k = 5;
        let mut other_alpha = base.clone();
        other_alpha.alpha = 0.9;
        let mut other_mode = base.clone();
        other_mode.mode = SearchMode::Keyword;

        let keys: Vec<String> = [&base, &other_k, &other_alpha, &other_mode]
            .iter()
            .map(|opts| results_key(query, opts))
            .collect();
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn test_results_key_normalizes_query() {
        let opts = SearchOptions::default();
        assert_eq!(
            results_key("Rust  Docs", &opts),
            results_key("rust docs", &opts)
        );
    }

    #[test]
    fn test_embedding_key_deterministic() {
        let vector = vec![0.25f32, -0.5, 0.75];
        assert_eq!(
            embedding_key(&vector, 30, 0.7),
            embedding_key(&vector, 30, 0.7)
        );
        assert_ne!(
            embedding_key(&vector, 30, 0.7),
            embedding_key(&vector, 15, 0.7)
        );
        assert_ne!(
            embedding_key(&vector, 30, 0.7),
            embedding_key(&vector, 30, 0.45)
        );
        assert_ne!(
            embedding_key(&vector, 30, 0.7),
            embedding_key(&[0.25f32, -0.5, 0.7501], 30, 0.7)
        );
    }
}
