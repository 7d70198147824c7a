//! Sparse keyword ranking.
//!
//! Tokenizes the query, scores pages by weighted field presence
//! (title > passages > content), and tracks which terms matched. Scoring
//! is presence-only: each token contributes at most once per field, so
//! the function stays monotone and cheap.

use std::collections::HashSet;
use std::sync::Arc;

use retrace_core::error::RetraceError;
use retrace_core::types::PageRecord;
use retrace_storage::PageStore;

/// Field weights: a token in the title is worth three content hits.
const TITLE_WEIGHT: f64 = 3.0;
const PASSAGE_WEIGHT: f64 = 2.0;
const CONTENT_WEIGHT: f64 = 1.0;

/// Maximum attainable score per query token (all three fields hit).
const MAX_SCORE_PER_TOKEN: f64 = TITLE_WEIGHT + PASSAGE_WEIGHT + CONTENT_WEIGHT;

/// One page selected by the keyword ranker.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub page: PageRecord,
    /// Raw weighted field-presence score; the sort key.
    pub score: f64,
    /// `score / (6 × query_tokens)`, in [0, 1]. Drives the hybrid
    /// confidence gate.
    pub normalized_score: f64,
    /// Query tokens that produced at least one contribution.
    pub matched_terms: Vec<String>,
}

/// Ranks pages by weighted keyword field presence.
#[derive(Clone)]
pub struct KeywordRanker {
    store: Arc<PageStore>,
}

impl KeywordRanker {
    pub fn new(store: Arc<PageStore>) -> Self {
        Self { store }
    }

    /// Rank all stored pages against the query string.
    ///
    /// Pages with no matching token are dropped; the rest come back
    /// sorted by score descending (ties: newer page first), truncated
    /// to `k`.
    pub fn rank(&self, query: &str, k: usize) -> Result<Vec<KeywordHit>, RetraceError> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let max_score = MAX_SCORE_PER_TOKEN * tokens.len() as f64;

        let mut hits: Vec<KeywordHit> = Vec::new();
        self.store.for_each_page(|page| {
            let title_tokens = token_set(&page.title);
            let content_tokens = token_set(&page.content);
            let mut passage_tokens: HashSet<String> = HashSet::new();
            for passage in &page.passages {
                passage_tokens.extend(token_set(&passage.text));
            }

            let mut score = 0.0;
            let mut matched_terms = Vec::new();
            for token in &tokens {
                let mut matched = false;
                if title_tokens.contains(token) {
                    score += TITLE_WEIGHT;
                    matched = true;
                }
                if passage_tokens.contains(token) {
                    score += PASSAGE_WEIGHT;
                    matched = true;
                }
                if content_tokens.contains(token) {
                    score += CONTENT_WEIGHT;
                    matched = true;
                }
                if matched {
                    matched_terms.push(token.clone());
                }
            }

            if score > 0.0 {
                hits.push(KeywordHit {
                    page,
                    score,
                    normalized_score: score / max_score,
                    matched_terms,
                });
            }
            Ok(())
        })?;

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.page.timestamp.cmp(&a.page.timestamp))
                .then_with(|| a.page.id.cmp(&b.page.id))
        });
        hits.truncate(k);

        Ok(hits)
    }
}

/// Query tokenization: lowercase, split on non-alphanumeric, drop tokens
/// shorter than 3 chars, dedup preserving first occurrence.
pub fn tokenize(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for token in query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
    {
        if seen.insert(token.to_string()) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Field tokenization for membership checks: same splitting as the
/// query, without the length floor (the query side already filtered).
fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::types::Passage;
    use retrace_storage::Database;
    use uuid::Uuid;

    fn make_store() -> Arc<PageStore> {
        Arc::new(PageStore::new(Arc::new(Database::in_memory().unwrap())))
    }

    fn put_page(store: &PageStore, url: &str, title: &str, passage: &str, content: &str) -> Uuid {
        let page = PageRecord {
            id: Uuid::new_v4(),
            url: url.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            passages: vec![Passage {
                id: 0,
                text: passage.to_string(),
                word_count: passage.split_whitespace().count(),
                position: 0,
                quality: 0.9,
                embedding: Some(vec![1.0, 0.0, 0.0, 0.0]),
            }],
            timestamp: 1,
            last_accessed: 0,
            visit_count: 1,
            dwell_time_sec: 0.0,
        };
        let id = page.id;
        store.put(&page).unwrap();
        id
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("How do I use State-and-Effects?"),
            vec!["how", "use", "state", "and", "effects"]
        );
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        assert_eq!(tokenize("a an of to rust"), vec!["rust"]);
    }

    #[test]
    fn test_tokenize_dedups_preserving_order() {
        assert_eq!(tokenize("rust rust docs rust"), vec!["rust", "docs"]);
    }

    #[test]
    fn test_empty_query_returns_empty() {
        let ranker = KeywordRanker::new(make_store());
        assert!(ranker.rank("", 10).unwrap().is_empty());
        assert!(ranker.rank("a of to", 10).unwrap().is_empty());
    }

    #[test]
    fn test_field_weights_order_results() {
        let store = make_store();
        let title_hit = put_page(&store, "https://t", "Kubernetes guide", "other words", "other");
        let passage_hit = put_page(&store, "https://p", "Some page", "kubernetes rollout", "other");
        let content_hit = put_page(&store, "https://c", "Some page", "other words", "kubernetes");

        let ranker = KeywordRanker::new(store);
        let hits = ranker.rank("kubernetes", 10).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].page.id, title_hit);
        assert_eq!(hits[1].page.id, passage_hit);
        assert_eq!(hits[2].page.id, content_hit);
        assert!((hits[0].score - 3.0).abs() < 1e-12);
        assert!((hits[1].score - 2.0).abs() < 1e-12);
        assert!((hits[2].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_presence_not_frequency() {
        let store = make_store();
        let once = put_page(&store, "https://once", "x", "docker", "docker");
        let many = put_page(
            &store,
            "https://many",
            "x",
            "docker docker docker docker",
            "docker docker docker",
        );

        let ranker = KeywordRanker::new(store);
        let hits = ranker.rank("docker", 10).unwrap();

        assert_eq!(hits.len(), 2);
        // Same fields hit, same score, regardless of term frequency.
        assert!((hits[0].score - hits[1].score).abs() < 1e-12);
        let ids: Vec<Uuid> = hits.iter().map(|h| h.page.id).collect();
        assert!(ids.contains(&once) && ids.contains(&many));
    }

    #[test]
    fn test_all_fields_hit_scores_six_per_token() {
        let store = make_store();
        put_page(
            &store,
            "https://all",
            "python documentation",
            "python reference",
            "python tutorials",
        );

        let ranker = KeywordRanker::new(store);
        let hits = ranker.rank("python", 10).unwrap();

        assert!((hits[0].score - 6.0).abs() < 1e-12);
        assert!((hits[0].normalized_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_matched_terms_are_tracked() {
        let store = make_store();
        put_page(
            &store,
            "https://a",
            "React hooks",
            "state and effects in components",
            "react guide",
        );

        let ranker = KeywordRanker::new(store);
        let hits = ranker.rank("react state pottery", 10).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched_terms, vec!["react", "state"]);
    }

    #[test]
    fn test_zero_score_pages_dropped() {
        let store = make_store();
        put_page(&store, "https://a", "cooking pasta", "boil the water", "sauce");

        let ranker = KeywordRanker::new(store);
        assert!(ranker.rank("kubernetes", 10).unwrap().is_empty());
    }

    #[test]
    fn test_normalized_score_accounts_for_all_tokens() {
        let store = make_store();
        // Only one of two tokens matches, title only: 3 / (6 * 2) = 0.25.
        put_page(&store, "https://a", "rust book", "other", "other");

        let ranker = KeywordRanker::new(store);
        let hits = ranker.rank("rust gardening", 10).unwrap();
        assert!((hits[0].normalized_score - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_k_truncation() {
        let store = make_store();
        for i in 0..8 {
            put_page(
                &store,
                &format!("https://p{}", i),
                "shared topic",
                "shared topic passage",
                "shared topic content",
            );
        }

        let ranker = KeywordRanker::new(store);
        assert_eq!(ranker.rank("shared", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_token_match_is_whole_word() {
        let store = make_store();
        put_page(&store, "https://a", "kubernetes", "x", "x");

        let ranker = KeywordRanker::new(store);
        // "kube" is a distinct token, not a prefix match.
        assert!(ranker.rank("kube", 10).unwrap().is_empty());
    }
}
