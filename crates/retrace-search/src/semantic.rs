//! Passage-first semantic ranking.
//!
//! Scans every stored passage against the query vector, aggregates to
//! page level (best passage wins, multiple strong passages earn a
//! logarithmic boost), then applies the primary threshold with a
//! fallback floor so weakly-matching corpora still answer without ever
//! returning junk.

use std::sync::Arc;

use tracing::warn;

use retrace_core::error::RetraceError;
use retrace_core::types::{Confidence, PageRecord};
use retrace_storage::PageStore;

/// Thresholds and limits for one semantic ranking pass.
#[derive(Debug, Clone)]
pub struct SemanticOptions {
    /// Maximum pages to return.
    pub k: usize,
    /// Primary selection threshold.
    pub min_similarity: f64,
    /// Looser floor consulted only when the primary threshold selects
    /// nothing. Pages below the floor are never returned.
    pub fallback_floor: f64,
    /// Coefficient on `ln(strong_matches)` when a page has more than one
    /// passage at or above the primary threshold.
    pub multi_passage_boost: f64,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            k: 10,
            min_similarity: 0.70,
            fallback_floor: 0.45,
            multi_passage_boost: 0.10,
        }
    }
}

/// One page selected by the semantic ranker.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub page: PageRecord,
    /// Best passage similarity (dot product of unit vectors).
    pub similarity: f64,
    /// `similarity` plus the multi-passage boost; the sort key.
    pub relevance: f64,
    /// Passages at or above the primary threshold.
    pub strong_matches: usize,
    /// Text of the best-matching passage.
    pub top_snippet: String,
    pub confidence: Confidence,
}

/// Ranks pages by their best passage against a query vector.
#[derive(Clone)]
pub struct SemanticRanker {
    store: Arc<PageStore>,
}

impl SemanticRanker {
    pub fn new(store: Arc<PageStore>) -> Self {
        Self { store }
    }

    /// Rank all stored pages against `query_vec`.
    ///
    /// The scan streams one page at a time and keeps only candidates at
    /// or above the effective floor, so embeddings are never all held in
    /// memory at once. A single bad passage is skipped, never fatal.
    pub fn rank(
        &self,
        query_vec: &[f32],
        opts: &SemanticOptions,
    ) -> Result<Vec<SemanticHit>, RetraceError> {
        if let Some(dim) = self.store.dimensions()? {
            if dim != query_vec.len() {
                return Err(RetraceError::InvalidArgs(format!(
                    "Query vector has dimension {}, store expects {}",
                    query_vec.len(),
                    dim
                )));
            }
        }

        // Primary threshold may be tuned below the floor; collect from
        // whichever is lower so both selection passes see their pages.
        let collect_floor = opts.min_similarity.min(opts.fallback_floor);

        let mut candidates: Vec<SemanticHit> = Vec::new();
        self.store.for_each_page(|page| {
            let mut max_sim = f64::NEG_INFINITY;
            let mut top_index: Option<usize> = None;
            let mut strong_matches = 0usize;

            for (index, passage) in page.passages.iter().enumerate() {
                let Some(embedding) = passage.embedding.as_ref() else {
                    continue;
                };
                if embedding.len() != query_vec.len() {
                    warn!(
                        page_id = %page.id,
                        position = passage.position,
                        "Skipping passage with mismatched embedding dimension"
                    );
                    continue;
                }

                let sim = dot(query_vec, embedding);
                if sim > max_sim {
                    max_sim = sim;
                    top_index = Some(index);
                }
                if sim >= opts.min_similarity {
                    strong_matches += 1;
                }
            }

            let Some(top_index) = top_index else {
                return Ok(());
            };
            if max_sim < collect_floor {
                return Ok(());
            }

            let relevance = if strong_matches > 1 {
                max_sim + (strong_matches as f64).ln() * opts.multi_passage_boost
            } else {
                max_sim
            };

            let top_snippet = page.passages[top_index].text.clone();
            let confidence = Confidence::from_semantic(max_sim, opts.min_similarity);
            candidates.push(SemanticHit {
                page,
                similarity: max_sim,
                relevance,
                strong_matches,
                top_snippet,
                confidence,
            });
            Ok(())
        })?;

        // Primary selection; fall back to the floor only when it is empty.
        let mut selected: Vec<SemanticHit> = if candidates
            .iter()
            .any(|hit| hit.similarity >= opts.min_similarity)
        {
            candidates
                .into_iter()
                .filter(|hit| hit.similarity >= opts.min_similarity)
                .collect()
        } else {
            candidates
                .into_iter()
                .filter(|hit| hit.similarity >= opts.fallback_floor)
                .collect()
        };

        selected.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.similarity
                        .partial_cmp(&a.similarity)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.page.timestamp.cmp(&a.page.timestamp))
        });
        selected.truncate(opts.k);

        Ok(selected)
    }
}

/// Dot product in f64. For unit vectors this equals cosine similarity.
fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::types::Passage;
    use retrace_storage::Database;
    use uuid::Uuid;

    const DIM: usize = 8;

    fn basis(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        v[axis] = 1.0;
        v
    }

    /// Unit vector with the given similarity against basis(0).
    fn at_similarity(sim: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        v[0] = sim;
        v[1] = (1.0 - sim * sim).sqrt();
        v
    }

    fn make_store() -> Arc<PageStore> {
        Arc::new(PageStore::new(Arc::new(Database::in_memory().unwrap())))
    }

    fn put_page(store: &PageStore, url: &str, timestamp: i64, embeddings: Vec<Vec<f32>>) -> Uuid {
        let page = PageRecord {
            id: Uuid::new_v4(),
            url: url.to_string(),
            title: format!("Title {}", url),
            content: "content".to_string(),
            passages: embeddings
                .into_iter()
                .enumerate()
                .map(|(i, embedding)| Passage {
                    id: i as u32,
                    text: format!("passage {} of {}", i, url),
                    word_count: 4,
                    position: i as u32,
                    quality: 0.9,
                    embedding: Some(embedding),
                })
                .collect(),
            timestamp,
            last_accessed: 0,
            visit_count: 1,
            dwell_time_sec: 0.0,
        };
        let id = page.id;
        store.put(&page).unwrap();
        id
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let ranker = SemanticRanker::new(make_store());
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_exact_match_ranks_first_with_high_confidence() {
        let store = make_store();
        let exact = put_page(&store, "https://a", 1, vec![basis(0)]);
        put_page(&store, "https://b", 1, vec![basis(1)]);

        let ranker = SemanticRanker::new(Arc::clone(&store));
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].page.id, exact);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(hits[0].confidence, Confidence::High);
        assert_eq!(hits[0].top_snippet, "passage 0 of https://a");
    }

    #[test]
    fn test_primary_selection_excludes_below_threshold() {
        let store = make_store();
        put_page(&store, "https://strong", 1, vec![at_similarity(0.85)]);
        put_page(&store, "https://weak", 1, vec![at_similarity(0.60)]);

        let ranker = SemanticRanker::new(store);
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].page.url, "https://strong");
    }

    #[test]
    fn test_fallback_floor_when_primary_empty() {
        let store = make_store();
        put_page(&store, "https://mid", 1, vec![at_similarity(0.60)]);
        put_page(&store, "https://low", 1, vec![at_similarity(0.30)]);

        let ranker = SemanticRanker::new(store);
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();

        // 0.60 clears the 0.45 floor; 0.30 never surfaces.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].page.url, "https://mid");
        assert_eq!(hits[0].confidence, Confidence::Low);
    }

    #[test]
    fn test_nothing_above_floor_returns_empty() {
        let store = make_store();
        put_page(&store, "https://junk", 1, vec![at_similarity(0.20)]);

        let ranker = SemanticRanker::new(store);
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_multi_passage_boost_outranks_single_slightly_better() {
        let store = make_store();
        // Two strong passages: relevance 0.80 + ln(2) * 0.10 ~= 0.869.
        let multi = put_page(
            &store,
            "https://multi",
            1,
            vec![at_similarity(0.80), at_similarity(0.75)],
        );
        // One passage at 0.85: relevance stays 0.85.
        put_page(&store, "https://single", 1, vec![at_similarity(0.85)]);

        let ranker = SemanticRanker::new(store);
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].page.id, multi);
        assert_eq!(hits[0].strong_matches, 2);
        assert!(hits[0].relevance > hits[0].similarity);
    }

    #[test]
    fn test_single_passage_has_no_boost() {
        let store = make_store();
        put_page(&store, "https://one", 1, vec![at_similarity(0.90)]);

        let ranker = SemanticRanker::new(store);
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();

        assert_eq!(hits[0].strong_matches, 1);
        assert!((hits[0].relevance - hits[0].similarity).abs() < 1e-12);
    }

    #[test]
    fn test_ties_break_by_newer_timestamp() {
        let store = make_store();
        put_page(&store, "https://older", 1_000, vec![at_similarity(0.80)]);
        let newer = put_page(&store, "https://newer", 2_000, vec![at_similarity(0.80)]);

        let ranker = SemanticRanker::new(store);
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].page.id, newer);
    }

    #[test]
    fn test_relevance_strictly_descending() {
        let store = make_store();
        for (i, sim) in [0.95f32, 0.88, 0.81, 0.74].iter().enumerate() {
            put_page(
                &store,
                &format!("https://p{}", i),
                1,
                vec![at_similarity(*sim)],
            );
        }

        let ranker = SemanticRanker::new(store);
        let hits = ranker.rank(&basis(0), &SemanticOptions::default()).unwrap();

        assert_eq!(hits.len(), 4);
        for pair in hits.windows(2) {
            assert!(pair[0].relevance > pair[1].relevance);
        }
    }

    #[test]
    fn test_k_truncation() {
        let store = make_store();
        for i in 0..6 {
            put_page(
                &store,
                &format!("https://p{}", i),
                i as i64,
                vec![at_similarity(0.9)],
            );
        }

        let ranker = SemanticRanker::new(store);
        let opts = SemanticOptions {
            k: 3,
            ..SemanticOptions::default()
        };
        assert_eq!(ranker.rank(&basis(0), &opts).unwrap().len(), 3);
    }

    #[test]
    fn test_dimension_mismatch_is_invalid_args() {
        let store = make_store();
        put_page(&store, "https://a", 1, vec![basis(0)]);

        let ranker = SemanticRanker::new(store);
        let result = ranker.rank(&[1.0f32; 4], &SemanticOptions::default());
        assert!(matches!(result, Err(RetraceError::InvalidArgs(_))));
    }

    #[test]
    fn test_tunable_threshold_below_floor_still_collects() {
        let store = make_store();
        put_page(&store, "https://faint", 1, vec![at_similarity(0.30)]);

        let ranker = SemanticRanker::new(store);
        let opts = SemanticOptions {
            min_similarity: 0.25,
            ..SemanticOptions::default()
        };
        let hits = ranker.rank(&basis(0), &opts).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_dot_matches_cosine_for_unit_vectors() {
        let a = at_similarity(0.6);
        let sim = dot(&basis(0), &a);
        assert!((sim - 0.6).abs() < 1e-6);
    }
}
