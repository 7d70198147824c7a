//! Weighted Reciprocal Rank Fusion.
//!
//! Rank-only fusion of the semantic and keyword lists: each list
//! contributes `weight × 1/(K + rank)` per page, weights are the
//! normalized `[alpha, 1 - alpha]` pair. Pages appearing only in a
//! zero-weight list are dropped, so the alpha extremes reduce exactly
//! to the single-ranker orderings.

use std::collections::HashMap;

use retrace_core::types::PageRecord;
use uuid::Uuid;

use crate::keyword::KeywordHit;
use crate::semantic::SemanticHit;

/// One page after fusion, carrying the evidence from both rankers.
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub page: PageRecord,
    /// Accumulated weighted RRF score; the sort key.
    pub score: f64,
    /// Best passage similarity from the semantic list; 0.0 if absent.
    pub similarity: f64,
    /// Top snippet from the semantic list, when present.
    pub top_snippet: Option<String>,
    /// Normalized keyword score, when the keyword list matched.
    pub keyword_score: Option<f64>,
    pub matched_terms: Option<Vec<String>>,
}

struct Accumulator {
    page: PageRecord,
    score: f64,
    best_rank: usize,
    similarity: f64,
    top_snippet: Option<String>,
    keyword_score: Option<f64>,
    matched_terms: Option<Vec<String>>,
}

/// Fuse ranked lists with weighted RRF and truncate to `k`.
pub fn fuse(
    semantic: Vec<SemanticHit>,
    keyword: Vec<KeywordHit>,
    alpha: f64,
    rrf_k: f64,
    k: usize,
) -> Vec<FusedHit> {
    let alpha = alpha.clamp(0.0, 1.0);
    let total = alpha + (1.0 - alpha);
    // Normalized pair; total is 1 for alpha in [0, 1] but the division
    // keeps the invariant explicit for tuned configs.
    let semantic_weight = alpha / total;
    let keyword_weight = (1.0 - alpha) / total;

    let mut accumulators: HashMap<Uuid, Accumulator> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();

    for (index, hit) in semantic.into_iter().enumerate() {
        let rank = index + 1;
        if semantic_weight == 0.0 {
            continue;
        }
        let contribution = semantic_weight * 1.0 / (rrf_k + rank as f64);
        let id = hit.page.id;
        let entry = accumulators.entry(id).or_insert_with(|| {
            order.push(id);
            Accumulator {
                page: hit.page,
                score: 0.0,
                best_rank: rank,
                similarity: 0.0,
                top_snippet: None,
                keyword_score: None,
                matched_terms: None,
            }
        });
        entry.score += contribution;
        entry.best_rank = entry.best_rank.min(rank);
        entry.similarity = hit.similarity;
        entry.top_snippet = Some(hit.top_snippet);
    }

    for (index, hit) in keyword.into_iter().enumerate() {
        let rank = index + 1;
        if keyword_weight == 0.0 {
            continue;
        }
        let contribution = keyword_weight * 1.0 / (rrf_k + rank as f64);
        let id = hit.page.id;
        let entry = accumulators.entry(id).or_insert_with(|| {
            order.push(id);
            Accumulator {
                page: hit.page,
                score: 0.0,
                best_rank: rank,
                similarity: 0.0,
                top_snippet: None,
                keyword_score: None,
                matched_terms: None,
            }
        });
        entry.score += contribution;
        entry.best_rank = entry.best_rank.min(rank);
        entry.keyword_score = Some(hit.normalized_score);
        entry.matched_terms = Some(hit.matched_terms);
    }

    let mut fused: Vec<Accumulator> = order
        .into_iter()
        .filter_map(|id| accumulators.remove(&id))
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.best_rank.cmp(&b.best_rank))
            .then_with(|| a.page.id.cmp(&b.page.id))
    });
    fused.truncate(k);

    fused
        .into_iter()
        .map(|acc| FusedHit {
            page: acc.page,
            score: acc.score,
            similarity: acc.similarity,
            top_snippet: acc.top_snippet,
            keyword_score: acc.keyword_score,
            matched_terms: acc.matched_terms,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::types::Confidence;

    fn make_page(seed: u8) -> PageRecord {
        PageRecord {
            id: Uuid::from_bytes([seed; 16]),
            url: format!("https://example.com/{}", seed),
            title: format!("Page {}", seed),
            content: String::new(),
            passages: Vec::new(),
            timestamp: seed as i64,
            last_accessed: 0,
            visit_count: 1,
            dwell_time_sec: 0.0,
        }
    }

    fn semantic_hit(seed: u8, similarity: f64) -> SemanticHit {
        SemanticHit {
            page: make_page(seed),
            similarity,
            relevance: similarity,
            strong_matches: 1,
            top_snippet: format!("snippet {}", seed),
            confidence: Confidence::from_semantic(similarity, 0.70),
        }
    }

    fn keyword_hit(seed: u8, score: f64) -> KeywordHit {
        KeywordHit {
            page: make_page(seed),
            score,
            normalized_score: score / 6.0,
            matched_terms: vec!["term".to_string()],
        }
    }

    #[test]
    fn test_alpha_one_preserves_semantic_order_exactly() {
        let semantic = vec![
            semantic_hit(1, 0.95),
            semantic_hit(2, 0.85),
            semantic_hit(3, 0.75),
        ];
        let keyword = vec![keyword_hit(3, 6.0), keyword_hit(4, 5.0)];

        let fused = fuse(semantic, keyword, 1.0, 60.0, 10);

        let ids: Vec<u8> = fused.iter().map(|f| f.page.id.as_bytes()[0]).collect();
        // Keyword-only page 4 is dropped; order is the semantic order.
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_alpha_zero_preserves_keyword_order_exactly() {
        let semantic = vec![semantic_hit(1, 0.95), semantic_hit(2, 0.85)];
        let keyword = vec![keyword_hit(3, 6.0), keyword_hit(2, 5.0), keyword_hit(4, 2.0)];

        let fused = fuse(semantic, keyword, 0.0, 60.0, 10);

        let ids: Vec<u8> = fused.iter().map(|f| f.page.id.as_bytes()[0]).collect();
        assert_eq!(ids, vec![3, 2, 4]);
    }

    #[test]
    fn test_rrf_contribution_formula() {
        let fused = fuse(vec![semantic_hit(1, 0.9)], Vec::new(), 1.0, 60.0, 10);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_agreement_beats_single_list() {
        // Page 2 is mid-ranked in both lists; pages 1 and 3 each lead
        // one list. With balanced weights, agreement wins.
        let semantic = vec![semantic_hit(1, 0.95), semantic_hit(2, 0.85)];
        let keyword = vec![keyword_hit(3, 6.0), keyword_hit(2, 5.0)];

        let fused = fuse(semantic, keyword, 0.5, 60.0, 10);

        assert_eq!(fused[0].page.id.as_bytes()[0], 2);
        // score = 0.5/62 + 0.5/62.
        assert!((fused[0].score - 1.0 / 62.0).abs() < 1e-12);
    }

    #[test]
    fn test_enrichment_carries_both_sides() {
        let semantic = vec![semantic_hit(1, 0.9)];
        let keyword = vec![keyword_hit(1, 4.0)];

        let fused = fuse(semantic, keyword, 0.7, 60.0, 10);

        let hit = &fused[0];
        assert!((hit.similarity - 0.9).abs() < 1e-12);
        assert_eq!(hit.top_snippet.as_deref(), Some("snippet 1"));
        assert!((hit.keyword_score.unwrap() - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(hit.matched_terms.as_deref(), Some(&["term".to_string()][..]));
    }

    #[test]
    fn test_keyword_only_page_has_zero_similarity() {
        let fused = fuse(Vec::new(), vec![keyword_hit(5, 3.0)], 0.7, 60.0, 10);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].similarity, 0.0);
        assert!(fused[0].top_snippet.is_none());
    }

    #[test]
    fn test_truncates_to_k() {
        let semantic: Vec<SemanticHit> = (1..=8)
            .map(|i| semantic_hit(i, 1.0 - i as f64 * 0.02))
            .collect();
        let fused = fuse(semantic, Vec::new(), 1.0, 60.0, 3);
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn test_empty_lists_fuse_to_empty() {
        assert!(fuse(Vec::new(), Vec::new(), 0.7, 60.0, 10).is_empty());
    }

    #[test]
    fn test_scores_strictly_descending_within_one_list() {
        let semantic: Vec<SemanticHit> = (1..=5)
            .map(|i| semantic_hit(i, 1.0 - i as f64 * 0.05))
            .collect();
        let fused = fuse(semantic, Vec::new(), 1.0, 60.0, 10);
        for pair in fused.windows(2) {
            assert!(pair[0].score > pair[1].score);
        }
    }
}
