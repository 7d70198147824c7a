//! Retrieval metrics: Precision@k, Recall@k, MRR, and graded NDCG@k.
//!
//! All functions take the ranked result urls and the query's ground
//! truth; queries with no expected urls score 0 rather than erroring so
//! aggregation stays total.

use std::collections::{HashMap, HashSet};

/// Fraction of the top k results that are expected.
pub fn precision_at_k(results: &[String], expected: &HashSet<String>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let hits = results
        .iter()
        .take(k)
        .filter(|url| expected.contains(*url))
        .count();
    hits as f64 / k as f64
}

/// Fraction of the expected urls found in the top k.
pub fn recall_at_k(results: &[String], expected: &HashSet<String>, k: usize) -> f64 {
    if expected.is_empty() || k == 0 {
        return 0.0;
    }
    let hits = results
        .iter()
        .take(k)
        .filter(|url| expected.contains(*url))
        .count();
    hits as f64 / expected.len() as f64
}

/// Reciprocal rank of the first expected result within the top k, else 0.
pub fn mrr_at_k(results: &[String], expected: &HashSet<String>, k: usize) -> f64 {
    for (index, url) in results.iter().take(k).enumerate() {
        if expected.contains(url) {
            return 1.0 / (index as f64 + 1.0);
        }
    }
    0.0
}

/// Graded NDCG@k.
///
/// `DCG = sum(rel_i / log2(i + 1))` over 1-based ranks, `IDCG` from the
/// relevance grades sorted descending. Returns 0 when there is no
/// relevant url at all (IDCG would be 0).
pub fn ndcg_at_k(results: &[String], relevance: &HashMap<String, u8>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }

    let mut dcg = 0.0;
    for (index, url) in results.iter().take(k).enumerate() {
        let rel = relevance.get(url).copied().unwrap_or(0) as f64;
        if rel > 0.0 {
            let rank = (index + 1) as f64;
            dcg += rel / (rank + 1.0).log2();
        }
    }

    let mut grades: Vec<f64> = relevance.values().map(|&r| r as f64).collect();
    grades.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut idcg = 0.0;
    for (index, rel) in grades.iter().take(k).enumerate() {
        if *rel > 0.0 {
            let rank = (index + 1) as f64;
            idcg += rel / (rank + 1.0).log2();
        }
    }

    if idcg <= 0.0 {
        return 0.0;
    }
    dcg / idcg
}
