//! Benchmark tests for semantic and keyword ranking.
//!
//! # Dataset Size
//!
//! This benchmark uses 1,000 pages (one passage each) for CI speed. To
//! run against a larger corpus, set the environment variable
//! `BENCH_FULL_SCALE=1` before running:
//!
//! ```bash
//! BENCH_FULL_SCALE=1 cargo bench -p retrace-search
//! ```
//!
//! The exact scan is O(passages), so timings scale linearly with corpus
//! size.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use uuid::Uuid;

use retrace_core::types::{PageRecord, Passage};
use retrace_search::keyword::KeywordRanker;
use retrace_search::semantic::{SemanticOptions, SemanticRanker};
use retrace_storage::{Database, PageStore};
use retrace_vector::embedding::{EmbeddingBackend, EmbeddingRequest, MockEmbedding};

/// Number of pages to insert for CI benchmarks.
const CI_PAGE_COUNT: usize = 1_000;

/// Number of pages for full-scale benchmarks.
const FULL_SCALE_PAGE_COUNT: usize = 20_000;

/// Realistic passage (~60 words) for benchmarking.
///
/// Each page is made unique by appending a sequential index, which
/// ensures MockEmbedding produces distinct vectors for each entry.
fn generate_passage_text(index: usize) -> String {
    format!(
        "The deployment pipeline ran across staging and production while monitoring \
         dashboards stayed nominal. Database migrations applied without downtime thanks \
         to the rolling strategy, and the review covered authentication changes across \
         every service boundary. Latency percentiles held steady during the release \
         window and customer reports remained quiet throughout. Page identifier: {}",
        index
    )
}

fn page_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_PAGE_COUNT
    } else {
        CI_PAGE_COUNT
    }
}

fn seed_store(count: usize) -> Arc<PageStore> {
    let store = Arc::new(PageStore::new(Arc::new(Database::in_memory().unwrap())));
    let embedder = MockEmbedding::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    for i in 0..count {
        let text = generate_passage_text(i);
        let embedding = runtime
            .block_on(embedder.embed(EmbeddingRequest::document(&text, None)))
            .unwrap();
        let page = PageRecord {
            id: Uuid::new_v4(),
            url: format!("https://example.com/page/{}", i),
            title: format!("Release notes {}", i),
            content: text.clone(),
            passages: vec![Passage {
                id: 0,
                text,
                word_count: 55,
                position: 0,
                quality: 0.9,
                embedding: Some(embedding),
            }],
            timestamp: i as i64,
            last_accessed: 0,
            visit_count: 1,
            dwell_time_sec: 0.0,
        };
        store.put(&page).unwrap();
    }
    store
}

fn bench_ranking(c: &mut Criterion) {
    let count = page_count();
    let store = seed_store(count);

    let embedder = MockEmbedding::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let query_vec = runtime
        .block_on(embedder.embed(EmbeddingRequest::query(
            "deployment pipeline monitoring latency",
        )))
        .unwrap();

    let semantic = SemanticRanker::new(Arc::clone(&store));
    let semantic_opts = SemanticOptions {
        min_similarity: 0.05,
        ..SemanticOptions::default()
    };
    c.bench_function(&format!("semantic_rank_{}_pages", count), |b| {
        b.iter(|| {
            semantic
                .rank(std::hint::black_box(&query_vec), &semantic_opts)
                .unwrap()
        })
    });

    let keyword = KeywordRanker::new(store);
    c.bench_function(&format!("keyword_rank_{}_pages", count), |b| {
        b.iter(|| {
            keyword
                .rank(
                    std::hint::black_box("deployment pipeline monitoring latency"),
                    10,
                )
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_ranking);
criterion_main!(benches);
