//! Offline evaluation harness.
//!
//! Indexes a corpus through the same `index()` path the UI uses, runs
//! each graded query through the same `search()` path, and aggregates
//! Precision@k, Recall@k, MRR, NDCG@k, the confidence distribution, and
//! the domain-match rate. With the lexicon embedder the whole run is
//! deterministic, so metric regressions are real regressions.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use retrace_core::cancel::CancelFlag;
use retrace_core::config::RetraceConfig;
use retrace_core::types::{Confidence, IndexRequest, SearchMode, SearchOptions, SearchResult};
use retrace_search::QueryService;
use retrace_storage::{Database, PageStore};

use crate::corpus::{EvalQuery, TestPage};
use crate::error::EvalError;
use crate::lexicon::LexiconEmbedding;
use crate::metrics::{mrr_at_k, ndcg_at_k, precision_at_k, recall_at_k};

/// Fixed first-seen base timestamp so runs are reproducible.
const CORPUS_EPOCH_MS: i64 = 1_700_000_000_000;

/// Per-query evaluation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryReport {
    pub query: String,
    pub precision: f64,
    pub recall: f64,
    pub mrr: f64,
    pub ndcg: f64,
    /// Whether the rank-1 domain matches any expected url's domain.
    pub domain_match: bool,
    pub result_count: usize,
}

/// Counts of result confidence labels across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ConfidenceDistribution {
    fn add(&mut self, confidence: Confidence) {
        match confidence {
            Confidence::High => self.high += 1,
            Confidence::Medium => self.medium += 1,
            Confidence::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Aggregate evaluation report for one mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub mode: SearchMode,
    pub k: usize,
    pub queries: Vec<QueryReport>,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_mrr: f64,
    pub mean_ndcg: f64,
    pub confidence: ConfidenceDistribution,
    pub domain_match_rate: f64,
}

impl EvalReport {
    /// Plain-text rendering for the CLI.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "mode={} k={} queries={}\n",
            self.mode.as_str(),
            self.k,
            self.queries.len()
        ));
        out.push_str(&format!(
            "P@{k}={:.3}  R@{k}={:.3}  MRR={:.3}  NDCG@{k}={:.3}\n",
            self.mean_precision,
            self.mean_recall,
            self.mean_mrr,
            self.mean_ndcg,
            k = self.k
        ));
        out.push_str(&format!(
            "confidence: high={} medium={} low={}  domain_match={:.3}\n",
            self.confidence.high, self.confidence.medium, self.confidence.low, self.domain_match_rate
        ));
        for q in &self.queries {
            out.push_str(&format!(
                "  [{}] P={:.3} R={:.3} MRR={:.3} NDCG={:.3} results={} {}\n",
                if q.domain_match { "+" } else { " " },
                q.precision,
                q.recall,
                q.mrr,
                q.ndcg,
                q.result_count,
                q.query
            ));
        }
        out
    }
}

/// Drives a [`QueryService`] over a fixed corpus and query set.
pub struct EvalHarness {
    service: QueryService,
}

impl EvalHarness {
    pub fn new(service: QueryService) -> Self {
        Self { service }
    }

    /// In-memory harness with the deterministic lexicon embedder.
    pub fn with_lexicon_backend() -> Result<Self, EvalError> {
        let store = Arc::new(PageStore::new(Arc::new(Database::in_memory()?)));
        let service = QueryService::new(
            store,
            Arc::new(LexiconEmbedding::new()),
            &RetraceConfig::default(),
        );
        Ok(Self::new(service))
    }

    pub fn service(&self) -> &QueryService {
        &self.service
    }

    /// Index the corpus through the normal indexing path.
    pub async fn index_corpus(&self, corpus: &[TestPage]) -> Result<usize, EvalError> {
        let cancel = CancelFlag::new();
        for (i, page) in corpus.iter().enumerate() {
            self.service
                .index(
                    IndexRequest {
                        url: page.url.clone(),
                        title: page.title.clone(),
                        content: page.content.clone(),
                        visited_at: Some(CORPUS_EPOCH_MS + i as i64 * 1_000),
                        dwell_time_sec: 0.0,
                    },
                    &cancel,
                )
                .await?;
        }
        info!(pages = corpus.len(), "Evaluation corpus indexed");
        Ok(corpus.len())
    }

    /// Run every query in `mode` and aggregate the metric suite.
    pub async fn run(
        &self,
        queries: &[EvalQuery],
        mode: SearchMode,
        k: usize,
    ) -> Result<EvalReport, EvalError> {
        if queries.is_empty() {
            return Err(EvalError::InvalidQuerySet(
                "no queries to evaluate".to_string(),
            ));
        }

        let cancel = CancelFlag::new();
        let mut reports = Vec::with_capacity(queries.len());
        let mut confidence = ConfidenceDistribution::default();
        let mut domain_matches = 0usize;

        for query in queries {
            let opts = SearchOptions {
                k,
                mode,
                ..SearchOptions::default()
            };
            let results = self.service.search(&query.query, opts, &cancel).await?;

            for result in &results {
                confidence.add(result.confidence);
            }

            let urls: Vec<String> = results.iter().map(|r| r.page.url.clone()).collect();
            let expected: HashSet<String> = query.expected_urls.iter().cloned().collect();

            let domain_match = rank_one_domain_matches(&results, &query.expected_urls);
            if domain_match {
                domain_matches += 1;
            }

            reports.push(QueryReport {
                query: query.query.clone(),
                precision: precision_at_k(&urls, &expected, k),
                recall: recall_at_k(&urls, &expected, k),
                mrr: mrr_at_k(&urls, &expected, k),
                ndcg: ndcg_at_k(&urls, &query.relevance, k),
                domain_match,
                result_count: results.len(),
            });
        }

        let count = reports.len() as f64;
        let report = EvalReport {
            mode,
            k,
            mean_precision: reports.iter().map(|r| r.precision).sum::<f64>() / count,
            mean_recall: reports.iter().map(|r| r.recall).sum::<f64>() / count,
            mean_mrr: reports.iter().map(|r| r.mrr).sum::<f64>() / count,
            mean_ndcg: reports.iter().map(|r| r.ndcg).sum::<f64>() / count,
            confidence,
            domain_match_rate: domain_matches as f64 / count,
            queries: reports,
        };

        info!(
            mode = mode.as_str(),
            mrr = report.mean_mrr,
            ndcg = report.mean_ndcg,
            "Evaluation run complete"
        );
        Ok(report)
    }
}

/// True when the top result's domain appears among the expected domains.
fn rank_one_domain_matches(results: &[SearchResult], expected_urls: &[String]) -> bool {
    let Some(top) = results.first() else {
        return false;
    };
    let top_domain = domain_of(&top.page.url);
    expected_urls
        .iter()
        .any(|url| domain_of(url) == top_domain)
}

/// Host part of a url: scheme and path stripped.
fn domain_of(url: &str) -> &str {
    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}
