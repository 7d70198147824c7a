//! The query service: the public search and indexing facade.
//!
//! Composes the indexing pipeline, both rankers, fusion, and the query
//! cache behind one API: `search`, `index`, `stats`, `delete`, `clear`,
//! `record_search_access`. Every operation takes a cancellation flag and
//! runs under a deadline; a search request moves through the phases
//! `Pending -> Embedding -> Ranking -> Done|Failed`, surfaced in logs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use retrace_core::cancel::CancelFlag;
use retrace_core::config::RetraceConfig;
use retrace_core::error::RetraceError;
use retrace_core::types::{
    Confidence, IndexOutcome, IndexRequest, QueryPhase, SearchMode, SearchOptions, SearchResult,
    StoreStats,
};
use retrace_storage::PageStore;
use retrace_vector::embedding::{verify_normalized, DynEmbeddingBackend, EmbeddingRequest};
use retrace_vector::PageIndexer;

use crate::cache::{embedding_key, results_key, QueryCache};
use crate::fusion::fuse;
use crate::keyword::KeywordRanker;
use crate::semantic::{SemanticHit, SemanticOptions, SemanticRanker};

/// Public facade over the retrieval pipeline.
///
/// Explicitly constructed from its resources (store, embedding backend,
/// config) and injected wherever search is needed; there is no global
/// instance.
pub struct QueryService {
    store: Arc<PageStore>,
    embedder: Arc<dyn DynEmbeddingBackend>,
    indexer: PageIndexer,
    semantic: SemanticRanker,
    keyword: KeywordRanker,
    cache: QueryCache,
    config: retrace_core::config::SearchConfig,
    embed_timeout: Duration,
}

impl QueryService {
    pub fn new(
        store: Arc<PageStore>,
        embedder: Arc<dyn DynEmbeddingBackend>,
        config: &RetraceConfig,
    ) -> Self {
        let embed_timeout = Duration::from_secs(config.embedding.timeout_secs);
        let indexer = PageIndexer::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            config.chunking.clone(),
            embed_timeout,
        );
        let cache = QueryCache::new(
            config.search.cache_size,
            Duration::from_secs(config.search.cache_ttl_secs),
        );

        Self {
            semantic: SemanticRanker::new(Arc::clone(&store)),
            keyword: KeywordRanker::new(Arc::clone(&store)),
            indexer,
            cache,
            config: config.search.clone(),
            embed_timeout,
            store,
            embedder,
        }
    }

    /// Run a search. Empty or whitespace-only queries return an empty
    /// list, not an error. Results are cached per (query, options) until
    /// the next store mutation or TTL expiry.
    pub async fn search(
        &self,
        query: &str,
        opts: SearchOptions,
        cancel: &CancelFlag,
    ) -> Result<Vec<SearchResult>, RetraceError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            phase = QueryPhase::Pending.as_str(),
            query,
            mode = opts.mode.as_str(),
            k = opts.k,
            "Search request"
        );
        cancel.check()?;

        let key = results_key(query, &opts);
        if let Some(results) = self.cache.get_results(&key) {
            debug!(query, "Query cache hit");
            return Ok(results);
        }

        let deadline = Duration::from_secs(self.config.timeout_secs);
        let outcome = match tokio::time::timeout(deadline, self.execute(query, &opts, cancel)).await
        {
            Ok(inner) => inner,
            Err(_) => {
                warn!(query, timeout_secs = self.config.timeout_secs, "Search deadline expired");
                Err(RetraceError::Cancelled)
            }
        };

        match outcome {
            Ok(results) => {
                debug!(
                    phase = QueryPhase::Done.as_str(),
                    query,
                    count = results.len(),
                    "Search complete"
                );
                self.cache.put_results(key, results.clone());
                Ok(results)
            }
            Err(e) => {
                debug!(phase = QueryPhase::Failed.as_str(), query, error = %e, "Search failed");
                Err(e)
            }
        }
    }

    /// Index one extracted page and invalidate the query cache.
    pub async fn index(
        &self,
        request: IndexRequest,
        cancel: &CancelFlag,
    ) -> Result<IndexOutcome, RetraceError> {
        let outcome = self.indexer.index(request, cancel).await?;
        self.cache.invalidate_all();
        Ok(outcome)
    }

    pub fn stats(&self) -> Result<StoreStats, RetraceError> {
        self.store.stats()
    }

    pub fn delete(&self, id: Uuid) -> Result<(), RetraceError> {
        self.store.delete(id)?;
        self.cache.invalidate_all();
        Ok(())
    }

    pub fn clear(&self) -> Result<(), RetraceError> {
        self.store.clear()?;
        self.cache.invalidate_all();
        Ok(())
    }

    /// Record that the user opened a page from a result list.
    pub fn record_search_access(&self, id: Uuid) -> Result<(), RetraceError> {
        self.store.record_search_access(id, Utc::now().timestamp_millis())
    }

    pub fn store(&self) -> &Arc<PageStore> {
        &self.store
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    async fn execute(
        &self,
        query: &str,
        opts: &SearchOptions,
        cancel: &CancelFlag,
    ) -> Result<Vec<SearchResult>, RetraceError> {
        let mut results = match opts.mode {
            SearchMode::Semantic => {
                let query_vec = self.embed_query(query, cancel).await?;
                cancel.check()?;
                debug!(phase = QueryPhase::Ranking.as_str(), "Semantic ranking");
                let hits = self.semantic_candidates(&query_vec, opts, opts.k)?;
                hits.into_iter().map(semantic_to_result).collect()
            }
            SearchMode::Keyword => {
                cancel.check()?;
                debug!(phase = QueryPhase::Ranking.as_str(), "Keyword ranking");
                let hits = self.keyword.rank(query, opts.k)?;
                hits.into_iter()
                    .map(|hit| keyword_to_result(hit, opts.min_similarity))
                    .collect()
            }
            SearchMode::Hybrid => self.execute_hybrid(query, opts, cancel).await?,
        };

        cancel.check()?;
        apply_boosts(&mut results, opts);
        results.truncate(opts.k);
        Ok(results)
    }

    /// Hybrid: both rankers run concurrently, then weighted RRF.
    async fn execute_hybrid(
        &self,
        query: &str,
        opts: &SearchOptions,
        cancel: &CancelFlag,
    ) -> Result<Vec<SearchResult>, RetraceError> {
        let candidates = opts.k.saturating_mul(self.config.search_multiplier).max(opts.k);

        // Keyword ranking is a store scan; run it on the blocking pool
        // while the semantic side awaits the embedding backend.
        let keyword_task = {
            let ranker = self.keyword.clone();
            let query = query.to_string();
            tokio::task::spawn_blocking(move || ranker.rank(&query, candidates))
        };

        let semantic_side = async {
            let query_vec = self.embed_query(query, cancel).await?;
            cancel.check()?;
            debug!(phase = QueryPhase::Ranking.as_str(), "Semantic ranking");
            self.semantic_candidates(&query_vec, opts, candidates)
        };

        let (semantic_result, keyword_joined) = tokio::join!(semantic_side, keyword_task);
        let keyword_hits = keyword_joined
            .map_err(|e| RetraceError::Storage(format!("Keyword ranker task failed: {}", e)))??;

        let semantic_hits = match semantic_result {
            Ok(hits) => hits,
            Err(RetraceError::EmbeddingUnavailable(reason)) if opts.degrade_on_embed_failure => {
                warn!(reason = %reason, "Embedding unavailable; degrading hybrid search to keyword-only");
                return Ok(keyword_hits
                    .into_iter()
                    .map(|hit| keyword_to_result(hit, opts.min_similarity))
                    .collect());
            }
            Err(e) => return Err(e),
        };

        cancel.check()?;
        let fused = fuse(
            semantic_hits,
            keyword_hits,
            opts.alpha,
            self.config.rrf_k,
            opts.k,
        );

        Ok(fused
            .into_iter()
            .map(|hit| {
                let confidence = Confidence::from_hybrid(
                    hit.similarity,
                    hit.keyword_score.unwrap_or(0.0),
                    opts.min_similarity,
                );
                SearchResult {
                    page: hit.page,
                    similarity: hit.similarity,
                    relevance: hit.score,
                    mode: SearchMode::Hybrid,
                    confidence,
                    keyword_score: hit.keyword_score,
                    matched_terms: hit.matched_terms,
                    top_snippet: hit.top_snippet,
                }
            })
            .collect())
    }

    async fn embed_query(
        &self,
        query: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<f32>, RetraceError> {
        cancel.check()?;
        debug!(phase = QueryPhase::Embedding.as_str(), "Embedding query");
        let vector = tokio::time::timeout(
            self.embed_timeout,
            self.embedder.embed_boxed(EmbeddingRequest::query(query)),
        )
        .await
        .map_err(|_| RetraceError::EmbeddingTimeout {
            seconds: self.embed_timeout.as_secs(),
        })??;
        verify_normalized(&vector, "query");
        Ok(vector)
    }

    /// Semantic ranking with the embedding-hash candidate cache in front.
    fn semantic_candidates(
        &self,
        query_vec: &[f32],
        opts: &SearchOptions,
        k: usize,
    ) -> Result<Vec<SemanticHit>, RetraceError> {
        let key = embedding_key(query_vec, k, opts.min_similarity);
        if let Some(hits) = self.cache.get_semantic(key) {
            debug!("Semantic candidate cache hit");
            return Ok(hits);
        }

        let semantic_opts = SemanticOptions {
            k,
            min_similarity: opts.min_similarity,
            fallback_floor: self.config.fallback_floor,
            multi_passage_boost: self.config.multi_passage_boost,
        };
        let hits = self.semantic.rank(query_vec, &semantic_opts)?;
        self.cache.put_semantic(key, hits.clone());
        Ok(hits)
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("embed_timeout", &self.embed_timeout)
            .finish()
    }
}

fn semantic_to_result(hit: SemanticHit) -> SearchResult {
    SearchResult {
        similarity: hit.similarity,
        relevance: hit.relevance,
        mode: SearchMode::Semantic,
        confidence: hit.confidence,
        keyword_score: None,
        matched_terms: None,
        top_snippet: Some(hit.top_snippet),
        page: hit.page,
    }
}

fn keyword_to_result(hit: crate::keyword::KeywordHit, min_similarity: f64) -> SearchResult {
    let confidence = Confidence::from_hybrid(0.0, hit.normalized_score, min_similarity);
    SearchResult {
        similarity: 0.0,
        relevance: hit.score,
        mode: SearchMode::Keyword,
        confidence,
        keyword_score: Some(hit.normalized_score),
        matched_terms: Some(hit.matched_terms),
        top_snippet: None,
        page: hit.page,
    }
}

/// Recency/frequency boosts, applied once after ranking or fusion.
///
/// Multiplicative so the boost stays scale-free across semantic scores
/// (~0..1.2) and RRF scores (~1/60); the ordering within a mode is then
/// re-established by one stable sort.
fn apply_boosts(results: &mut [SearchResult], opts: &SearchOptions) {
    if results.is_empty() || (!opts.boost_recent && !opts.boost_frequent) {
        return;
    }

    let now_ms = Utc::now().timestamp_millis();
    for result in results.iter_mut() {
        let mut multiplier = 1.0;
        if opts.boost_recent {
            let age_days = (now_ms - result.page.timestamp).max(0) as f64 / 86_400_000.0;
            multiplier += opts.recency_weight * (-age_days / 30.0).exp();
        }
        if opts.boost_frequent {
            let frequency =
                ((1.0 + result.page.visit_count as f64).ln() / 101f64.ln()).min(1.0);
            multiplier += opts.frequency_weight * frequency;
        }
        result.relevance *= multiplier;
    }

    results.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
