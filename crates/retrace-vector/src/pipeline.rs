//! Page indexing pipeline.
//!
//! Drives one extracted page through chunking, per-passage embedding
//! (task-typed, with title context), and the atomic store write.
//! Re-indexing a url replaces content and embeddings but preserves the
//! first-seen timestamp and increments the visit count.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use retrace_core::cancel::CancelFlag;
use retrace_core::config::ChunkingConfig;
use retrace_core::error::RetraceError;
use retrace_core::types::{IndexOutcome, IndexRequest, PageRecord};
use retrace_storage::PageStore;

use crate::chunker::{chunk, truncate_content};
use crate::embedding::{verify_normalized, DynEmbeddingBackend, EmbeddingRequest};

/// Default per-passage embedding deadline.
const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// The indexing pipeline: chunk, embed, store.
pub struct PageIndexer {
    store: Arc<PageStore>,
    embedder: Arc<dyn DynEmbeddingBackend>,
    chunking: ChunkingConfig,
    embed_timeout: Duration,
}

impl PageIndexer {
    pub fn new(
        store: Arc<PageStore>,
        embedder: Arc<dyn DynEmbeddingBackend>,
        chunking: ChunkingConfig,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            chunking,
            embed_timeout,
        }
    }

    /// Create an indexer with the default chunking config and embedding
    /// deadline.
    pub fn with_defaults(store: Arc<PageStore>, embedder: Arc<dyn DynEmbeddingBackend>) -> Self {
        Self::new(
            store,
            embedder,
            ChunkingConfig::default(),
            DEFAULT_EMBED_TIMEOUT,
        )
    }

    /// Index one extracted page.
    ///
    /// Too-little text surfaces as `ExtractionEmpty` and nothing is
    /// stored. Awaiting each embedding call propagates backend
    /// backpressure; callers bound their own indexing concurrency.
    pub async fn index(
        &self,
        request: IndexRequest,
        cancel: &CancelFlag,
    ) -> Result<IndexOutcome, RetraceError> {
        cancel.check()?;

        let url = request.url.trim();
        if url.is_empty() {
            return Err(RetraceError::InvalidArgs("Page url must not be empty".into()));
        }

        let mut passages = chunk(&request.content, &self.chunking);
        if passages.is_empty() {
            debug!(url, "Page skipped: content below chunking floor");
            return Err(RetraceError::ExtractionEmpty(url.to_string()));
        }

        let title = request.title.trim();
        let title_context = if title.is_empty() { None } else { Some(title) };

        for passage in &mut passages {
            cancel.check()?;
            let embed_request = EmbeddingRequest::document(&passage.text, title_context);
            let vector = tokio::time::timeout(
                self.embed_timeout,
                self.embedder.embed_boxed(embed_request),
            )
            .await
            .map_err(|_| RetraceError::EmbeddingTimeout {
                seconds: self.embed_timeout.as_secs(),
            })??;
            verify_normalized(&vector, "document passage");
            passage.embedding = Some(vector);
        }

        cancel.check()?;

        let now_ms = Utc::now().timestamp_millis();
        let visited_at = request.visited_at.unwrap_or(now_ms);
        let existing = self.store.find_by_url(url)?;

        let record = match existing {
            Some(prior) => PageRecord {
                id: prior.id,
                url: url.to_string(),
                title: title.to_string(),
                content: truncate_content(&request.content, self.chunking.max_content_chars)
                    .to_string(),
                passages,
                // First-seen time survives re-indexing.
                timestamp: prior.timestamp,
                last_accessed: prior.last_accessed,
                visit_count: prior.visit_count + 1,
                dwell_time_sec: prior.dwell_time_sec + request.dwell_time_sec.max(0.0),
            },
            None => PageRecord {
                id: Uuid::new_v4(),
                url: url.to_string(),
                title: title.to_string(),
                content: truncate_content(&request.content, self.chunking.max_content_chars)
                    .to_string(),
                passages,
                timestamp: visited_at,
                last_accessed: 0,
                visit_count: 1,
                dwell_time_sec: request.dwell_time_sec.max(0.0),
            },
        };

        self.store.put(&record)?;

        info!(
            url,
            page_id = %record.id,
            passages = record.passages.len(),
            visit_count = record.visit_count,
            "Page indexed"
        );

        Ok(IndexOutcome {
            id: record.id,
            indexed_passages: record.passages.len(),
        })
    }

    pub fn store(&self) -> &Arc<PageStore> {
        &self.store
    }
}

impl std::fmt::Debug for PageIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageIndexer")
            .field("embed_timeout", &self.embed_timeout)
            .finish()
    }
}
