use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// The role an embedding will play.
///
/// Some models prepend a different task prefix (or pick a different
/// projection) for queries than for documents; the core always passes
/// `Query` for user queries and `Document` for stored passages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// A user search query.
    Query,
    /// A passage being indexed.
    Document,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Query => "query",
            TaskType::Document => "document",
        }
    }
}

/// Retrieval mode for a search request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Dense-vector passage ranking only.
    Semantic,
    /// Sparse keyword field scoring only.
    Keyword,
    /// Both rankers fused with weighted Reciprocal Rank Fusion (default).
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Semantic => "semantic",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "semantic" => Some(Self::Semantic),
            "keyword" => Some(Self::Keyword),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Coarse label for how strong the evidence behind a result is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    /// Confidence for a semantic-only result.
    ///
    /// `high` at or above the primary threshold, `medium` within 0.05
    /// below it, `low` otherwise.
    pub fn from_semantic(similarity: f64, threshold: f64) -> Self {
        if similarity >= threshold {
            Confidence::High
        } else if similarity >= threshold - 0.05 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Confidence for a hybrid result.
    ///
    /// `high` requires semantic similarity at or above 0.70 regardless of
    /// keyword agreement; `medium` requires normalized keyword evidence
    /// above 0.5 when the semantic side is weak; everything else is `low`.
    pub fn from_hybrid(similarity: f64, keyword_score: f64, threshold: f64) -> Self {
        if similarity >= threshold {
            Confidence::High
        } else if keyword_score > 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Lifecycle phase of a search request, surfaced in structured logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPhase {
    Pending,
    Embedding,
    Ranking,
    Done,
    Failed,
}

impl QueryPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPhase::Pending => "pending",
            QueryPhase::Embedding => "embedding",
            QueryPhase::Ranking => "ranking",
            QueryPhase::Done => "done",
            QueryPhase::Failed => "failed",
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A bounded text span extracted from a page; the unit of embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable within the page; equals `position`.
    pub id: u32,
    /// Passage text, at most ~200 words.
    pub text: String,
    /// Number of whitespace-separated words in `text`.
    pub word_count: usize,
    /// 0-based order within the page; dense and unique.
    pub position: u32,
    /// Quality score in [0, 1]; passages below the configured minimum are
    /// dropped before storage.
    pub quality: f64,
    /// L2-normalized embedding. `None` only between chunking and
    /// embedding; every stored passage carries `Some`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A fully indexed page with its passages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: Uuid,
    /// Dedup key: re-indexing the same url replaces content and passages.
    pub url: String,
    pub title: String,
    /// Plain extracted text, capped at 10k chars.
    pub content: String,
    /// Ordered passages, 1..=30 once stored.
    pub passages: Vec<Passage>,
    /// First-seen time, ms since epoch. Preserved across re-indexing.
    pub timestamp: i64,
    /// Last time this page was opened from a search result, ms since
    /// epoch. 0 if never.
    pub last_accessed: i64,
    /// Number of times this url was indexed. Always >= 1.
    pub visit_count: u32,
    /// Cumulative dwell time reported by the extractor, seconds.
    pub dwell_time_sec: f64,
}

/// Page-level fields only, for metadata scans that must not touch
/// passage embeddings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub timestamp: i64,
    pub last_accessed: i64,
    pub visit_count: u32,
}

/// Aggregate statistics over the vector store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_pages: u64,
    /// Approximate but monotone under put/delete.
    pub size_bytes: u64,
    /// 0 when the store is empty.
    pub oldest_ts: i64,
    pub newest_ts: i64,
    pub last_access_ts: i64,
}

// =============================================================================
// Requests and results
// =============================================================================

/// Input to the indexing API, as delivered by the extractor collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexRequest {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    /// Visit time, ms since epoch. `None` means "now".
    #[serde(default)]
    pub visited_at: Option<i64>,
    #[serde(default)]
    pub dwell_time_sec: f64,
}

/// Outcome of a successful `index()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub id: Uuid,
    pub indexed_passages: usize,
}

/// Options accepted by `search()`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Maximum results to return.
    pub k: usize,
    /// Primary similarity threshold for semantic selection.
    pub min_similarity: f64,
    pub mode: SearchMode,
    /// Weight of the semantic list in weighted RRF; 1 - alpha goes to
    /// keyword.
    pub alpha: f64,
    pub boost_recent: bool,
    pub boost_frequent: bool,
    pub recency_weight: f64,
    pub frequency_weight: f64,
    /// When true, a hybrid query degrades to keyword-only instead of
    /// failing if the embedding backend is unavailable.
    pub degrade_on_embed_failure: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 10,
            min_similarity: 0.70,
            mode: SearchMode::Hybrid,
            alpha: 0.7,
            boost_recent: true,
            boost_frequent: true,
            recency_weight: 0.15,
            frequency_weight: 0.15,
            degrade_on_embed_failure: false,
        }
    }
}

/// A single ranked search result.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub page: PageRecord,
    /// Best passage similarity from the semantic side; 0.0 if the page
    /// was found by keyword evidence only.
    pub similarity: f64,
    /// The score this result list is ordered by (mode-dependent).
    pub relevance: f64,
    pub mode: SearchMode,
    pub confidence: Confidence,
    /// Normalized keyword score in [0, 1], when the keyword ranker
    /// matched this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_terms: Option<Vec<String>>,
    /// Text of the best-matching passage, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_snippet: Option<String>,
}
