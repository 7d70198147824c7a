//! Retrace search crate - rankers, fusion, caching, and the query
//! service.
//!
//! Provides passage-first semantic ranking with threshold + fallback
//! selection, weighted keyword field scoring, hybrid fusion via weighted
//! Reciprocal Rank Fusion, a bounded TTL query cache, and the
//! QueryService facade that ties them together for the UI and the
//! answer-generation collaborator.

pub mod cache;
pub mod fusion;
pub mod keyword;
pub mod semantic;
pub mod service;

pub use cache::QueryCache;
pub use fusion::{fuse, FusedHit};
pub use keyword::{tokenize, KeywordHit, KeywordRanker};
pub use semantic::{SemanticHit, SemanticOptions, SemanticRanker};
pub use service::QueryService;
