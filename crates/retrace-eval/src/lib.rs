//! Retrace eval crate - offline evaluation harness for the retrieval
//! pipeline.
//!
//! Provides the metric suite (Precision@k, Recall@k, MRR, graded
//! NDCG@k), a curated 35-page documentation corpus with graded queries,
//! a deterministic lexicon embedder, and the harness that drives the
//! real index/search path and aggregates a report.

pub mod corpus;
pub mod error;
pub mod harness;
pub mod lexicon;
pub mod metrics;

pub use corpus::{builtin_corpus, builtin_queries, EvalQuery, TestPage};
pub use error::EvalError;
pub use harness::{ConfidenceDistribution, EvalHarness, EvalReport, QueryReport};
pub use lexicon::LexiconEmbedding;
