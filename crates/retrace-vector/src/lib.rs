//! Retrace vector crate - chunking, embedding backends, and the page
//! indexing pipeline.
//!
//! Provides content-to-passage chunking with quality scoring, the
//! embedding backend contract (task-typed requests, ONNX production
//! backend, deterministic mock for tests), the availability probe, and
//! the indexer that ties them to the page store.

pub mod chunker;
pub mod embedding;
pub mod pipeline;

pub use chunker::{chunk, truncate_content};
pub use embedding::{
    BackendProbe, DynEmbeddingBackend, EmbeddingBackend, EmbeddingRequest, MockEmbedding,
    OnnxEmbeddingBackend,
};
pub use pipeline::PageIndexer;
