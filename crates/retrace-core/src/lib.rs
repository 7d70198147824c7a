//! Retrace core crate - shared types, errors, configuration, cancellation.
//!
//! Everything the pipeline layers agree on lives here: the page/passage
//! data model, search options and results, the workspace-wide error
//! taxonomy with stable kind tags, the TOML configuration, and the
//! cooperative cancellation flag.

pub mod cancel;
pub mod config;
pub mod error;
pub mod types;

pub use cancel::CancelFlag;
pub use config::RetraceConfig;
pub use error::{Result, RetraceError};
pub use types::{
    Confidence, IndexOutcome, IndexRequest, PageMetadata, PageRecord, Passage, QueryPhase,
    SearchMode, SearchOptions, SearchResult, StoreStats, TaskType,
};
