use thiserror::Error;

/// Top-level error type for the Retrace system.
///
/// Each variant corresponds to a stable error kind that callers (the UI,
/// the REST layer) can branch on via [`RetraceError::kind`]. Subsystem
/// crates return this type directly so the `?` operator works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RetraceError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The extractor produced too little text to chunk. The page is
    /// skipped, never stored.
    #[error("Extraction produced no indexable passages: {0}")]
    ExtractionEmpty(String),

    /// The embedding backend could not be initialized or is missing.
    #[error("Embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The embedding backend exceeded its deadline. Transient; callers
    /// may retry.
    #[error("Embedding timed out after {seconds}s")]
    EmbeddingTimeout { seconds: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored record failed validation on read or write.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// The store was written by an incompatible version. Fatal at open.
    #[error("Schema version mismatch: store has v{found}, expected v{expected}")]
    SchemaMismatch { found: i64, expected: i64 },

    /// The operation was cancelled by the caller (or its deadline expired).
    #[error("Operation cancelled")]
    Cancelled,

    /// Programmer error, e.g. a dimension mismatch between a query vector
    /// and the stored vectors.
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetraceError {
    /// Stable machine-readable tag for this error, suitable for a UI or
    /// API client to branch on. Tags never change across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            RetraceError::Config(_) => "config",
            RetraceError::ExtractionEmpty(_) => "extraction_empty",
            RetraceError::EmbeddingUnavailable(_) => "embedding_unavailable",
            RetraceError::EmbeddingTimeout { .. } => "embedding_timeout",
            RetraceError::Storage(_) => "storage",
            RetraceError::CorruptRecord(_) => "corrupt_record",
            RetraceError::SchemaMismatch { .. } => "schema_mismatch",
            RetraceError::Cancelled => "cancelled",
            RetraceError::InvalidArgs(_) => "invalid_args",
            RetraceError::Serialization(_) => "serialization",
            RetraceError::Io(_) => "io",
        }
    }
}

impl From<toml::de::Error> for RetraceError {
    fn from(err: toml::de::Error) -> Self {
        RetraceError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RetraceError {
    fn from(err: toml::ser::Error) -> Self {
        RetraceError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RetraceError {
    fn from(err: serde_json::Error) -> Self {
        RetraceError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Retrace operations.
pub type Result<T> = std::result::Result<T, RetraceError>;
