use thiserror::Error;

use retrace_core::error::RetraceError;

/// Errors that can occur while driving an evaluation run.
#[derive(Error, Debug)]
pub enum EvalError {
    /// The retrieval pipeline failed underneath the harness.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] RetraceError),
    /// The query set cannot be evaluated as given.
    #[error("invalid query set: {0}")]
    InvalidQuerySet(String),
}

/// Lets callers that speak the workspace error use `?` across the
/// crate boundary. Pipeline failures unwrap back to their original
/// kind; harness-specific failures surface as invalid arguments.
impl From<EvalError> for RetraceError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Pipeline(inner) => inner,
            EvalError::InvalidQuerySet(msg) => {
                RetraceError::InvalidArgs(format!("invalid query set: {}", msg))
            }
        }
    }
}
