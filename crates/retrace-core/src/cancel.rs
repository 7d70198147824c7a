//! Cooperative cancellation flag.
//!
//! Every public Retrace operation accepts a [`CancelFlag`] and checks it
//! at its suspension points (before embedding, before store scans,
//! before fusion). Cancellation is cooperative: in-flight backend calls
//! finish or time out, but their output is discarded and the operation
//! returns `Cancelled`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, RetraceError};

/// Shared cancellation signal, cheap to clone across tasks.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation was requested.
    ///
    /// Called at each suspension point of an operation.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RetraceError::Cancelled)
        } else {
            Ok(())
        }
    }
}
