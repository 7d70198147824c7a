//! Application state shared across all route handlers.
//!
//! AppState holds the query service and server metadata, passed to
//! handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use retrace_search::QueryService;

/// Shared application state. Cheap to clone across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// The retrieval pipeline facade.
    pub service: Arc<QueryService>,
    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}
