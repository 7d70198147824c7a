//! Retrace API crate - the local REST surface for the UI collaborator.
//!
//! Exposes search, indexing, stats, deletion, and access-recording
//! endpoints over axum with a consistent JSON error envelope keyed by
//! the core error kinds.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
