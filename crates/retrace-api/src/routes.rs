//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, and all
//! endpoint handlers. The API is local-only; CORS admits localhost
//! origins so a browser extension popup or dashboard can call it.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState, port: u16) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            format!("http://127.0.0.1:{}", port)
                .parse::<HeaderValue>()
                .expect("static origin is a valid header value"),
            format!("http://localhost:{}", port)
                .parse::<HeaderValue>()
                .expect("static origin is a valid header value"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/search", get(handlers::search))
        .route(
            "/index",
            post(handlers::index).layer(DefaultBodyLimit::max(256 * 1024)),
        )
        .route("/stats", get(handlers::stats))
        .route("/pages/{id}", delete(handlers::delete_page))
        .route("/pages/{id}/accessed", post(handlers::record_access))
        .route("/clear", post(handlers::clear))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(state)
}
