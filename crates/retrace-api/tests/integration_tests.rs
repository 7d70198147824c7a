//! Integration tests for the Retrace API.
//!
//! Each test builds an independent router over an in-memory store and
//! the mock embedding backend, then drives it with tower's oneshot.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use retrace_api::{create_router, AppState};
use retrace_core::config::RetraceConfig;
use retrace_search::QueryService;
use retrace_storage::{Database, PageStore};
use retrace_vector::MockEmbedding;

// =============================================================================
// Helpers
// =============================================================================

fn make_app() -> axum::Router {
    let store = Arc::new(PageStore::new(Arc::new(Database::in_memory().unwrap())));
    let service = QueryService::new(
        store,
        Arc::new(MockEmbedding::new()),
        &RetraceConfig::default(),
    );
    create_router(AppState::new(Arc::new(service)), 3040)
}

fn sample_content() -> &'static str {
    "React hooks let function components hold state and run side effects. The useState \
     hook returns a value and a setter, while useEffect schedules work after render. \
     Rules of hooks require calling them unconditionally at the top level of the \
     component so the framework can track them between renders reliably."
}

fn index_body(url: &str) -> String {
    serde_json::json!({
        "url": url,
        "title": "React Hooks",
        "content": sample_content(),
        "visited_at": 1_700_000_000_000i64,
        "dwell_time_sec": 12.0,
    })
    .to_string()
}

fn post_json(uri: &str, json: String) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Index one page and return its id.
async fn index_page(app: &axum::Router, url: &str) -> String {
    let resp = app
        .clone()
        .oneshot(post_json("/index", index_body(url)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    json["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health_reports_page_count() {
    let app = make_app();
    let resp = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["total_pages"], 0);
}

#[tokio::test]
async fn test_index_returns_id_and_passage_count() {
    let app = make_app();
    let resp = app
        .oneshot(post_json("/index", index_body("https://react.dev/learn")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert!(json["id"].as_str().is_some());
    assert!(json["indexed_passages"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_index_rejects_short_content() {
    let app = make_app();
    let body = serde_json::json!({
        "url": "https://example.com/stub",
        "title": "",
        "content": "too short",
    })
    .to_string();

    let resp = app.oneshot(post_json("/index", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(resp).await;
    assert_eq!(json["error"], "extraction_empty");
}

#[tokio::test]
async fn test_search_finds_indexed_page() {
    let app = make_app();
    index_page(&app, "https://react.dev/learn").await;

    let uri = format!(
        "/search?q={}",
        urlencode(sample_content())
    );
    let resp = app
        .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["results"][0]["url"], "https://react.dev/learn");
    assert_eq!(json["results"][0]["confidence"], "high");
    assert!(json["results"][0]["similarity"].as_f64().unwrap() > 0.99);
}

#[tokio::test]
async fn test_search_requires_query() {
    let app = make_app();
    let resp = app
        .oneshot(Request::get("/search").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json = body_json(resp).await;
    assert_eq!(json["error"], "invalid_args");
}

#[tokio::test]
async fn test_search_rejects_unknown_mode() {
    let app = make_app();
    let resp = app
        .oneshot(
            Request::get("/search?q=anything&mode=fuzzy")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_rejects_out_of_range_alpha() {
    let app = make_app();
    let resp = app
        .oneshot(
            Request::get("/search?q=anything&alpha=1.5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_empty_store_returns_empty_list() {
    let app = make_app();
    let resp = app
        .oneshot(
            Request::get("/search?q=rust+ownership")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_stats_after_index() {
    let app = make_app();
    index_page(&app, "https://react.dev/learn").await;

    let resp = app
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["total_pages"], 1);
    assert!(json["size_bytes"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_delete_page_removes_it() {
    let app = make_app();
    let id = index_page(&app, "https://react.dev/learn").await;

    let resp = app
        .clone()
        .oneshot(
            Request::delete(format!("/pages/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stats = app
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(stats).await;
    assert_eq!(json["total_pages"], 0);
}

#[tokio::test]
async fn test_delete_rejects_malformed_id() {
    let app = make_app();
    let resp = app
        .oneshot(
            Request::delete("/pages/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_record_access_updates_stats() {
    let app = make_app();
    let id = index_page(&app, "https://react.dev/learn").await;

    let resp = app
        .clone()
        .oneshot(
            Request::post(format!("/pages/{}/accessed", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stats = app
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(stats).await;
    assert!(json["last_access_ts"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_clear_wipes_store() {
    let app = make_app();
    index_page(&app, "https://react.dev/learn").await;
    index_page(&app, "https://react.dev/reference").await;

    let resp = app
        .clone()
        .oneshot(Request::post("/clear").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stats = app
        .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(stats).await;
    assert_eq!(json["total_pages"], 0);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = make_app();
    let resp = app
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

/// Minimal percent-encoding for query strings in tests.
fn urlencode(text: &str) -> String {
    let mut out = String::new();
    for byte in text.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push_str("%20"),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}
