//! Site client caching and MediaWiki paging against a local mock server

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use ce_import::cache::ResponseCache;
use ce_import::sites::{mediawiki, SiteClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_success_is_cached_and_errors_are_not() {
    let hits = Arc::new(AtomicUsize::new(0));
    let ok_hits = hits.clone();
    let missing_hits = hits.clone();
    let app = Router::new()
        .route(
            "/ok",
            get(move || {
                ok_hits.fetch_add(1, Ordering::SeqCst);
                async { "hello" }
            }),
        )
        .route(
            "/missing",
            get(move || {
                missing_hits.fetch_add(1, Ordering::SeqCst);
                async { (StatusCode::NOT_FOUND, "gone") }
            }),
        );
    let base = spawn(app).await;

    let cache = ResponseCache::in_memory().await.unwrap();
    let client = SiteClient::builder("test").cache(Some(cache.clone())).build().unwrap();

    let first = client.get(&format!("{}/ok", base), &[]).await.unwrap();
    let second = client.get(&format!("{}/ok", base), &[]).await.unwrap();
    assert_eq!(first.body, "hello");
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let missing = client.get(&format!("{}/missing", base), &[]).await.unwrap();
    assert_eq!(missing.status, 404);
    client.get(&format!("{}/missing", base), &[]).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(cache.len().await.unwrap(), 1);

    let err = client.get_ok(&format!("{}/missing", base), &[]).await.unwrap_err();
    assert!(matches!(err, ce_import::ImportError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_download_sends_cookie() {
    let app = Router::new().route(
        "/file.zip",
        get(|headers: HeaderMap| async move {
            match headers.get("cookie").and_then(|v| v.to_str().ok()) {
                Some("imslpdisclaimeraccepted=yes") => (StatusCode::OK, "PK-bytes"),
                _ => (StatusCode::FORBIDDEN, "disclaimer"),
            }
        }),
    );
    let base = spawn(app).await;
    let client = SiteClient::builder("imslp").build().unwrap();

    let bytes = client
        .download(&format!("{}/file.zip", base), Some("imslpdisclaimeraccepted=yes"))
        .await
        .unwrap();
    assert_eq!(bytes, b"PK-bytes");

    let err = client.download(&format!("{}/file.zip", base), None).await.unwrap_err();
    assert!(matches!(err, ce_import::ImportError::Status { status: 403, .. }));
}

/// Two pages of category members joined by a cmcontinue token
async fn categorymembers(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(params.get("cmtitle").map(String::as_str), Some("Category:Mozart, Wolfgang Amadeus"));
    match params.get("cmcontinue").map(String::as_str) {
        None => Json(json!({
            "continue": {"cmcontinue": "page|2", "continue": "-||"},
            "query": {"categorymembers": [
                {"ns": 0, "title": "Ave verum corpus, K.618 (Mozart, Wolfgang Amadeus)"},
                {"ns": 14, "title": "Category:Mozart, Wolfgang Amadeus/Arrangements"}
            ]}
        })),
        Some("page|2") => Json(json!({
            "query": {"categorymembers": [
                {"ns": 0, "title": "Requiem in D minor, K.626 (Mozart, Wolfgang Amadeus)"}
            ]}
        })),
        Some(other) => panic!("unexpected continuation {}", other),
    }
}

#[tokio::test]
async fn test_category_members_follows_continuation() {
    let base = spawn(Router::new().route("/api.php", get(categorymembers))).await;
    let client = SiteClient::builder("imslp").build().unwrap();

    let titles = mediawiki::category_members(&client, &format!("{}/api.php", base), "Mozart, Wolfgang Amadeus")
        .await
        .unwrap();

    assert_eq!(
        titles,
        vec![
            "Ave verum corpus, K.618 (Mozart, Wolfgang Amadeus)".to_string(),
            "Requiem in D minor, K.626 (Mozart, Wolfgang Amadeus)".to_string(),
        ]
    );
}
