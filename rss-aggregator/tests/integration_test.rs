mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{feed_url, init_tracing, numbered_items, registry, rss, source, spawn_feed_server, test_fetcher, Item};
use rss_aggregator::api::{self, AppState};
use rss_aggregator::query::{ArticleQueryParams, QueryService};
use rss_aggregator::types::*;
use rss_aggregator::{MemoryArticleStore, RefreshLoop, RssAggregator, SourceRegistry};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn aggregator_with(registry: SourceRegistry, store: Arc<MemoryArticleStore>) -> Arc<RssAggregator> {
    Arc::new(RssAggregator::new(registry, test_fetcher(), store))
}

fn article(source_key: &str, source_name: &str, title: &str, published: DateTime<Utc>) -> Article {
    Article {
        id: Uuid::new_v4(),
        title: title.to_string(),
        summary: format!("Summary for {}", title),
        content: String::new(),
        url: format!("https://{}.example.com/{}", source_key, title.replace(' ', "-").to_lowercase()),
        image_url: None,
        source: source_key.to_string(),
        source_name: source_name.to_string(),
        source_color: "#000000".to_string(),
        category: "technology".to_string(),
        published_date: published,
        created_at: published,
        tags: Vec::new(),
    }
}

/// Registry whose urls are never fetched by the API tests.
fn api_registry() -> SourceRegistry {
    registry(vec![
        source("techcrunch", "http://127.0.0.1:9/techcrunch".to_string()),
        source("wired", "http://127.0.0.1:9/wired".to_string()),
    ])
}

async fn seeded_app(articles: Vec<Article>) -> (Router, Arc<MemoryArticleStore>) {
    let store = Arc::new(MemoryArticleStore::new());
    for a in &articles {
        store.insert_if_absent(a).await.unwrap();
    }

    let registry = api_registry();
    let aggregator = aggregator_with(registry.clone(), store.clone());
    let queries = Arc::new(QueryService::new(store.clone(), registry));
    (api::router(AppState::new(aggregator, queries)), store)
}

async fn send(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri).await
}

fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

#[tokio::test]
async fn test_cycle_inserts_then_is_idempotent() {
    init_tracing();

    let addr = spawn_feed_server(vec![
        ("alpha", rss(&numbered_items("alpha", 3))),
        ("beta", rss(&numbered_items("beta", 4))),
    ])
    .await;
    let store = Arc::new(MemoryArticleStore::new());
    let aggregator = aggregator_with(
        registry(vec![
            source("alpha", feed_url(addr, "/feed/alpha")),
            source("beta", feed_url(addr, "/feed/beta")),
        ]),
        store.clone(),
    );

    let first = aggregator.run_cycle().await.unwrap();
    assert_eq!(first.fetched, 7);
    assert_eq!(first.inserted, 7);
    assert_eq!(first.skipped, 0);
    assert_eq!(first.sources.len(), 2);
    assert!(first.sources.iter().all(|s| s.error.is_none()));

    let second = aggregator.run_cycle().await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 7);
    assert_eq!(store.snapshot().await.len(), 7);
}

#[tokio::test]
async fn test_shared_urls_are_stored_once() {
    init_tracing();

    let shared = Item::new("Cross-posted story", "https://example.com/shared");
    let addr = spawn_feed_server(vec![
        ("one", rss(&[shared.clone(), Item::new("Only in one", "https://example.com/one")])),
        ("two", rss(&[shared, Item::new("Only in two", "https://example.com/two")])),
    ])
    .await;
    let store = Arc::new(MemoryArticleStore::new());
    let aggregator = aggregator_with(
        registry(vec![
            source("one", feed_url(addr, "/feed/one")),
            source("two", feed_url(addr, "/feed/two")),
        ]),
        store.clone(),
    );

    let report = aggregator.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 4);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.skipped, 1);

    let stored = store.snapshot().await;
    let urls: HashSet<&str> = stored.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls.len(), stored.len());
}

#[tokio::test]
async fn test_failing_source_does_not_block_others() {
    init_tracing();

    let addr = spawn_feed_server(vec![("healthy", rss(&numbered_items("healthy", 3)))]).await;
    let store = Arc::new(MemoryArticleStore::new());
    let aggregator = aggregator_with(
        registry(vec![
            source("broken", feed_url(addr, "/error")),
            source("healthy", feed_url(addr, "/feed/healthy")),
        ]),
        store.clone(),
    );

    let report = aggregator.run_cycle().await.unwrap();
    assert_eq!(report.inserted, 3);

    let broken = report.sources.iter().find(|s| s.source == "broken").unwrap();
    assert_eq!(broken.articles, 0);
    assert!(broken.error.as_deref().unwrap().contains("500"));

    let stored = store.snapshot().await;
    assert!(stored.iter().all(|a| a.source == "healthy"));
}

#[tokio::test]
async fn test_overlapping_cycles_never_duplicate() {
    init_tracing();

    let addr = spawn_feed_server(vec![
        ("alpha", rss(&numbered_items("alpha", 5))),
        ("beta", rss(&numbered_items("beta", 5))),
    ])
    .await;
    let store = Arc::new(MemoryArticleStore::new());
    let aggregator = aggregator_with(
        registry(vec![
            source("alpha", feed_url(addr, "/feed/alpha")),
            source("beta", feed_url(addr, "/feed/beta")),
        ]),
        store.clone(),
    );

    let (a, b) = tokio::join!(aggregator.run_cycle(), aggregator.run_cycle());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.inserted + b.inserted, 10);

    let stored = store.snapshot().await;
    assert_eq!(stored.len(), 10);
    let urls: HashSet<&str> = stored.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls.len(), 10);
}

#[tokio::test]
async fn test_unavailable_store_fails_the_cycle() {
    init_tracing();

    let addr = spawn_feed_server(vec![("alpha", rss(&numbered_items("alpha", 2)))]).await;
    let store = Arc::new(MemoryArticleStore::new());
    store.set_unavailable(true);
    let registry = registry(vec![source("alpha", feed_url(addr, "/feed/alpha"))]);
    let aggregator = aggregator_with(registry.clone(), store.clone());

    let result = aggregator.run_cycle().await;
    assert!(matches!(result, Err(AggregatorError::Store(StoreError::Unavailable(_)))));

    let queries = Arc::new(QueryService::new(store.clone(), registry));
    let app = api::router(AppState::new(aggregator, queries));

    let (status, body) = send(&app, Method::POST, "/api/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Error refreshing feeds");

    let (status, body) = get(&app, "/api/articles").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Error querying articles");
    assert!(!body["detail"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_refresh_endpoint_runs_a_cycle() {
    init_tracing();

    let addr = spawn_feed_server(vec![("alpha", rss(&numbered_items("alpha", 3)))]).await;
    let store = Arc::new(MemoryArticleStore::new());
    let registry = registry(vec![source("alpha", feed_url(addr, "/feed/alpha"))]);
    let aggregator = aggregator_with(registry.clone(), store.clone());
    let queries = Arc::new(QueryService::new(store.clone(), registry));
    let app = api::router(AppState::new(aggregator, queries));

    let (status, body) = send(&app, Method::POST, "/api/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Feed refresh completed successfully");
    assert_eq!(body["report"]["inserted"], 3);

    let (_, body) = get(&app, "/api/articles").await;
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_root_liveness() {
    init_tracing();
    let (app, _) = seeded_app(Vec::new()).await;

    for uri in ["/api", "/api/"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Tech News Aggregator API");
    }
}

#[tokio::test]
async fn test_articles_are_paginated_newest_first() {
    init_tracing();

    let articles = (1..=5)
        .map(|i| article("techcrunch", "TechCrunch", &format!("Story {}", i), hours_ago(i)))
        .collect();
    let (app, _) = seeded_app(articles).await;

    let (status, body) = get(&app, "/api/articles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 5);
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 20);
    assert_eq!(body["articles"].as_array().unwrap().len(), 5);

    let (_, body) = get(&app, "/api/articles?page=2&per_page=2").await;
    let titles: Vec<&str> = body["articles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Story 3", "Story 4"]);
    assert_eq!(body["total"], 5);

    let (_, body) = get(&app, "/api/articles?page=9&per_page=2").await;
    assert!(body["articles"].as_array().unwrap().is_empty());
    assert_eq!(body["total"], 5);
}

#[tokio::test]
async fn test_article_json_shape() {
    init_tracing();

    let published = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let (app, _) = seeded_app(vec![article("wired", "Wired", "Shape", published)]).await;

    let (_, body) = get(&app, "/api/articles").await;
    let first = &body["articles"][0];
    assert_eq!(first["published_date"], "2024-06-01T12:00:00Z");
    assert!(first["image_url"].is_null());
    assert!(first["tags"].is_array());
    assert_eq!(first["source_name"], "Wired");
}

#[tokio::test]
async fn test_invalid_parameters_are_rejected() {
    init_tracing();
    let (app, _) = seeded_app(Vec::new()).await;

    for uri in [
        "/api/articles?page=0",
        "/api/articles?per_page=0",
        "/api/articles?per_page=200",
        "/api/articles?hours=0",
        "/api/articles?hours=200",
        "/api/articles?page=abc",
    ] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
        assert!(body["detail"].is_string(), "{}", uri);
    }

    let (status, _) = get(&app, "/api/articles?per_page=100&hours=168").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_source_and_category_filters() {
    init_tracing();

    let (app, _) = seeded_app(vec![
        article("techcrunch", "TechCrunch", "Funding round", hours_ago(1)),
        article("techcrunch", "TechCrunch", "Another round", hours_ago(2)),
        article("wired", "Wired", "Long feature", hours_ago(3)),
    ])
    .await;

    let (_, body) = get(&app, "/api/articles?source=techcrunch").await;
    assert_eq!(body["total"], 2);
    assert!(body["articles"]
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["source"] == "techcrunch"));

    let (_, body) = get(&app, "/api/articles?category=technology").await;
    assert_eq!(body["total"], 3);

    let (_, body) = get(&app, "/api/articles?category=sports").await;
    assert_eq!(body["total"], 0);

    let (_, body) = get(&app, "/api/articles?source=").await;
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_search_matches_title_summary_and_tags() {
    init_tracing();

    let mut tagged = article("wired", "Wired", "Chip roadmap", hours_ago(3));
    tagged.tags = vec!["Hardware".to_string()];
    let mut in_summary = article("wired", "Wired", "Weekly digest", hours_ago(2));
    in_summary.summary = "Everything new in ai this week".to_string();

    let (app, _) = seeded_app(vec![
        article("techcrunch", "TechCrunch", "AI startup raises", hours_ago(1)),
        in_summary,
        tagged,
        article("techcrunch", "TechCrunch", "Phone review", hours_ago(4)),
    ])
    .await;

    let (_, body) = get(&app, "/api/articles?search=AI").await;
    assert_eq!(body["total"], 2);

    let (_, body) = get(&app, "/api/articles?search=Hardware").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["articles"][0]["title"], "Chip roadmap");

    let (_, body) = get(&app, "/api/articles?search=HARDWARE").await;
    assert_eq!(body["total"], 1);

    let (_, body) = get(&app, "/api/articles?search=Hard").await;
    assert_eq!(body["total"], 0);

    let (status, body) = get(&app, "/api/articles?search=zzqxnonsense").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert!(body["articles"].as_array().unwrap().is_empty());

    let (_, body) = get(&app, "/api/articles?search=50%25_off").await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_hours_window_includes_boundary() {
    init_tracing();

    let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();
    let store = Arc::new(MemoryArticleStore::new());
    for a in [
        article("techcrunch", "TechCrunch", "On the boundary", now - Duration::hours(24)),
        article("techcrunch", "TechCrunch", "Just outside", now - Duration::hours(24) - Duration::seconds(1)),
        article("techcrunch", "TechCrunch", "Fresh", now - Duration::hours(1)),
    ] {
        store.insert_if_absent(&a).await.unwrap();
    }
    let queries = QueryService::new(store, api_registry());

    let query = ArticleQueryParams {
        hours: Some(24),
        ..Default::default()
    }
    .validate()
    .unwrap();
    let page = queries.list_articles_at(&query, now).await.unwrap();

    let titles: Vec<&str> = page.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Fresh", "On the boundary"]);
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_sources_endpoint_lists_registry_with_counts() {
    init_tracing();

    let (app, _) = seeded_app(vec![
        article("techcrunch", "TechCrunch", "One", hours_ago(1)),
        article("techcrunch", "TechCrunch", "Two", hours_ago(2)),
    ])
    .await;

    let (status, body) = get(&app, "/api/sources").await;
    assert_eq!(status, StatusCode::OK);

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["key"], "techcrunch");
    assert_eq!(sources[0]["article_count"], 2);
    assert_eq!(sources[1]["key"], "wired");
    assert_eq!(sources[1]["article_count"], 0);
    assert_eq!(sources[1]["category"], "technology");
}

#[tokio::test]
async fn test_stats_endpoint() {
    init_tracing();

    let (app, _) = seeded_app(vec![
        article("techcrunch", "TechCrunch", "Recent one", hours_ago(1)),
        article("techcrunch", "TechCrunch", "Recent two", hours_ago(5)),
        article("wired", "Wired", "Old feature", hours_ago(72)),
    ])
    .await;

    let (status, body) = get(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_articles"], 3);
    assert_eq!(body["recent_articles_24h"], 2);
    assert_eq!(body["by_source"][0]["_id"], "TechCrunch");
    assert_eq!(body["by_source"][0]["count"], 2);
    assert_eq!(body["by_source"][1]["_id"], "Wired");
    assert!(body["last_updated"].is_string());
}

#[tokio::test]
async fn test_refresh_loop_runs_repeatedly() {
    init_tracing();

    let addr = spawn_feed_server(vec![("alpha", rss(&numbered_items("alpha", 2)))]).await;
    let store = Arc::new(MemoryArticleStore::new());
    let aggregator = aggregator_with(
        registry(vec![source("alpha", feed_url(addr, "/feed/alpha"))]),
        store.clone(),
    );

    let refresh = RefreshLoop::spawn(aggregator, std::time::Duration::from_millis(50), true);

    let waited = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while refresh.completed_cycles() < 3 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "refresh loop did not complete three cycles");

    refresh.shutdown();
    assert_eq!(store.snapshot().await.len(), 2);
}
