use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, SecondsFormat, Utc};
use realty_news::config::{CategoryConfig, ListApiConfig, CATEGORIES};
use realty_news::{
    Config, DelayRange, FetchConfig, Fetcher, ListApiSource, NewsAggregator, RssFeedSource,
    SourceAdapter, SourceRegistry,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Clone, Default)]
struct MockState {
    feed_hits: Arc<AtomicUsize>,
    api_hits: Arc<AtomicUsize>,
    api_bodies: Arc<Mutex<Vec<Value>>>,
    api_headers: Arc<Mutex<Vec<HeaderMap>>>,
}

fn rss_doc(title: &str, items: &[(&str, &str, i64)]) -> String {
    let now = Utc::now();
    let items: String = items
        .iter()
        .map(|(item_title, link, hours_ago)| {
            format!(
                "<item><title>{}</title><link>{}</link><description>&lt;p&gt;{}&lt;/p&gt;</description><pubDate>{}</pubDate></item>",
                item_title,
                link,
                item_title,
                (now - Duration::hours(*hours_ago)).to_rfc2822()
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{}</title>{}</channel></rss>"#,
        title, items
    )
}

async fn feed_a(State(state): State<MockState>) -> Response {
    state.feed_hits.fetch_add(1, Ordering::SeqCst);
    (
        [(header::CONTENT_TYPE, "application/rss+xml")],
        rss_doc(
            "Feed A",
            &[("A fresh", "http://a/1", 1), ("A old", "http://a/2", 24 * 5)],
        ),
    )
        .into_response()
}

async fn feed_b(State(state): State<MockState>) -> Response {
    state.feed_hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn feed_c(State(state): State<MockState>) -> Response {
    state.feed_hits.fetch_add(1, Ordering::SeqCst);
    // no channel title: label falls back to the host
    let body = rss_doc("", &[("C newest", "http://c/1", 0), ("C mid", "http://c/2", 30)]);
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn api_entry(id: &str, hours_ago: i64) -> Value {
    json!({
        "entries": {
            "id": id,
            "url": format!("https://api-news/{}", id),
            "title": format!("Entry {}", id),
            "content": format!("<p>content {}</p>", id),
            "publishedAt": (Utc::now() - Duration::hours(hours_ago)).to_rfc3339_opts(SecondsFormat::Millis, true),
            "author": null
        },
        "feeds": {"title": "Realty Wire", "url": "https://realty-wire/feed"}
    })
}

/// First page has two recent entries, every later page is empty.
async fn entries(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let page = state.api_hits.fetch_add(1, Ordering::SeqCst);
    state.api_bodies.lock().unwrap().push(body);
    state.api_headers.lock().unwrap().push(headers);

    if page == 0 {
        Json(json!({"code": 0, "data": [api_entry("e1", 2), api_entry("e2", 5)]}))
    } else {
        Json(json!({"code": 0, "data": []}))
    }
}

async fn entries_failing(State(state): State<MockState>) -> StatusCode {
    state.api_hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::UNAUTHORIZED
}

/// First page succeeds, every later page is a server error.
async fn entries_flaky(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let page = state.api_hits.fetch_add(1, Ordering::SeqCst);
    state.api_bodies.lock().unwrap().push(body);
    if page == 0 {
        Json(json!({"code": 0, "data": [api_entry("f1", 1), api_entry("f2", 3)]})).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response()
    }
}

async fn entries_rejecting(State(state): State<MockState>) -> Json<Value> {
    state.api_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({"code": 1, "message": "invalid list"}))
}

async fn spawn_mock_server() -> (String, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/feed-a.xml", get(feed_a))
        .route("/feed-b.xml", get(feed_b))
        .route("/feed-c.xml", get(feed_c))
        .route("/entries", post(entries))
        .route("/entries-failing", post(entries_failing))
        .route("/entries-flaky", post(entries_flaky))
        .route("/entries-rejecting", post(entries_rejecting))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("local addr should exist");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });
    (format!("http://{}", address), state)
}

fn category(key: &str) -> CategoryConfig {
    let entry = CATEGORIES
        .iter()
        .find(|c| c.key == key)
        .expect("category in catalogue");
    CategoryConfig::unconfigured(entry)
}

fn api_config(base: &str, path: &str) -> ListApiConfig {
    ListApiConfig {
        endpoint: format!("{}{}", base, path),
        origin: "https://app.example".to_string(),
        app_name: "Test Web".to_string(),
        cookie: Some("session=abc".to_string()),
    }
}

fn fetcher() -> Arc<Fetcher> {
    Arc::new(
        Fetcher::new(FetchConfig {
            timeout_seconds: 5,
            ..FetchConfig::default()
        })
        .expect("client should build"),
    )
}

fn offset() -> chrono::FixedOffset {
    realty_news::render::offset_from_hours(8)
}

#[tokio::test]
async fn rss_source_skips_failing_feed_and_keeps_the_rest() {
    init_tracing();
    let (base, state) = spawn_mock_server().await;

    let mut news = category("news");
    news.rss_urls = vec![
        format!("{}/feed-a.xml", base),
        format!("{}/feed-b.xml", base),
        format!("{}/feed-c.xml", base),
    ];
    let source = RssFeedSource::new(&news, fetcher(), DelayRange::none(), offset());

    let payload = source.fetch().await.expect("rss fetch never fails");
    assert_eq!(state.feed_hits.load(Ordering::SeqCst), 3);

    let titles: Vec<&str> = payload.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["C newest", "A fresh", "C mid"]);

    let items = source.transform(payload, "news");
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.item_type == "news"));
    assert_eq!(items[0].source, "127.0.0.1");
    assert_eq!(items[1].source, "Feed A");
    assert_eq!(items[1].id, realty_news::rss_utils::id::generate_item_id("http://a/1"));
    assert_eq!(items[1].description, "A fresh");
    assert_eq!(items[1].details.content_html, "<p>A fresh</p>");
    assert_eq!(items[1].details.feed_url.as_deref(), Some(format!("{}/feed-a.xml", base).as_str()));
    assert_eq!(items[1].authors, "未知");

    let html = source.render(&items[1]);
    assert!(html.contains("📰 A fresh"));
    assert!(html.contains(r#"href="http://a/1""#));
}

#[tokio::test]
async fn rss_source_without_urls_makes_no_request() {
    init_tracing();
    let (_base, state) = spawn_mock_server().await;

    let source = RssFeedSource::new(&category("city"), fetcher(), DelayRange::none(), offset());
    let payload = source.fetch().await.unwrap();
    assert!(payload.is_empty());
    assert_eq!(state.feed_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn list_api_without_list_id_makes_no_request() {
    init_tracing();
    let (base, state) = spawn_mock_server().await;

    let source = ListApiSource::new(
        &category("market"),
        api_config(&base, "/entries"),
        fetcher(),
        DelayRange::none(),
        offset(),
    );
    let payload = source.fetch().await.unwrap();
    assert!(payload.is_empty());
    assert_eq!(state.api_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn list_api_stops_after_empty_page_and_keeps_earlier_items() {
    init_tracing();
    let (base, state) = spawn_mock_server().await;

    let mut policy = category("policy");
    policy.list_id = Some("list-42".to_string());
    policy.page_count = 3;
    policy.api_days = 1;
    let source = ListApiSource::new(
        &policy,
        api_config(&base, "/entries"),
        fetcher(),
        DelayRange::none(),
        offset(),
    );

    let payload = source.fetch().await.unwrap();
    assert_eq!(state.api_hits.load(Ordering::SeqCst), 2);
    assert_eq!(payload.items.len(), 2);

    let bodies = state.api_bodies.lock().unwrap().clone();
    assert_eq!(bodies[0]["listId"], "list-42");
    assert_eq!(bodies[0]["view"], 1);
    assert_eq!(bodies[0]["withContent"], true);
    assert!(bodies[0].get("publishedAfter").is_none());
    // cursor is the oldest entry of the first page
    let oldest = payload.items.iter().map(|i| i.published_at).min().unwrap();
    assert_eq!(
        bodies[1]["publishedAfter"],
        oldest.to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    let headers = state.api_headers.lock().unwrap().clone();
    assert_eq!(headers[0]["cookie"], "session=abc");
    assert_eq!(headers[0]["origin"], "https://app.example");
    assert_eq!(headers[0]["x-app-name"], "Test Web");
    assert_eq!(headers[0]["content-type"], "application/json");
    assert!(headers[0].contains_key("user-agent"));

    let items = source.transform(payload, "policy");
    assert_eq!(items[0].id, "e1");
    assert_eq!(items[0].authors, "Realty Wire");
    assert_eq!(items[0].source, "Realty Wire");
    assert_eq!(items[0].description, "content e1");
}

#[tokio::test]
async fn list_api_failure_returns_empty_payload() {
    init_tracing();
    let (base, state) = spawn_mock_server().await;

    let mut news = category("news");
    news.list_id = Some("list-1".to_string());
    news.page_count = 2;
    let source = ListApiSource::new(
        &news,
        api_config(&base, "/entries-failing"),
        fetcher(),
        DelayRange::none(),
        offset(),
    );

    let payload = source.fetch().await.unwrap();
    assert!(payload.is_empty());
    assert_eq!(state.api_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn list_api_keeps_earlier_pages_when_a_later_page_fails() {
    init_tracing();
    let (base, state) = spawn_mock_server().await;

    let mut market = category("market");
    market.list_id = Some("list-7".to_string());
    market.page_count = 2;
    let source = ListApiSource::new(
        &market,
        api_config(&base, "/entries-flaky"),
        fetcher(),
        DelayRange::none(),
        offset(),
    );

    let payload = source.fetch().await.unwrap();
    assert_eq!(state.api_hits.load(Ordering::SeqCst), 2);
    let ids: Vec<&str> = payload.items.iter().filter_map(|i| i.id.as_deref()).collect();
    assert_eq!(ids, vec!["f1", "f2"]);

    let bodies = state.api_bodies.lock().unwrap().clone();
    assert!(bodies[1].get("publishedAfter").is_some());
}

#[tokio::test]
async fn list_api_non_zero_code_stops_paging() {
    init_tracing();
    let (base, state) = spawn_mock_server().await;

    let mut city = category("city");
    city.list_id = Some("list-3".to_string());
    city.page_count = 3;
    let source = ListApiSource::new(
        &city,
        api_config(&base, "/entries-rejecting"),
        fetcher(),
        DelayRange::none(),
        offset(),
    );

    let payload = source.fetch().await.unwrap();
    assert!(payload.is_empty());
    assert_eq!(state.api_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn list_api_recency_window_drops_stale_entries() {
    init_tracing();
    let (base, _state) = spawn_mock_server().await;

    let mut city = category("city");
    city.list_id = Some("list-9".to_string());
    city.api_days = 0;
    let source = ListApiSource::new(
        &city,
        api_config(&base, "/entries"),
        fetcher(),
        DelayRange::none(),
        offset(),
    );

    // both entries are hours old, a zero-day window keeps nothing
    let payload = source.fetch().await.unwrap();
    assert!(payload.is_empty());
}

#[tokio::test]
async fn registry_from_config_aggregates_both_adapters() {
    init_tracing();
    let (base, _state) = spawn_mock_server().await;

    let mut config = Config {
        list_api: api_config(&base, "/entries"),
        rss_delay: DelayRange::none(),
        api_delay: DelayRange::none(),
        ..Config::default()
    };
    for category in config.categories.iter_mut().filter(|c| c.key == "news") {
        category.rss_urls = vec![format!("{}/feed-a.xml", base), format!("{}/feed-b.xml", base)];
        category.list_id = Some("list-news".to_string());
    }

    let registry = Arc::new(SourceRegistry::from_config(&config).unwrap());
    let aggregator = NewsAggregator::new(registry);
    let all = aggregator.aggregate_all().await;

    assert_eq!(
        all.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["city", "market", "news", "policy"]
    );
    assert!(all["market"].is_empty());
    assert!(all["city"].is_empty());
    assert!(all["policy"].is_empty());

    let news = &all["news"];
    let titles: Vec<&str> = news.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["A fresh", "Entry e1", "Entry e2"]);
    assert!(news.windows(2).all(|w| w[0].published_date >= w[1].published_date));
}
