use std::{fs, io::Read, path::Path, sync::Arc};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware,
    response::{Html, IntoResponse},
    routing::get,
};
use flate2::read::GzDecoder;
use http_body_util::BodyExt;
use pagecache::cache::{
    CacheRoot, CompressionPolicy, PageCache, PageCacheConfig, PageCacheState, page_cache_layer,
};
use tempfile::TempDir;
use tower::ServiceExt;

const LISTS_BODY: &str = "<h1>lists</h1>";

fn app(state: PageCacheState) -> Router {
    Router::new()
        .route(
            "/lists/show",
            get(|| async { Html(LISTS_BODY) }).post(|| async { Html("<p>created</p>") }),
        )
        .route(
            "/api/data",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{\"ok\":true}") }),
        )
        .route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, Html("gone")) }),
        )
        .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/events",
            get(|| async {
                ([(header::CONTENT_TYPE, "text/event-stream")], "data: 1\n\n").into_response()
            }),
        )
        .layer(middleware::from_fn_with_state(state, page_cache_layer))
}

fn cache_in(dir: &Path) -> Arc<PageCache> {
    Arc::new(PageCache::new(PageCacheConfig::default().with_root(dir)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build")
}

#[tokio::test]
async fn successful_get_is_written_and_returned_unchanged() {
    let dir = TempDir::new().expect("tempdir");
    let app = app(PageCacheState::new(cache_in(dir.path())));

    let (status, body) = send(&app, get_request("/lists/show")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, LISTS_BODY);
    let cached = fs::read_to_string(dir.path().join("lists/show.html")).expect("cached page");
    assert_eq!(cached, LISTS_BODY);
    assert!(!dir.path().join("lists/show.html.gz").exists());
}

#[tokio::test]
async fn uncacheable_exchanges_leave_no_files() {
    let dir = TempDir::new().expect("tempdir");
    let app = app(PageCacheState::new(cache_in(dir.path())));

    let post = Request::builder()
        .method(Method::POST)
        .uri("/lists/show")
        .body(Body::empty())
        .expect("request should build");
    let (status, _) = send(&app, post).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get_request("/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "gone");

    let (status, _) = send(&app, get_request("/empty")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get_request("/events")).await;
    assert_eq!(status, StatusCode::OK);

    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("cache root readable")
        .collect();
    assert!(entries.is_empty(), "unexpected cache files: {entries:?}");
}

#[tokio::test]
async fn json_responses_use_json_extension() {
    let dir = TempDir::new().expect("tempdir");
    let app = app(PageCacheState::new(cache_in(dir.path())));

    let (status, _) = send(&app, get_request("/api/data")).await;

    assert_eq!(status, StatusCode::OK);
    let cached = fs::read_to_string(dir.path().join("api/data.json")).expect("cached json");
    assert_eq!(cached, "{\"ok\":true}");
}

#[tokio::test]
async fn query_strings_are_separate_files_when_enabled() {
    let dir = TempDir::new().expect("tempdir");
    let config = PageCacheConfig::default()
        .with_root(dir.path())
        .with_query_string(true);
    let app = app(PageCacheState::new(Arc::new(PageCache::new(config))));

    send(&app, get_request("/lists/show?page=2")).await;

    assert!(dir.path().join("lists/show.html?page=2").exists());
    assert!(!dir.path().join("lists/show.html").exists());
}

#[tokio::test]
async fn query_strings_are_ignored_by_default() {
    let dir = TempDir::new().expect("tempdir");
    let app = app(PageCacheState::new(cache_in(dir.path())));

    send(&app, get_request("/lists/show?page=2")).await;

    assert!(dir.path().join("lists/show.html").exists());
    assert!(!dir.path().join("lists/show.html?page=2").exists());
}

#[tokio::test]
async fn domain_partition_follows_host_header() {
    let dir = TempDir::new().expect("tempdir");
    let config = PageCacheConfig::default().with_root(CacheRoot::by_domain(dir.path()));
    let app = app(PageCacheState::new(Arc::new(PageCache::new(config))));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/lists/show")
        .header(header::HOST, "blog.example.org:3000")
        .body(Body::empty())
        .expect("request should build");
    send(&app, request).await;

    assert!(dir.path().join("example.org/lists/show.html").exists());
}

#[tokio::test]
async fn compression_override_writes_gzip_sibling() {
    let dir = TempDir::new().expect("tempdir");
    let state = PageCacheState::new(cache_in(dir.path())).with_compression(CompressionPolicy::BEST);
    let app = app(state);

    send(&app, get_request("/lists/show")).await;

    let compressed = fs::read(dir.path().join("lists/show.html.gz")).expect("gzip sibling");
    let mut decoded = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut decoded)
        .expect("valid gzip");
    assert_eq!(decoded, LISTS_BODY);
}

#[tokio::test]
async fn disabled_cache_passes_through() {
    let dir = TempDir::new().expect("tempdir");
    let config = PageCacheConfig {
        enabled: false,
        ..PageCacheConfig::default().with_root(dir.path())
    };
    let app = app(PageCacheState::new(Arc::new(PageCache::new(config))));

    let (status, body) = send(&app, get_request("/lists/show")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, LISTS_BODY);
    assert!(!dir.path().join("lists/show.html").exists());
}

#[tokio::test]
async fn write_failure_does_not_affect_response() {
    let dir = TempDir::new().expect("tempdir");
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").expect("blocker file");
    let app = app(PageCacheState::new(cache_in(&blocker)));

    let (status, body) = send(&app, get_request("/lists/show")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, LISTS_BODY);
}

#[tokio::test]
async fn catch_all_responses_never_write_outside_root() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("public");
    let app = Router::new()
        .fallback(|| async { Html("<p>spa shell</p>") })
        .layer(middleware::from_fn_with_state(
            PageCacheState::new(cache_in(&root)),
            page_cache_layer,
        ));

    let (status, body) = send(&app, get_request("/%2e%2e/evil.sh")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<p>spa shell</p>");
    assert!(!dir.path().join("evil.sh").exists());

    let (status, _) = send(&app, get_request("/docs/%2E%2E%2F%2e%2e/evil.sh")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!dir.path().join("evil.sh").exists());

    // Ordinary paths through the same fallback are still cached inside the root.
    send(&app, get_request("/app/dashboard")).await;
    assert!(root.join("app/dashboard.html").exists());
}
