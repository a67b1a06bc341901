mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};

use crate::cache::{PageCache, PageCacheState, page_cache_layer, serve_cached_layer};

pub use middleware::log_responses;

/// Router that only answers from the page cache, with 404 on a miss.
pub fn build_router(cache: Arc<PageCache>) -> Router {
    let router = Router::new()
        .route("/_health", get(health))
        .fallback(not_found);

    router
        .layer(from_fn_with_state(cache, serve_cached_layer))
        .layer(from_fn(log_responses))
}

/// Wrap an application router so cacheable responses are written to, and served from, `cache`.
///
/// Cached pages are answered before the application runs; misses reach it and, when
/// cacheable, are written on the way out.
pub fn with_page_cache<S>(router: Router<S>, cache: Arc<PageCache>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let state = PageCacheState::new(Arc::clone(&cache));
    router
        .layer(from_fn_with_state(state, page_cache_layer))
        .layer(from_fn_with_state(cache, serve_cached_layer))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
