//! Page cache write middleware.
//!
//! Runs the handler, then writes the rendered body to the page cache when the exchange is
//! cacheable (GET/HEAD answered with 200). Cache failures are logged; the response is returned
//! to the client unchanged either way.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, header, response},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use tracing::{debug, instrument, warn};

use super::compression::CompressionPolicy;
use super::context::RequestContext;
use super::store::PageCache;

/// Shared state for [`page_cache_layer`].
#[derive(Clone, Debug)]
pub struct PageCacheState {
    pub cache: Arc<PageCache>,
    /// Compression for pages written through this layer.
    pub compression: CompressionPolicy,
}

impl PageCacheState {
    /// State using the cache's configured compression.
    pub fn new(cache: Arc<PageCache>) -> Self {
        let compression = cache.config().compression;
        Self { cache, compression }
    }

    pub fn with_compression(mut self, compression: CompressionPolicy) -> Self {
        self.compression = compression;
        self
    }
}

/// Only successful GET and HEAD exchanges may be written to the page cache.
pub fn caching_allowed(method: &Method, status: StatusCode) -> bool {
    (method == Method::GET || method == Method::HEAD) && status == StatusCode::OK
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(state): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.cache.is_enabled() {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let mut context = RequestContext::from_parts(&parts);
    let response = next.run(Request::from_parts(parts, body)).await;

    context.record_response(response.status(), response.headers());
    if !caching_allowed(context.method(), context.status()) || is_streaming(&response) {
        return response;
    }

    let key = context.cache_key();
    if key.climbs_out_of_root() {
        warn!(path = context.path(), "not caching a path outside the page cache root");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            warn!(error = %error, "failed to buffer response body for page cache");
            return without_body(parts);
        }
    };

    // A HEAD response may already have had its body stripped.
    if context.method() == Method::HEAD && bytes.is_empty() {
        return Response::from_parts(parts, Body::from(bytes));
    }

    let cache = Arc::clone(&state.cache);
    let compression = state.compression;
    let content = bytes.clone();
    let written = tokio::task::spawn_blocking(move || {
        cache.write_for_request(&context, &content, &key, compression)
    })
    .await;

    match written {
        Ok(Ok(())) => debug!(cache = "page", outcome = "stored", "cached response"),
        Ok(Err(error)) => warn!(error = %error, "page cache write failed"),
        Err(error) => warn!(error = %error, "page cache write task failed"),
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Rebuild a response whose body could not be read, dropping the now wrong length.
fn without_body(mut parts: response::Parts) -> Response {
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::empty())
}

fn is_streaming(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
}
