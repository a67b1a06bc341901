//! Serve pages straight from the page cache, falling through to the application on a miss.
//!
//! This is the in-process counterpart of a front-end server's "try the file first" rule.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{debug, warn};

use super::context::RequestContext;
use super::keys::CacheEntry;
use super::store::PageCache;

const METRIC_SERVE_HIT_TOTAL: &str = "pagecache_serve_hit_total";
const METRIC_SERVE_MISS_TOTAL: &str = "pagecache_serve_miss_total";

pub async fn serve_cached_layer(
    State(cache): State<Arc<PageCache>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.is_enabled() || !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let context = RequestContext::from_parts(&parts);
    let request = Request::from_parts(parts, body);

    let key = context.cache_key();
    if key.climbs_out_of_root() {
        warn!(path = context.path(), "refusing to serve a path outside the page cache root");
        return next.run(request).await;
    }

    let entry = match cache.entry_for_request(&context, &key) {
        Ok(entry) => entry,
        Err(error) => {
            warn!(error = %error, "cannot resolve page cache entry");
            return next.run(request).await;
        }
    };

    let gzip = accepts_gzip(request.headers());
    match read_entry(&entry, gzip).await {
        Some((bytes, compressed)) => {
            counter!(METRIC_SERVE_HIT_TOTAL).increment(1);
            debug!(cache = "page", outcome = "hit", path = %entry.plain().display(), "serving cached page");
            cached_response(entry.plain(), bytes, compressed)
        }
        None => {
            counter!(METRIC_SERVE_MISS_TOTAL).increment(1);
            next.run(request).await
        }
    }
}

/// Read the gzip sibling when acceptable and present, else the plain file.
async fn read_entry(entry: &CacheEntry, gzip: bool) -> Option<(Vec<u8>, bool)> {
    if gzip {
        if let Some(bytes) = read_if_present(entry.gzip()).await {
            return Some((bytes, true));
        }
    }
    read_if_present(entry.plain()).await.map(|bytes| (bytes, false))
}

async fn read_if_present(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(error) if error.kind() == ErrorKind::NotFound => None,
        Err(error) => {
            warn!(error = %error, path = %path.display(), "unreadable page cache file");
            None
        }
    }
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|coding| {
            let mut params = coding.split(';');
            let name = params.next().unwrap_or_default().trim();
            let refused = params.any(|param| quality(param) == Some(0.0));
            (name.eq_ignore_ascii_case("gzip") || name == "*") && !refused
        })
}

/// The `q` weight of one coding parameter, if it is one.
fn quality(param: &str) -> Option<f32> {
    let (name, value) = param.split_once('=')?;
    if !name.trim().eq_ignore_ascii_case("q") {
        return None;
    }
    value.trim().parse().ok()
}

fn cached_response(plain: &Path, bytes: Vec<u8>, compressed: bool) -> Response {
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(content_type_for(plain).as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
    if compressed {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    response
}

/// Guess the content type from the file name, ignoring any cached query suffix.
fn content_type_for(plain: &Path) -> mime_guess::Mime {
    let name = plain.to_string_lossy();
    let without_query = name.split('?').next().unwrap_or_default();
    mime_guess::from_path(without_query).first_or_octet_stream()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(accept_encoding: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_str(accept_encoding).unwrap(),
        );
        headers
    }

    #[test]
    fn gzip_acceptance_is_detected() {
        assert!(accepts_gzip(&headers("gzip, deflate, br")));
        assert!(accepts_gzip(&headers("br;q=1.0, GZIP;q=0.5")));
        assert!(accepts_gzip(&headers("*")));
        assert!(!accepts_gzip(&headers("br, deflate")));
        assert!(!accepts_gzip(&headers("gzip;q=0")));
        assert!(!accepts_gzip(&headers("gzip; q=0.")));
        assert!(!accepts_gzip(&headers("gzip;Q=0.000")));
        assert!(accepts_gzip(&headers("gzip;q=0.001")));
        assert!(!accepts_gzip(&HeaderMap::new()));
    }

    #[test]
    fn content_type_ignores_query_suffix() {
        assert_eq!(
            content_type_for(Path::new("/cache/posts.html?page=2")).essence_str(),
            "text/html"
        );
        assert_eq!(
            content_type_for(Path::new("/cache/a/b.json")).essence_str(),
            "application/json"
        );
    }
}
