//! Per-request view consumed by request-bound cache roots and the write middleware.

use std::net::IpAddr;

use axum::http::{HeaderMap, Method, StatusCode, Uri, header, request};

use super::keys::CacheKey;

/// Snapshot of the request/response pair a page is being cached for.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    status: StatusCode,
    path: String,
    query: Option<String>,
    host: Option<String>,
    content_type: Option<String>,
}

impl RequestContext {
    pub fn new(method: Method, uri: &Uri) -> Self {
        Self {
            method,
            status: StatusCode::OK,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            host: uri.authority().map(|authority| authority.as_str().to_string()),
            content_type: None,
        }
    }

    /// Build a context from incoming request parts, taking the host from the `Host` header
    /// when present.
    pub fn from_parts(parts: &request::Parts) -> Self {
        let mut context = Self::new(parts.method.clone(), &parts.uri);
        if let Some(host) = header_str(&parts.headers, header::HOST) {
            context.host = Some(host.to_string());
        }
        context
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Record the outcome of the handler on the context.
    pub fn record_response(&mut self, status: StatusCode, headers: &HeaderMap) {
        self.status = status;
        self.content_type = header_str(headers, header::CONTENT_TYPE).map(str::to_string);
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Content type without parameters, lowercased (`text/html; charset=utf-8` -> `text/html`).
    pub fn content_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Registrable domain of the host: the last two labels, port stripped.
    ///
    /// `www.foo.com:3000` yields `foo.com`. IP addresses and single-label hosts are returned
    /// unchanged.
    pub fn domain(&self) -> Option<&str> {
        let host = strip_port(self.host.as_deref()?);
        if host.is_empty() {
            return None;
        }
        if host.starts_with('[') || host.parse::<IpAddr>().is_ok() {
            return Some(host);
        }

        let mut dots = host.rmatch_indices('.');
        dots.next();
        match dots.next() {
            Some((index, _)) => Some(&host[index + 1..]),
            None => Some(host),
        }
    }

    /// File extension implied by the response content type, if it is a known page format.
    pub fn format_extension(&self) -> Option<&'static str> {
        self.content_type()
            .as_deref()
            .and_then(extension_for_content_type)
    }

    /// Default cache key for this request: its path, its query string, and the extension of
    /// the rendered format.
    pub fn cache_key(&self) -> CacheKey {
        let mut key = CacheKey::new(self.path.clone());
        if let Some(extension) = self.format_extension() {
            key = key.with_extension(extension);
        }
        if let Some(query) = self.query.as_deref() {
            key = key.with_query(query);
        }
        key
    }
}

/// Map a bare content type onto the extension used for its cache file.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "text/html" | "application/xhtml+xml" => Some(".html"),
        "application/json" => Some(".json"),
        "application/xml" | "text/xml" => Some(".xml"),
        "application/rss+xml" => Some(".rss"),
        "application/atom+xml" => Some(".atom"),
        "text/css" => Some(".css"),
        "text/javascript" | "application/javascript" => Some(".js"),
        "text/plain" => Some(".txt"),
        "text/csv" => Some(".csv"),
        _ => None,
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
