use std::{
    io::{self, Read},
    path::Path,
};

use axum::http::{Method, Uri};
use tracing::info;

use crate::{
    cache::{CacheEntry, CacheKey, CompressionPolicy, PageCache, RequestContext},
    config::KeyArgs,
    infra::error::InfraError,
};

use super::error::AppError;

/// A cache key plus the request it is evaluated for, if any.
#[derive(Debug, Clone)]
pub struct CacheTarget {
    key: CacheKey,
    request: Option<RequestContext>,
}

impl CacheTarget {
    pub fn new(key: CacheKey) -> Self {
        Self { key, request: None }
    }

    /// Evaluate the target as if requested through `host`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let request = RequestContext::new(Method::GET, &Uri::from_static("/")).with_host(host);
        self.request = Some(request);
        self
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl From<&KeyArgs> for CacheTarget {
    fn from(args: &KeyArgs) -> Self {
        let mut key = CacheKey::new(args.path.as_str());
        if let Some(extension) = args.extension.as_deref() {
            key = key.with_extension(dotted(extension));
        }
        if let Some(query) = args.query.as_deref() {
            key = key.with_query(query);
        }

        let target = Self::new(key);
        match args.host.as_deref() {
            Some(host) => target.with_host(host),
            None => target,
        }
    }
}

fn dotted(extension: &str) -> String {
    if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{extension}")
    }
}

pub fn resolve(cache: &PageCache, target: &CacheTarget) -> Result<CacheEntry, AppError> {
    let entry = match target.request.as_ref() {
        Some(request) => cache.entry_for_request(request, &target.key)?,
        None => cache.entry(&target.key)?,
    };
    Ok(entry)
}

/// Write `content` for `target`, returning the files that now back it.
pub fn write(
    cache: &PageCache,
    target: &CacheTarget,
    content: &[u8],
    compression: CompressionPolicy,
) -> Result<CacheEntry, AppError> {
    match target.request.as_ref() {
        Some(request) => cache.write_for_request(request, content, &target.key, compression)?,
        None => cache.write(content, &target.key, compression)?,
    }
    resolve(cache, target)
}

/// Expire `target`, and each query-string variant when any are listed.
pub fn expire(cache: &PageCache, target: &CacheTarget, variants: &[String]) -> Result<(), AppError> {
    let queries = variants.iter().cloned();
    match (target.request.as_ref(), variants.is_empty()) {
        (Some(request), true) => cache.expire_for_request(request, &target.key)?,
        (None, true) => cache.expire(&target.key)?,
        (Some(request), false) => {
            cache.expire_all_variants_for_request(request, &target.key, queries)?
        }
        (None, false) => cache.expire_all_variants(&target.key, queries)?,
    }

    info!(
        path = target.key.path(),
        variants = variants.len(),
        "expired cached page"
    );
    Ok(())
}

/// Read page content from `input`, or from stdin when absent.
pub fn read_content(input: Option<&Path>) -> Result<Vec<u8>, AppError> {
    let content = match input {
        Some(path) => std::fs::read(path).map_err(InfraError::from)?,
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut buffer)
                .map_err(InfraError::from)?;
            buffer
        }
    };
    Ok(content)
}
