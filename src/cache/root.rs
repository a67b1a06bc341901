//! Cache root selection: a fixed directory, or one derived from the current request.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::context::RequestContext;
use super::error::PageCacheError;

type RootFn = dyn Fn(&RequestContext) -> PathBuf + Send + Sync;

/// Directory under which cache files are written.
#[derive(Clone)]
pub enum CacheRoot {
    Static(PathBuf),
    /// Evaluated against the request context on every resolution.
    RequestBound(Arc<RootFn>),
}

impl CacheRoot {
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self::Static(path.into())
    }

    pub fn per_request<F>(resolve: F) -> Self
    where
        F: Fn(&RequestContext) -> PathBuf + Send + Sync + 'static,
    {
        Self::RequestBound(Arc::new(resolve))
    }

    /// Partition the cache by registrable domain: `{base}/{domain}`.
    ///
    /// Requests without a host fall back to `base` itself.
    pub fn by_domain(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self::per_request(move |request| match request.domain() {
            Some(domain) => base.join(domain),
            None => base.clone(),
        })
    }

    pub fn is_request_bound(&self) -> bool {
        matches!(self, Self::RequestBound(_))
    }

    /// Evaluate the root. Request-bound roots require `request`.
    pub fn resolve(&self, request: Option<&RequestContext>) -> Result<PathBuf, PageCacheError> {
        match (self, request) {
            (Self::Static(path), _) => Ok(path.clone()),
            (Self::RequestBound(resolve), Some(request)) => Ok(resolve(request)),
            (Self::RequestBound(_), None) => Err(PageCacheError::MissingRequestContext),
        }
    }

    /// The fixed directory, when the root does not depend on requests.
    pub fn as_static(&self) -> Option<&Path> {
        match self {
            Self::Static(path) => Some(path),
            Self::RequestBound(_) => None,
        }
    }
}

impl fmt::Debug for CacheRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(path) => f.debug_tuple("Static").field(path).finish(),
            Self::RequestBound(_) => f.write_str("RequestBound(..)"),
        }
    }
}

impl From<PathBuf> for CacheRoot {
    fn from(path: PathBuf) -> Self {
        Self::Static(path)
    }
}

impl From<&Path> for CacheRoot {
    fn from(path: &Path) -> Self {
        Self::Static(path.to_path_buf())
    }
}
