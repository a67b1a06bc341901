use thiserror::Error;

/// Errors raised while materializing or expiring page-cache entries.
#[derive(Debug, Error)]
pub enum PageCacheError {
    /// A request-bound cache root was evaluated outside of any request.
    #[error(
        "dynamic cache root used without a request context: a per-request root must be resolved \
         while handling a request; use a static root for writes issued from background jobs or \
         startup code"
    )]
    MissingRequestContext,
    #[error("io error at `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PageCacheError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Returns true when the failure comes from cache-root configuration rather than I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingRequestContext)
    }
}
