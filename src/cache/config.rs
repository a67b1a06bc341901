//! Page cache configuration.
//!
//! Built from the `[cache]` section of `pagecache.toml`, or constructed directly by embedders
//! that need a request-bound root.

use std::path::PathBuf;

use super::compression::CompressionPolicy;
use super::root::CacheRoot;

pub const DEFAULT_EXTENSION: &str = ".html";
pub const DEFAULT_ROOT: &str = "public";

#[derive(Debug, Clone)]
pub struct PageCacheConfig {
    /// Master switch; when off, writes and expirations do nothing.
    pub enabled: bool,
    pub root: CacheRoot,
    /// Appended to paths without an extension. Always starts with `.`.
    pub default_extension: String,
    /// Compression applied by the write middleware.
    pub compression: CompressionPolicy,
    /// Whether query strings produce distinct cache files. Overridable per key.
    pub include_query_string: bool,
}

impl Default for PageCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: CacheRoot::Static(PathBuf::from(DEFAULT_ROOT)),
            default_extension: DEFAULT_EXTENSION.to_string(),
            compression: CompressionPolicy::Disabled,
            include_query_string: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for PageCacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        let root = if settings.partition_by_domain {
            CacheRoot::by_domain(settings.root.clone())
        } else {
            CacheRoot::Static(settings.root.clone())
        };

        Self {
            enabled: settings.enabled,
            root,
            default_extension: settings.default_extension.clone(),
            compression: settings.compression,
            include_query_string: settings.include_query_string,
        }
    }
}

impl PageCacheConfig {
    pub fn with_root(mut self, root: impl Into<CacheRoot>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_compression(mut self, compression: CompressionPolicy) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_query_string(mut self, include: bool) -> Self {
        self.include_query_string = include;
        self
    }
}
