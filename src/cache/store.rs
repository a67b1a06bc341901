//! Filesystem page store.
//!
//! Writes rendered pages (and optional gzip siblings) under the cache root and removes them on
//! expiration. No locking: concurrent writers of one key race and the last completed write wins.
//! Each file is written to a temporary sibling and renamed into place, so readers see either
//! the previous or the new content, never a truncated file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use metrics::counter;
use tracing::{debug, info, instrument};

use super::compression::{CompressionPolicy, gzip};
use super::config::PageCacheConfig;
use super::context::RequestContext;
use super::error::PageCacheError;
use super::keys::{CacheEntry, CacheKey};
use super::path::PathResolver;

const METRIC_WRITE_TOTAL: &str = "pagecache_write_total";
const METRIC_WRITE_BYTES_TOTAL: &str = "pagecache_write_bytes_total";
const METRIC_WRITE_ERROR_TOTAL: &str = "pagecache_write_error_total";
const METRIC_EXPIRE_TOTAL: &str = "pagecache_expire_total";

const TEMP_PREFIX: &str = ".pagecache-";
#[cfg(unix)]
const CACHE_FILE_MODE: u32 = 0o644;

/// Materializes and expires cached pages on disk.
#[derive(Debug, Clone)]
pub struct PageCache {
    config: PageCacheConfig,
    resolver: PathResolver,
}

impl PageCache {
    pub fn new(config: PageCacheConfig) -> Self {
        let resolver = PathResolver::new(config.default_extension.clone());
        Self { config, resolver }
    }

    pub fn config(&self) -> &PageCacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Files backing `key`. Fails when the root is request-bound.
    pub fn entry(&self, key: &CacheKey) -> Result<CacheEntry, PageCacheError> {
        self.locate(None, key)
    }

    pub fn entry_for_request(
        &self,
        request: &RequestContext,
        key: &CacheKey,
    ) -> Result<CacheEntry, PageCacheError> {
        self.locate(Some(request), key)
    }

    /// Cache `content` under `key` outside of any request.
    pub fn write(
        &self,
        content: &[u8],
        key: &CacheKey,
        compression: CompressionPolicy,
    ) -> Result<(), PageCacheError> {
        self.write_in(None, content, key, compression)
    }

    pub fn write_for_request(
        &self,
        request: &RequestContext,
        content: &[u8],
        key: &CacheKey,
        compression: CompressionPolicy,
    ) -> Result<(), PageCacheError> {
        self.write_in(Some(request), content, key, compression)
    }

    /// Remove the page cached under `key` and its gzip sibling. Missing files are fine.
    pub fn expire(&self, key: &CacheKey) -> Result<(), PageCacheError> {
        self.expire_in(None, key)
    }

    pub fn expire_for_request(
        &self,
        request: &RequestContext,
        key: &CacheKey,
    ) -> Result<(), PageCacheError> {
        self.expire_in(Some(request), key)
    }

    /// Remove the base page of `key` plus each listed query-string variant.
    ///
    /// The store keeps no record of which variants were written; callers supply them.
    pub fn expire_all_variants<I, S>(&self, key: &CacheKey, queries: I) -> Result<(), PageCacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expire_variants_in(None, key, queries)
    }

    pub fn expire_all_variants_for_request<I, S>(
        &self,
        request: &RequestContext,
        key: &CacheKey,
        queries: I,
    ) -> Result<(), PageCacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expire_variants_in(Some(request), key, queries)
    }

    fn locate(
        &self,
        request: Option<&RequestContext>,
        key: &CacheKey,
    ) -> Result<CacheEntry, PageCacheError> {
        let root = self.config.root.resolve(request)?;
        let path = self
            .resolver
            .resolve_key(&root, key, self.config.include_query_string);
        Ok(CacheEntry::new(path))
    }

    #[instrument(skip_all, fields(key = %key.path()))]
    fn write_in(
        &self,
        request: Option<&RequestContext>,
        content: &[u8],
        key: &CacheKey,
        compression: CompressionPolicy,
    ) -> Result<(), PageCacheError> {
        if !self.config.enabled {
            debug!("page caching disabled, skipping write");
            return Ok(());
        }

        let entry = self.locate(request, key)?;
        let result = write_entry(&entry, content, compression);
        match &result {
            Ok(()) => {
                counter!(METRIC_WRITE_TOTAL).increment(1);
                counter!(METRIC_WRITE_BYTES_TOTAL).increment(content.len() as u64);
                info!(
                    path = %entry.plain().display(),
                    gzip = compression.is_enabled(),
                    bytes = content.len(),
                    "Write page"
                );
            }
            Err(_) => counter!(METRIC_WRITE_ERROR_TOTAL).increment(1),
        }
        result
    }

    #[instrument(skip_all, fields(key = %key.path()))]
    fn expire_in(
        &self,
        request: Option<&RequestContext>,
        key: &CacheKey,
    ) -> Result<(), PageCacheError> {
        if !self.config.enabled {
            debug!("page caching disabled, skipping expire");
            return Ok(());
        }

        let entry = self.locate(request, key)?;
        remove_if_present(entry.plain())?;
        remove_if_present(entry.gzip())?;
        counter!(METRIC_EXPIRE_TOTAL).increment(1);
        info!(path = %entry.plain().display(), "Expire page");
        Ok(())
    }

    fn expire_variants_in<I, S>(
        &self,
        request: Option<&RequestContext>,
        key: &CacheKey,
        queries: I,
    ) -> Result<(), PageCacheError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expire_in(request, &key.base())?;
        for query in queries {
            self.expire_in(request, &key.variant(query))?;
        }
        Ok(())
    }
}

fn write_entry(
    entry: &CacheEntry,
    content: &[u8],
    compression: CompressionPolicy,
) -> Result<(), PageCacheError> {
    if let Some(parent) = entry.plain().parent() {
        fs::create_dir_all(parent).map_err(|err| PageCacheError::io(parent, err))?;
    }

    replace_file(entry.plain(), content)?;

    match compression.resolve() {
        Some(level) => {
            let compressed = gzip(content, level).map_err(|err| PageCacheError::io(entry.gzip(), err))?;
            replace_file(entry.gzip(), &compressed)
        }
        // A sibling left from an earlier compressed write would serve stale bytes.
        None => remove_if_present(entry.gzip()),
    }
}

/// Write `bytes` to a temporary file next to `path`, then rename it over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), PageCacheError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(CACHE_FILE_MODE));
    }

    let mut file = builder
        .tempfile_in(parent)
        .map_err(|err| PageCacheError::io(parent, err))?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|err| PageCacheError::io(path, err))?;
    file.persist(path)
        .map_err(|err| PageCacheError::io(path, err.error))?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<(), PageCacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(PageCacheError::io(path, err)),
    }
}
