//! Cache key and on-disk entry definitions.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Suffix of the gzip sibling written next to a cached page.
pub const GZIP_SUFFIX: &str = ".gz";

/// Logical identity of a cached page.
///
/// The query string is an opaque literal: two keys whose queries differ only in parameter
/// order map to different files. Callers wanting one file per parameter set must canonicalize
/// before building the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    extension: Option<String>,
    query: Option<String>,
    include_query: Option<bool>,
}

impl CacheKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            extension: None,
            query: None,
            include_query: None,
        }
    }

    /// Extension used when the path has none, overriding the configured default.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Override the configured `include_query_string` policy for this key only.
    pub fn include_query(mut self, include: bool) -> Self {
        self.include_query = Some(include);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn include_query_override(&self) -> Option<bool> {
        self.include_query
    }

    /// True when the decoded path or the query contains a `..` segment, so the resolved file
    /// could land outside the cache root. Keys taken from HTTP requests must be checked.
    pub fn climbs_out_of_root(&self) -> bool {
        let decoded = percent_decode_str(&self.path).decode_utf8_lossy();
        let query = self.query.as_deref().unwrap_or_default();
        has_parent_segment(&decoded) || has_parent_segment(query)
    }

    /// Same key without any query string.
    pub fn base(&self) -> Self {
        Self {
            query: None,
            include_query: Some(false),
            ..self.clone()
        }
    }

    /// Same key addressing the given query-string variant.
    pub fn variant(&self, query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            include_query: Some(true),
            ..self.clone()
        }
    }
}

impl From<&str> for CacheKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for CacheKey {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// The pair of files backing one cached page: the plain file and its gzip sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    plain: PathBuf,
    gzip: PathBuf,
}

impl CacheEntry {
    pub fn new(plain: PathBuf) -> Self {
        let gzip = sibling_with_suffix(&plain, GZIP_SUFFIX);
        Self { plain, gzip }
    }

    pub fn plain(&self) -> &Path {
        &self.plain
    }

    pub fn gzip(&self) -> &Path {
        &self.gzip
    }
}

fn has_parent_segment(value: &str) -> bool {
    value.split(['/', '\\']).any(|segment| segment == "..")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
