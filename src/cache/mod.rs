//! Page cache
//!
//! Writes the rendered output of a request to a static file under the cache root so a front-end
//! web server can answer later identical requests from disk:
//!
//! - **Path resolution** ([`PathResolver`]): maps a logical request path plus variant signals
//!   (extension, query string) to a file path. Pure, never fails.
//! - **Store** ([`PageCache`]): writes the page and an optional `.gz` sibling, and expires both.
//! - **Integration** ([`page_cache_layer`], [`serve_cached_layer`]): axum middleware that
//!   writes cacheable responses and serves cached pages.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! root = "public"
//! default_extension = ".html"
//! compression = "best"
//! include_query_string = false
//! ```

mod compression;
mod config;
mod context;
mod error;
mod keys;
mod middleware;
mod path;
mod root;
mod serve;
mod store;

pub use compression::{CompressionPolicy, ParseCompressionError, gzip};
pub use config::{DEFAULT_EXTENSION, DEFAULT_ROOT, PageCacheConfig};
pub use context::{RequestContext, extension_for_content_type};
pub use error::PageCacheError;
pub use keys::{CacheEntry, CacheKey, GZIP_SUFFIX};
pub use middleware::{PageCacheState, caching_allowed, page_cache_layer};
pub use path::PathResolver;
pub use root::CacheRoot;
pub use serve::serve_cached_layer;
pub use store::PageCache;
