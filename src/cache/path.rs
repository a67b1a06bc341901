//! Mapping from logical request paths to cache file locations.
//!
//! Resolution never fails: malformed percent sequences are kept literally and odd paths still
//! produce a file name.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

use super::keys::CacheKey;

const INDEX_NAME: &str = "/index";

/// Pure path resolver parameterized by the default page extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    default_extension: String,
}

impl PathResolver {
    pub fn new(default_extension: impl Into<String>) -> Self {
        Self {
            default_extension: default_extension.into(),
        }
    }

    /// Resolve `key` under `root`. `include_query` is the configured policy; the key's own
    /// override wins when set.
    pub fn resolve_key(&self, root: &Path, key: &CacheKey, include_query: bool) -> PathBuf {
        self.resolve(
            root,
            key.path(),
            key.extension(),
            key.query(),
            key.include_query_override().unwrap_or(include_query),
        )
    }

    pub fn resolve(
        &self,
        root: &Path,
        logical_path: &str,
        extension: Option<&str>,
        query: Option<&str>,
        include_query: bool,
    ) -> PathBuf {
        let relative = self.relative_path(logical_path, extension, query, include_query);
        root.join(relative.trim_start_matches('/'))
    }

    /// Cache file name relative to the root, always starting with `/`.
    pub fn relative_path(
        &self,
        logical_path: &str,
        extension: Option<&str>,
        query: Option<&str>,
        include_query: bool,
    ) -> String {
        let mut name = if logical_path.chars().all(|c| c == '/') {
            INDEX_NAME.to_string()
        } else {
            let decoded = percent_decode_str(logical_path).decode_utf8_lossy();
            let trimmed = decoded.strip_suffix('/').unwrap_or(&*decoded);
            trimmed.to_string()
        };

        if !has_extension(&name) {
            name.push_str(extension.unwrap_or(&self.default_extension));
        }

        if include_query {
            if let Some(query) = query.filter(|query| !query.is_empty()) {
                name.push('?');
                name.push_str(query);
            }
        }

        name
    }
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(super::config::DEFAULT_EXTENSION)
    }
}

fn has_extension(name: &str) -> bool {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    file_name.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(path: &str) -> PathBuf {
        PathResolver::default().resolve(Path::new("/cache"), path, None, None, false)
    }

    #[test]
    fn empty_and_root_paths_map_to_index() {
        assert_eq!(resolve(""), PathBuf::from("/cache/index.html"));
        assert_eq!(resolve("/"), PathBuf::from("/cache/index.html"));
        assert_eq!(resolve("///"), PathBuf::from("/cache/index.html"));
    }

    #[test]
    fn trailing_slash_is_ignored() {
        for path in ["/lists/show", "/a", "/posts/2024/hello", "/caf%C3%A9"] {
            assert_eq!(resolve(path), resolve(&format!("{path}/")), "path {path}");
        }
        assert_eq!(resolve("/lists/show/"), PathBuf::from("/cache/lists/show.html"));
    }

    #[test]
    fn only_one_trailing_slash_is_stripped() {
        assert_eq!(resolve("/x//"), PathBuf::from("/cache/x/.html"));
    }

    #[test]
    fn existing_extension_is_kept() {
        assert_eq!(resolve("/a/b.json"), PathBuf::from("/cache/a/b.json"));
        assert_eq!(resolve("/index.html"), PathBuf::from("/cache/index.html"));
    }

    #[test]
    fn dot_in_directory_does_not_count_as_extension() {
        assert_eq!(resolve("/v1.2/notes"), PathBuf::from("/cache/v1.2/notes.html"));
    }

    #[test]
    fn extension_override_replaces_default() {
        let resolver = PathResolver::default();
        let path = resolver.resolve(Path::new("/cache"), "/feed", Some(".rss"), None, false);
        assert_eq!(path, PathBuf::from("/cache/feed.rss"));
    }

    #[test]
    fn percent_sequences_are_decoded() {
        assert_eq!(
            resolve("/posts/hello%20world"),
            PathBuf::from("/cache/posts/hello world.html")
        );
        assert_eq!(resolve("/caf%C3%A9"), PathBuf::from("/cache/café.html"));
    }

    #[test]
    fn malformed_percent_sequences_pass_through() {
        assert_eq!(resolve("/bad%zz"), PathBuf::from("/cache/bad%zz.html"));
        assert_eq!(resolve("/trail%"), PathBuf::from("/cache/trail%.html"));
    }

    #[test]
    fn query_is_appended_after_extension_when_enabled() {
        let resolver = PathResolver::default();
        let root = Path::new("/cache");
        assert_eq!(
            resolver.resolve(root, "/posts", None, Some("page=2"), true),
            PathBuf::from("/cache/posts.html?page=2")
        );
        assert_eq!(
            resolver.resolve(root, "/a/b.json", None, Some("x=1"), true),
            PathBuf::from("/cache/a/b.json?x=1")
        );
    }

    #[test]
    fn query_is_ignored_when_disabled_or_empty() {
        let resolver = PathResolver::default();
        let root = Path::new("/cache");
        assert_eq!(
            resolver.resolve(root, "/posts", None, Some("page=2"), false),
            PathBuf::from("/cache/posts.html")
        );
        assert_eq!(
            resolver.resolve(root, "/posts", None, Some(""), true),
            PathBuf::from("/cache/posts.html")
        );
    }

    #[test]
    fn root_trailing_separator_does_not_double() {
        let resolver = PathResolver::default();
        for root in ["/cache", "/cache/"] {
            let path = resolver.resolve(Path::new(root), "/lists/show", None, None, false);
            assert_eq!(path.to_str(), Some("/cache/lists/show.html"));
        }
    }

    #[test]
    fn key_override_beats_configured_policy() {
        let resolver = PathResolver::default();
        let key = CacheKey::new("/posts").with_query("a=1").include_query(true);
        assert_eq!(
            resolver.resolve_key(Path::new("/cache"), &key, false),
            PathBuf::from("/cache/posts.html?a=1")
        );

        let key = CacheKey::new("/posts").with_query("a=1");
        assert_eq!(
            resolver.resolve_key(Path::new("/cache"), &key, false),
            PathBuf::from("/cache/posts.html")
        );
    }
}
