use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::cache::CompressionPolicy;

/// Command-line arguments for the pagecache binary.
#[derive(Debug, Parser)]
#[command(name = "pagecache", version, about = "Static page cache manager")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PAGECACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve cached pages over HTTP, answering 404 on a miss.
    Serve(Box<ServeArgs>),
    /// Print the file a key resolves to.
    Resolve(ResolveArgs),
    /// Cache content read from a file or stdin.
    Write(WriteArgs),
    /// Remove a cached page and its gzip sibling.
    Expire(ExpireArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Override the cache root directory.
    #[arg(long = "cache-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub root: Option<PathBuf>,

    /// Partition the cache root by request domain.
    #[arg(
        long = "cache-partition-by-domain",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub partition_by_domain: Option<bool>,

    /// Override the extension appended to paths without one.
    #[arg(long = "cache-default-extension", value_name = "EXT")]
    pub default_extension: Option<String>,

    /// Override the gzip policy (none, 0-9, fastest, best).
    #[arg(long = "cache-compression", value_name = "LEVEL")]
    pub compression: Option<CompressionPolicy>,

    /// Toggle per-query-string cache files.
    #[arg(
        long = "cache-include-query-string",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub include_query_string: Option<bool>,

    /// Toggle page caching as a whole.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub enabled: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

/// Identifies one cache entry from the command line.
#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    /// Logical request path, e.g. `/lists/show`.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Extension used when the path has none.
    #[arg(long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Query string of the variant, without the leading `?`.
    #[arg(long, value_name = "QUERY")]
    pub query: Option<String>,

    /// Request host, required when the cache root is partitioned by domain.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub key: KeyArgs,
}

#[derive(Debug, Args, Clone)]
pub struct WriteArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub key: KeyArgs,

    /// File holding the content; stdin when omitted.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ExpireArgs {
    #[command(flatten)]
    pub cache: CacheOverrides,

    #[command(flatten)]
    pub key: KeyArgs,

    /// Additional query-string variants to expire along with the base page.
    #[arg(long = "variant", value_name = "QUERY")]
    pub variants: Vec<String>,
}
