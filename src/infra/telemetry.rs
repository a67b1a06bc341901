use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "pagecache_write_total",
            Unit::Count,
            "Total number of pages written to the page cache."
        );
        describe_counter!(
            "pagecache_write_bytes_total",
            Unit::Bytes,
            "Total uncompressed bytes written to the page cache."
        );
        describe_counter!(
            "pagecache_write_error_total",
            Unit::Count,
            "Total number of failed page cache writes."
        );
        describe_counter!(
            "pagecache_expire_total",
            Unit::Count,
            "Total number of page cache expirations."
        );
        describe_counter!(
            "pagecache_serve_hit_total",
            Unit::Count,
            "Total number of requests answered from the page cache."
        );
        describe_counter!(
            "pagecache_serve_miss_total",
            Unit::Count,
            "Total number of requests that found no cached page."
        );
    });
}
