//! Gzip level policy for the compressed sibling file.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Deserialize;
use thiserror::Error;

/// Highest gzip level accepted by zlib.
pub const MAX_LEVEL: u32 = 9;
/// zlib `BEST_SPEED`.
pub const FASTEST_LEVEL: u32 = 1;
/// zlib `BEST_COMPRESSION`.
pub const BEST_LEVEL: u32 = MAX_LEVEL;

/// Whether, and how hard, to gzip a cached page into its `.gz` sibling.
///
/// Level 0 is accepted but resolves to no sibling at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionPolicy {
    #[default]
    Disabled,
    Level(u32),
}

impl CompressionPolicy {
    pub const FASTEST: Self = Self::Level(FASTEST_LEVEL);
    pub const BEST: Self = Self::Level(BEST_LEVEL);

    /// Effective gzip level, or `None` when no sibling should be written.
    pub fn resolve(self) -> Option<Compression> {
        match self {
            Self::Disabled | Self::Level(0) => None,
            Self::Level(level) => Some(Compression::new(level.min(MAX_LEVEL))),
        }
    }

    pub fn is_enabled(self) -> bool {
        self.resolve().is_some()
    }
}

impl fmt::Display for CompressionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("none"),
            Self::Level(level) => write!(f, "{level}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(
    "invalid compression `{0}`: expected none, a level 0-9, fastest/best_speed or best/best_compression"
)]
pub struct ParseCompressionError(String);

impl FromStr for CompressionPolicy {
    type Err = ParseCompressionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "none" | "off" | "false" | "disabled" => Ok(Self::Disabled),
            "fastest" | "best_speed" | "fast" => Ok(Self::FASTEST),
            "best" | "best_compression" | "true" => Ok(Self::BEST),
            "default" | "default_compression" => Ok(Self::Level(Compression::default().level())),
            other => match other.parse::<u32>() {
                Ok(level) if level <= MAX_LEVEL => Ok(Self::Level(level)),
                _ => Err(ParseCompressionError(value.to_string())),
            },
        }
    }
}

/// Accepts `false`/`true`, an integer level, or a named alias.
impl<'de> Deserialize<'de> for CompressionPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Level(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(Self::Disabled),
            Raw::Flag(true) => Ok(Self::BEST),
            Raw::Level(level) => u32::try_from(level)
                .ok()
                .filter(|level| *level <= MAX_LEVEL)
                .map(Self::Level)
                .ok_or_else(|| {
                    serde::de::Error::custom(ParseCompressionError(level.to_string()))
                }),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Gzip `content` in memory at the given level.
pub fn gzip(content: &[u8], level: Compression) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(content.len() / 2 + 64), level);
    encoder.write_all(content)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    #[test]
    fn aliases_resolve_to_zlib_levels() {
        assert_eq!("best".parse(), Ok(CompressionPolicy::Level(9)));
        assert_eq!("best_compression".parse(), Ok(CompressionPolicy::Level(9)));
        assert_eq!("fastest".parse(), Ok(CompressionPolicy::Level(1)));
        assert_eq!("BEST_SPEED".parse(), Ok(CompressionPolicy::Level(1)));
        assert_eq!("none".parse(), Ok(CompressionPolicy::Disabled));
        assert_eq!("4".parse(), Ok(CompressionPolicy::Level(4)));
    }

    #[test]
    fn out_of_range_levels_are_rejected() {
        assert!("10".parse::<CompressionPolicy>().is_err());
        assert!("-1".parse::<CompressionPolicy>().is_err());
        assert!("maximum".parse::<CompressionPolicy>().is_err());
    }

    #[test]
    fn level_zero_writes_no_sibling() {
        assert!(!CompressionPolicy::Level(0).is_enabled());
        assert!(!CompressionPolicy::Disabled.is_enabled());
        assert!(CompressionPolicy::FASTEST.is_enabled());
    }

    #[test]
    fn oversized_level_is_clamped() {
        let level = CompressionPolicy::Level(42).resolve().expect("enabled");
        assert_eq!(level.level(), MAX_LEVEL);
    }

    #[test]
    fn gzip_output_decodes_to_input() {
        let content = b"<html><body>cached page</body></html>".repeat(20);
        let compressed = gzip(&content, Compression::best()).expect("gzip");

        let mut decoded = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut decoded)
            .expect("gunzip");
        assert_eq!(decoded, content);
    }
}
