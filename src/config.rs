//! Configuration
//!
//! Layered application settings. Sources, lowest precedence first: built-in defaults, the
//! user-wide `config.toml`, `chunktree.toml` in the working directory (or an explicit
//! `--config` file), then `CHUNKTREE__SECTION__KEY` environment variables. Command-line
//! flags are applied on top by the CLI.

pub mod facade;
pub mod merge {
    pub mod service;
}
pub mod sources {
    pub mod environment;
    pub mod file;
}

pub use facade::ConfigLoader;

use crate::chunker::ChunkSettings;
use crate::error::ConfigurationError;
use crate::logging::LoggingConfig;
use crate::size::parse_size;
use crate::store::StoreKind;
use crate::tree::ScanOptions;
use crate::upload::UploadOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON file mapping partition names to glob patterns
    pub partitions: Option<PathBuf>,
    pub chunk: ChunkConfig,
    pub scan: ScanOptions,
    pub upload: UploadOptions,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Chunking section, sizes as human-readable strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: String,
    pub min_split_depth: i64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: "10G".to_string(),
            min_split_depth: 1,
        }
    }
}

impl ChunkConfig {
    pub fn resolve(&self) -> Result<ChunkSettings, ConfigurationError> {
        ChunkSettings::new(parse_size(&self.chunk_size)?, self.min_split_depth)
    }
}

/// Object store section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Target directory for the local store
    pub path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    /// Key prefix prepended to every object key
    pub prefix: Option<String>,
    pub token: Option<String>,
    /// Request world-readable objects
    pub public: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chunk_config_resolves() {
        let settings = ChunkConfig::default().resolve().unwrap();
        assert_eq!(settings.chunk_size, 10 * 1024 * 1024 * 1024);
        assert_eq!(settings.min_split_depth, 1);
    }

    #[test]
    fn test_chunk_config_rejects_bad_values() {
        let config = ChunkConfig {
            chunk_size: "ten gigs".to_string(),
            min_split_depth: 1,
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigurationError::InvalidSize(_))
        ));

        let config = ChunkConfig {
            chunk_size: "1M".to_string(),
            min_split_depth: 0,
        };
        assert!(matches!(
            config.resolve(),
            Err(ConfigurationError::InvalidSplitDepth(0))
        ));
    }

    #[test]
    fn test_default_store_is_dry_run() {
        let config = AppConfig::default();
        assert_eq!(config.store.kind, StoreKind::DryRun);
        assert!(config.partitions.is_none());
    }
}
