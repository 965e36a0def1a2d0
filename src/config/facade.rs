//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::AppConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a run started in `dir`.
    pub fn load(dir: &Path) -> Result<AppConfig, ConfigError> {
        MergeService::load(dir)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Use `explicit` when given, otherwise the layered sources for `dir`.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<AppConfig, ConfigError> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None => Self::load(dir),
        }
    }

    /// Create default configuration.
    pub fn default() -> AppConfig {
        AppConfig::default()
    }
}
