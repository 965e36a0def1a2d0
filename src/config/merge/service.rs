//! MergeService: orchestrates sources and deserializes to AppConfig.

use crate::config::sources::{environment, file};
use crate::config::AppConfig;
use config::{Config, ConfigError};
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: global file (lowest) -> `chunktree.toml` in `dir` -> environment (highest).
    pub fn load(dir: &Path) -> Result<AppConfig, ConfigError> {
        let builder = file::add_global(Config::builder());
        let builder = file::add_workspace(builder, dir);
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Load an explicit file with environment overlay; the file must exist.
    pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
        let builder = file::add_required(Config::builder(), path);
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }
}
