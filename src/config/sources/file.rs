//! TOML file sources: the user-wide config and the working-directory `chunktree.toml`.

use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file
pub const WORKSPACE_FILE: &str = "chunktree.toml";

/// `<platform config dir>/chunktree/config.toml`, if the platform has one
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chunktree")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the user-wide file when present
pub fn add_global(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match global_config_path() {
        Some(path) => add_optional(builder, &path),
        None => builder,
    }
}

/// Add `chunktree.toml` from `dir` when present
pub fn add_workspace(
    builder: ConfigBuilder<DefaultState>,
    dir: &Path,
) -> ConfigBuilder<DefaultState> {
    add_optional(builder, &dir.join(WORKSPACE_FILE))
}

/// Add a file that must exist
pub fn add_required(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path.to_path_buf()).format(FileFormat::Toml).required(true))
}

fn add_optional(builder: ConfigBuilder<DefaultState>, path: &Path) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path.to_path_buf()).format(FileFormat::Toml).required(false))
}
