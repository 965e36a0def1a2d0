//! Environment variable source: CHUNKTREE__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "CHUNKTREE";

/// Add environment variable overlay to builder.
/// `CHUNKTREE__UPLOAD__WORKERS=8` sets `upload.workers`.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    )
}
