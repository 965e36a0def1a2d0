//! Logging System
//!
//! Structured logging through `tracing`. The subscriber is assembled once at startup from
//! [`LoggingConfig`], with `CHUNKTREE_LOG*` environment variables taking precedence over
//! the config file. Library code only emits events; it never installs a subscriber.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "CHUNKTREE_LOG";
const ENV_FORMAT: &str = "CHUNKTREE_LOG_FORMAT";
const ENV_OUTPUT: &str = "CHUNKTREE_LOG_OUTPUT";
const ENV_FILE: &str = "CHUNKTREE_LOG_FILE";
const ENV_MODULES: &str = "CHUNKTREE_LOG_MODULES";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigurationError::InvalidLogging(format!(
                "format '{}' (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,

    /// trace, debug, info, warn, error, off
    pub level: String,

    pub format: LogFormat,

    /// stdout, stderr, file, file+stderr, both
    pub output: String,

    /// Log file when output includes a file; platform state dir when unset
    pub file: Option<PathBuf>,

    /// ANSI colors for text output on a terminal stream
    pub color: bool,

    /// Per-module levels, e.g. `chunktree::upload = "debug"`
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Text,
            output: "stderr".to_string(),
            file: None,
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

/// Install the global subscriber.
///
/// Returns an error for invalid settings; a subscriber that is already installed is left
/// in place.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigurationError> {
    if !config.enabled {
        let _ = Registry::default().with(EnvFilter::new("off")).try_init();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let writer = build_writer(config, output)?;
    let ansi = config.color && !output.file && format == LogFormat::Text;

    let subscriber = Registry::default().with(filter);
    let result = match format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialized");
    }
    Ok(())
}

/// Log file path: `CHUNKTREE_LOG_FILE`, then the configured file, then the platform state
/// directory.
pub fn resolve_log_file_path(config_file: Option<PathBuf>) -> Result<PathBuf, ConfigurationError> {
    if let Ok(env_path) = std::env::var(ENV_FILE) {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    let project_dirs = directories::ProjectDirs::from("", "", "chunktree").ok_or_else(|| {
        ConfigurationError::InvalidLogging("could not determine platform directories".to_string())
    })?;
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir());
    Ok(dir.join("chunktree.log"))
}

fn build_writer(
    config: &LoggingConfig,
    output: OutputDestinations,
) -> Result<BoxMakeWriter, ConfigurationError> {
    if output.file {
        let path = resolve_log_file_path(config.file.clone())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigurationError::InvalidLogging(format!(
                    "failed to create log directory {:?}: {}",
                    parent, e
                ))
            })?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                ConfigurationError::InvalidLogging(format!(
                    "failed to open log file {:?}: {}",
                    path, e
                ))
            })?;
        let file = Arc::new(file);
        return Ok(if output.stderr {
            BoxMakeWriter::new(file.and(std::io::stderr))
        } else {
            BoxMakeWriter::new(file)
        });
    }
    Ok(match (output.stdout, output.stderr) {
        (true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        (true, false) => BoxMakeWriter::new(std::io::stdout),
        _ => BoxMakeWriter::new(std::io::stderr),
    })
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigurationError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::try_new(&config.level).map_err(|e| {
        ConfigurationError::InvalidLogging(format!("level '{}': {}", config.level, e))
    })?;
    let mut directives: Vec<(String, String)> = config
        .modules
        .iter()
        .map(|(module, level)| (module.clone(), level.clone()))
        .collect();
    if let Ok(modules) = std::env::var(ENV_MODULES) {
        directives.extend(parse_module_levels(&modules));
    }
    for (module, level) in directives {
        let directive = format!("{}={}", module, level);
        filter = filter.add_directive(directive.parse().map_err(|e| {
            ConfigurationError::InvalidLogging(format!("directive '{}': {}", directive, e))
        })?);
    }
    Ok(filter)
}

/// `a=debug,b::c=warn` into pairs; malformed items are ignored.
fn parse_module_levels(directives: &str) -> Vec<(String, String)> {
    directives
        .split(',')
        .filter_map(|item| {
            let (module, level) = item.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            (!module.is_empty() && !level.is_empty())
                .then(|| (module.to_string(), level.to_string()))
        })
        .collect()
}

fn determine_format(config: &LoggingConfig) -> Result<LogFormat, ConfigurationError> {
    match std::env::var(ENV_FORMAT) {
        Ok(format) if !format.is_empty() => format.parse(),
        _ => Ok(config.format),
    }
}

fn determine_output(config: &LoggingConfig) -> Result<OutputDestinations, ConfigurationError> {
    match std::env::var(ENV_OUTPUT) {
        Ok(output) if !output.is_empty() => parse_output_destinations(&output),
        _ => parse_output_destinations(&config.output),
    }
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, ConfigurationError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        "both" => (true, true, false),
        other => {
            return Err(ConfigurationError::InvalidLogging(format!(
                "output '{}' (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                other
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}
