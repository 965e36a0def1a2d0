//! CLI Tooling
//!
//! Command-line interface for planning and uploading chunked archives. Each command
//! loads the layered configuration, applies flag overrides on top, and returns the text
//! to print.

use crate::chunker::ChunkSettings;
use crate::config::{AppConfig, ConfigLoader};
use crate::error::ApiError;
use crate::logging::{init_logging, LogFormat};
use crate::observer::{PipelineObserver, Stage, TracingObserver};
use crate::partition::PartitionSet;
use crate::pipeline::{self, Plan};
use crate::render::{
    format_section_heading, partition_summary_table, render_tree, upload_summary_table,
};
use crate::size::format_size;
use crate::store::{self, StoreKind};
use crate::tree::{ScanOptions, Tree, TreeBuilder, TreeSnapshot};
use crate::upload::Uploader;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory under the scanned root where upload snapshots are saved
pub const SNAPSHOT_DIR: &str = ".trees";

/// chunktree - partition file trees into size-bounded archives
#[derive(Parser)]
#[command(name = "chunktree")]
#[command(about = "Partition file trees into size-bounded archives and upload them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Shorthand for --log-level debug
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a directory and show how it would be archived
    Plan {
        #[command(flatten)]
        plan: PlanArgs,
        /// Show archive contents
        #[arg(long)]
        full: bool,
    },
    /// Plan, confirm and upload the archives
    Upload {
        #[command(flatten)]
        plan: PlanArgs,
        #[command(flatten)]
        upload: UploadArgs,
    },
    /// Print a saved tree snapshot
    Show {
        snapshot: PathBuf,
        /// Show archive contents
        #[arg(long)]
        full: bool,
    },
}

/// Scan and chunking flags shared by `plan` and `upload`
#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Directory to archive
    pub path: PathBuf,

    /// JSON file mapping partition names to glob patterns
    #[arg(long)]
    pub partitions: Option<PathBuf>,

    /// Target archive size, e.g. 200M or 10G
    #[arg(long)]
    pub chunk_size: Option<String>,

    /// Nodes at this depth or shallower are always split (root = 1)
    #[arg(long)]
    pub min_split_depth: Option<i64>,

    /// Exclude glob; may be repeated
    #[arg(long)]
    pub exclude: Vec<String>,

    #[arg(long)]
    pub follow_symlinks: bool,

    /// Keep `.` and `_` prefixed entries
    #[arg(long)]
    pub include_hidden: bool,

    /// Where to save partition snapshots
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

/// Upload-only flags
#[derive(Args, Debug, Clone, Default)]
pub struct UploadArgs {
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,

    /// Replace objects that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Keep materialized archives after upload
    #[arg(long)]
    pub keep: bool,

    /// Concurrent archive jobs
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long, value_enum)]
    pub store: Option<StoreKind>,

    /// Target directory for the local store
    #[arg(long)]
    pub target: Option<PathBuf>,

    /// Make uploaded objects world-readable
    #[arg(long)]
    pub public: bool,
}

/// Text produced by a command and whether it fully succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl From<String> for CommandOutput {
    fn from(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }
}

/// CLI context for command execution
pub struct CliContext {
    config: AppConfig,
    observer: TracingObserver,
}

impl CliContext {
    /// Load configuration, apply global flag overrides and install logging.
    pub fn new(cli: &Cli) -> Result<Self, ApiError> {
        let cwd = std::env::current_dir()?;
        let mut config = ConfigLoader::resolve(cli.config.as_deref(), &cwd)?;
        apply_logging_flags(&mut config, cli)?;
        init_logging(&config.logging)?;
        Ok(Self::with_config(config))
    }

    /// Context over an already resolved configuration; logging is left alone.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            observer: TracingObserver,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Plan { plan, full } => self.handle_plan(plan, *full).map(Into::into),
            Commands::Upload { plan, upload } => self.handle_upload(plan, upload),
            Commands::Show { snapshot, full } => {
                self.handle_show(snapshot, *full).map(Into::into)
            }
        }
    }

    fn handle_plan(&self, args: &PlanArgs, full: bool) -> Result<String, ApiError> {
        let (_, plan) = self.prepare(args)?;
        let mut out = format_plan(&plan, full);
        if let Some(dir) = &args.save_dir {
            out.push_str(&self.save(&plan, dir)?);
        }
        Ok(out)
    }

    fn handle_upload(
        &self,
        args: &PlanArgs,
        flags: &UploadArgs,
    ) -> Result<CommandOutput, ApiError> {
        let (tree, plan) = self.prepare(args)?;
        println!("{}", format_plan(&plan, false));

        let mut store_config = self.config.store.clone();
        if let Some(kind) = flags.store {
            store_config.kind = kind;
        }
        if let Some(target) = &flags.target {
            store_config.path = Some(target.clone());
        }
        store_config.public |= flags.public;
        let store = store::from_config(&store_config)?;

        if !flags.yes {
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Upload {} archive(s) to the {} store?",
                    plan.archive_count(),
                    describe_store(store_config.kind)
                ))
                .default(false)
                .interact()
                .map_err(|e| ApiError::Prompt(e.to_string()))?;
            if !confirmed {
                return Ok("Upload cancelled".to_string().into());
            }
        }

        let mut options = self.config.upload.clone();
        options.overwrite |= flags.overwrite;
        options.keep |= flags.keep;
        if let Some(workers) = flags.workers {
            options.workers = workers;
        }
        let uploader = Uploader::new(store, options);

        let runtime = tokio::runtime::Runtime::new()?;
        let reports = runtime.block_on(pipeline::upload(&plan, &uploader, &self.observer))?;

        let mut out = format!(
            "{}\n\n{}\n",
            format_section_heading("Upload"),
            upload_summary_table(&reports)
        );
        for report in &reports {
            if let Some(kept) = &report.kept_dir {
                out.push_str(&format!("Archives kept in {}\n", kept.display()));
            }
        }
        let save_dir = args
            .save_dir
            .clone()
            .unwrap_or_else(|| root_path(&tree).join(SNAPSHOT_DIR));
        out.push_str(&self.save(&plan, &save_dir)?);

        Ok(CommandOutput {
            text: out,
            success: reports.iter().all(|r| r.is_success()),
        })
    }

    fn handle_show(&self, snapshot: &Path, full: bool) -> Result<String, ApiError> {
        let tree = TreeSnapshot::load(snapshot)?.restore()?;
        let heading = if tree.name().is_empty() {
            snapshot.display().to_string()
        } else {
            tree.name().to_string()
        };
        Ok(format!(
            "{}\n\n{}\n{} archive(s), {} total\n",
            format_section_heading(&heading),
            render_tree(&tree, full),
            tree.archives().len(),
            format_size(tree.total_size())
        ))
    }

    /// Scan `args.path` and plan it with flags layered over the configuration.
    fn prepare(&self, args: &PlanArgs) -> Result<(Tree, Plan), ApiError> {
        let settings = self.chunk_settings(args)?;
        let partitions = match args.partitions.as_ref().or(self.config.partitions.as_ref()) {
            Some(path) => PartitionSet::load(path)?,
            None => PartitionSet::single(),
        };

        let mut scan: ScanOptions = self.config.scan.clone();
        scan.exclude.extend(args.exclude.iter().cloned());
        scan.follow_symlinks |= args.follow_symlinks;
        scan.include_hidden |= args.include_hidden;

        self.observer
            .stage(Stage::Scanning, &args.path.display().to_string());
        let tree = TreeBuilder::new(scan)?.build(&args.path)?;
        info!(
            files = tree.leaf_paths().len(),
            size = %format_size(tree.total_size()),
            chunk_size = %format_size(settings.chunk_size),
            "Scan complete"
        );

        let plan = pipeline::plan(&tree, &partitions, &settings, &self.observer)?;
        Ok((tree, plan))
    }

    fn chunk_settings(&self, args: &PlanArgs) -> Result<ChunkSettings, ApiError> {
        let mut chunk = self.config.chunk.clone();
        if let Some(size) = &args.chunk_size {
            chunk.chunk_size = size.clone();
        }
        if let Some(depth) = args.min_split_depth {
            chunk.min_split_depth = depth;
        }
        Ok(chunk.resolve()?)
    }

    fn save(&self, plan: &Plan, dir: &Path) -> Result<String, ApiError> {
        self.observer
            .stage(Stage::Saving, &dir.display().to_string());
        let written = plan.save_snapshots(dir)?;
        Ok(written
            .iter()
            .map(|p| format!("Saved {}\n", p.display()))
            .collect())
    }
}

fn apply_logging_flags(config: &mut AppConfig, cli: &Cli) -> Result<(), ApiError> {
    let logging = &mut config.logging;
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.parse::<LogFormat>()?;
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        logging.file = Some(file.clone());
    }
    Ok(())
}

fn format_plan(plan: &Plan, full: bool) -> String {
    let mut out = String::new();
    for partition in &plan.partitions {
        let title = if partition.name.is_empty() {
            "Archives".to_string()
        } else {
            format!("Partition {}", partition.name)
        };
        out.push_str(&format!(
            "{}\n\n{}\n",
            format_section_heading(&title),
            render_tree(&partition.tree, full)
        ));
    }
    out.push_str(&format!(
        "{}\n\n{}\n",
        format_section_heading("Summary"),
        partition_summary_table(plan)
    ));
    out
}

fn describe_store(kind: StoreKind) -> &'static str {
    match kind {
        StoreKind::DryRun => "dry-run",
        StoreKind::Local => "local",
        StoreKind::Http => "http",
    }
}

fn root_path(tree: &Tree) -> PathBuf {
    tree.roots()
        .first()
        .and_then(|id| tree.get(*id))
        .map(|node| node.path().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        std::fs::create_dir_all(root.join("logs")).unwrap();
        std::fs::create_dir_all(root.join("raw")).unwrap();
        std::fs::write(root.join("logs").join("a.log"), vec![b'a'; 300]).unwrap();
        std::fs::write(root.join("raw").join("b.bin"), vec![b'b'; 700]).unwrap();
        std::fs::write(root.join("raw").join("c.bin"), vec![b'c'; 700]).unwrap();
        temp_dir
    }

    fn plan_args(path: &Path) -> PlanArgs {
        PlanArgs {
            path: path.to_path_buf(),
            chunk_size: Some("1K".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_cli_parses_upload_flags() {
        let cli = Cli::try_parse_from([
            "chunktree",
            "upload",
            "/data",
            "--chunk-size",
            "200M",
            "--exclude",
            "*.tmp",
            "--exclude",
            "cache",
            "--store",
            "local",
            "--target",
            "/srv/out",
            "-y",
        ])
        .unwrap();
        match cli.command {
            Commands::Upload { plan, upload } => {
                assert_eq!(plan.path, PathBuf::from("/data"));
                assert_eq!(plan.chunk_size.as_deref(), Some("200M"));
                assert_eq!(plan.exclude, vec!["*.tmp".to_string(), "cache".to_string()]);
                assert_eq!(upload.store, Some(StoreKind::Local));
                assert!(upload.yes);
            }
            _ => panic!("expected upload command"),
        }
    }

    #[test]
    fn test_plan_command_renders_summary() {
        let temp_dir = fixture();
        let context = CliContext::with_config(AppConfig::default());
        let args = PlanArgs {
            save_dir: Some(temp_dir.path().join("snapshots")),
            ..plan_args(&temp_dir.path().join("data"))
        };
        let output = context
            .execute(&Commands::Plan {
                plan: args,
                full: false,
            })
            .unwrap();
        assert!(output.success);
        assert!(output.text.contains("data_0.tar"));
        assert!(temp_dir.path().join("snapshots").join("tree.json").exists());
    }

    #[test]
    fn test_upload_to_local_store_and_show() {
        let temp_dir = fixture();
        let target = temp_dir.path().join("bucket");
        let mut config = AppConfig::default();
        config.store = StoreConfig {
            kind: StoreKind::Local,
            path: Some(target.clone()),
            ..Default::default()
        };
        config.upload.scratch_dir = Some(temp_dir.path().join("scratch"));
        let context = CliContext::with_config(config);

        let output = context
            .execute(&Commands::Upload {
                plan: plan_args(&temp_dir.path().join("data")),
                upload: UploadArgs {
                    yes: true,
                    ..Default::default()
                },
            })
            .unwrap();
        assert!(output.success, "{}", output.text);
        let archives: Vec<_> = std::fs::read_dir(&target).unwrap().collect();
        assert!(!archives.is_empty());

        let snapshot = temp_dir.path().join("data").join(SNAPSHOT_DIR).join("tree.json");
        let shown = context
            .execute(&Commands::Show {
                snapshot,
                full: true,
            })
            .unwrap();
        assert!(shown.text.contains("a.log"));
    }

    #[test]
    fn test_invalid_chunk_size_is_reported() {
        let temp_dir = fixture();
        let context = CliContext::with_config(AppConfig::default());
        let args = PlanArgs {
            chunk_size: Some("lots".to_string()),
            ..plan_args(&temp_dir.path().join("data"))
        };
        let err = context
            .execute(&Commands::Plan {
                plan: args,
                full: false,
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
