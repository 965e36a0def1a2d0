//! Pipeline observer
//!
//! Progress and log events from planning and upload go through [`PipelineObserver`].
//! The transformations never log on their own; callers decide how events surface.

use crate::chunker::ChunkReport;
use crate::size::format_size;
use crate::tree::Tree;
use std::fmt;
use tracing::{info, warn};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scanning,
    Partitioning,
    Chunking,
    Validating,
    Uploading,
    Saving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scanning => "scanning",
            Stage::Partitioning => "partitioning",
            Stage::Chunking => "chunking",
            Stage::Validating => "validating",
            Stage::Uploading => "uploading",
            Stage::Saving => "saving",
        };
        f.write_str(name)
    }
}

/// How one archive job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Uploaded,
    /// Key already present and overwrite disabled
    Skipped,
    Failed(String),
}

/// Progress after one archive job; `completed` never decreases within a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveProgress {
    pub partition: String,
    pub key: String,
    pub outcome: ArchiveOutcome,
    pub completed: usize,
    pub total: usize,
}

/// Receives pipeline events
pub trait PipelineObserver: Send + Sync {
    fn stage(&self, _stage: Stage, _detail: &str) {}

    fn partitioned(&self, _name: &str, _tree: &Tree) {}

    fn chunked(&self, _name: &str, _report: &ChunkReport) {}

    fn upload_started(&self, _partition: &str, _total: usize) {}

    fn archive_finished(&self, _progress: &ArchiveProgress) {}
}

/// Discards all events
pub struct NullObserver;

impl PipelineObserver for NullObserver {}

/// Forwards events to `tracing`
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn stage(&self, stage: Stage, detail: &str) {
        info!(stage = %stage, "{}", detail);
    }

    fn partitioned(&self, name: &str, tree: &Tree) {
        info!(
            partition = name,
            leaves = tree.leaf_paths().len(),
            size = %format_size(tree.total_size()),
            "Partition built"
        );
    }

    fn chunked(&self, name: &str, report: &ChunkReport) {
        info!(
            partition = name,
            archives = report.archives.len(),
            pruned = report.pruned,
            "Partition chunked"
        );
        for archive in report.oversize() {
            warn!(
                partition = name,
                archive = %archive.path.display(),
                size = %format_size(archive.size),
                "Single file exceeds chunk size"
            );
        }
    }

    fn upload_started(&self, partition: &str, total: usize) {
        info!(partition, total, "Uploading archives");
    }

    fn archive_finished(&self, progress: &ArchiveProgress) {
        match &progress.outcome {
            ArchiveOutcome::Uploaded => info!(
                partition = %progress.partition,
                key = %progress.key,
                "({}/{}) uploaded",
                progress.completed,
                progress.total
            ),
            ArchiveOutcome::Skipped => info!(
                partition = %progress.partition,
                key = %progress.key,
                "({}/{}) skipped, object with the same key exists",
                progress.completed,
                progress.total
            ),
            ArchiveOutcome::Failed(message) => warn!(
                partition = %progress.partition,
                key = %progress.key,
                "({}/{}) failed: {}",
                progress.completed,
                progress.total,
                message
            ),
        }
    }
}
