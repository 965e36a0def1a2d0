//! Pipeline
//!
//! Ties the stages together: partition the scanned tree, chunk every partition into
//! archive normal form, validate the result, and hand the archives to the uploader.
//! Planning is pure tree rewriting; nothing touches the filesystem before upload.

use crate::archive::ArchiveManifest;
use crate::chunker::{ChunkReport, ChunkSettings, Chunker};
use crate::error::ApiError;
use crate::observer::{PipelineObserver, Stage};
use crate::partition::{partition_tree, PartitionSet};
use crate::tree::{Tree, TreeSnapshot};
use crate::upload::{UploadReport, Uploader};
use crate::validate::{validate, ValidationReport};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One chunked and validated partition
#[derive(Debug, Clone)]
pub struct PlannedPartition {
    pub name: String,
    pub tree: Tree,
    pub settings: ChunkSettings,
    pub report: ChunkReport,
    pub validation: ValidationReport,
}

/// Result of planning a whole tree
#[derive(Debug, Clone)]
pub struct Plan {
    /// Object keys are relative to this directory (the scan root's parent)
    pub base: PathBuf,
    pub partitions: Vec<PlannedPartition>,
}

impl Plan {
    pub fn archive_count(&self) -> usize {
        self.partitions.iter().map(|p| p.report.archives.len()).sum()
    }

    pub fn manifests(
        &self,
        partition: &PlannedPartition,
    ) -> Result<Vec<ArchiveManifest>, ApiError> {
        Ok(ArchiveManifest::collect(
            &partition.tree,
            &partition.name,
            &self.base,
        )?)
    }

    /// Write one JSON snapshot per partition into `dir`, returning the written paths.
    ///
    /// Partition names that sanitize to the same file name get a `~n` suffix, so every
    /// partition keeps its own snapshot.
    pub fn save_snapshots(&self, dir: &Path) -> Result<Vec<PathBuf>, ApiError> {
        let mut written = Vec::with_capacity(self.partitions.len());
        let mut used: HashSet<String> = HashSet::new();
        for partition in &self.partitions {
            let file_name = snapshot_file_name(&partition.name);
            let file_name = if used.contains(&file_name) {
                let stem = file_name.trim_end_matches(".json");
                (1..)
                    .map(|n| format!("{}~{}.json", stem, n))
                    .find(|candidate| !used.contains(candidate))
                    .unwrap_or(file_name)
            } else {
                file_name
            };
            let path = dir.join(&file_name);
            used.insert(file_name);
            TreeSnapshot::capture(&partition.tree).save(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Snapshot file for a partition; the unnamed single partition is saved as `tree.json`.
pub fn snapshot_file_name(partition: &str) -> String {
    let stem: String = partition
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "tree.json".to_string()
    } else {
        format!("{}.json", stem)
    }
}

/// Partition, chunk and validate `tree`.
///
/// A partition's own minimum split depth, when configured, replaces the one in `settings`.
/// The source tree is left untouched.
pub fn plan(
    tree: &Tree,
    partitions: &PartitionSet,
    settings: &ChunkSettings,
    observer: &dyn PipelineObserver,
) -> Result<Plan, ApiError> {
    let base = base_dir(tree);

    observer.stage(Stage::Partitioning, &format!("{} partition rule(s)", partitions.names().len()));
    let parts = partition_tree(tree, partitions)?;

    let mut planned = Vec::with_capacity(parts.len());
    for part in parts {
        observer.partitioned(&part.name, &part.tree);
        let settings = match part.min_split_depth {
            Some(depth) => settings.with_min_split_depth(depth),
            None => *settings,
        };

        let expected = part.tree.leaf_paths();
        let mut chunked = part.tree;
        observer.stage(Stage::Chunking, &part.name);
        let report = Chunker::new(settings).run(&mut chunked)?;
        observer.chunked(&part.name, &report);

        observer.stage(Stage::Validating, &part.name);
        let validation = validate(&chunked, &expected)?;

        planned.push(PlannedPartition {
            name: part.name,
            tree: chunked,
            settings,
            report,
            validation,
        });
    }

    Ok(Plan {
        base,
        partitions: planned,
    })
}

/// Upload every partition of `plan`, one partition at a time.
pub async fn upload(
    plan: &Plan,
    uploader: &Uploader,
    observer: &dyn PipelineObserver,
) -> Result<Vec<UploadReport>, ApiError> {
    let mut reports = Vec::with_capacity(plan.partitions.len());
    for partition in &plan.partitions {
        let manifests = plan.manifests(partition)?;
        observer.stage(Stage::Uploading, &partition.name);
        reports.push(uploader.run(&manifests, &partition.name, observer).await?);
    }
    Ok(reports)
}

fn base_dir(tree: &Tree) -> PathBuf {
    tree.roots()
        .first()
        .and_then(|id| tree.get(*id))
        .and_then(|node| node.path().parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"))
}
