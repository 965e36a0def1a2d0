//! Archive uploader
//!
//! Materializes archive manifests and ships them to an [`ObjectStore`] with a bounded
//! number of jobs in flight. Each job checks the store first and skips keys that already
//! exist unless overwriting, writes its tar into a scratch directory, uploads it and
//! removes the local copy. Transient store failures are retried with a fixed delay.
//!
//! A failed archive does not stop the others: failures are collected in the
//! [`UploadReport`] and progress still advances for them.

use crate::archive::{write_tar, ArchiveManifest};
use crate::error::{ApiError, StoreError};
use crate::observer::{ArchiveOutcome, ArchiveProgress, PipelineObserver};
use crate::store::ObjectStore;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Uploader tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Maximum archives processed at once
    pub workers: usize,
    /// Replace objects that already exist
    pub overwrite: bool,
    /// Keep materialized archives in the scratch directory
    pub keep: bool,
    /// Parent directory for scratch space; system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
    /// Retries per store call on transient failures
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            overwrite: false,
            keep: false,
            scratch_dir: None,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Outcome of uploading one partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub partition: String,
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    /// `(key, message)` for archives that could not be shipped
    pub failed: Vec<(String, String)>,
    /// Scratch directory retained when `keep` is set
    pub kept_dir: Option<PathBuf>,
}

impl UploadReport {
    pub fn total(&self) -> usize {
        self.uploaded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Progress {
    completed: usize,
    report: UploadReport,
}

pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, options: UploadOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    /// Upload every manifest of one partition.
    ///
    /// Only scratch directory setup can fail the whole call; per-archive problems end up
    /// in [`UploadReport::failed`].
    pub async fn run(
        &self,
        manifests: &[ArchiveManifest],
        partition: &str,
        observer: &dyn PipelineObserver,
    ) -> Result<UploadReport, ApiError> {
        let total = manifests.len();
        observer.upload_started(partition, total);

        let progress = Mutex::new(Progress {
            completed: 0,
            report: UploadReport {
                partition: partition.to_string(),
                ..Default::default()
            },
        });
        if total == 0 {
            return Ok(progress.into_inner().report);
        }

        let scratch = self.scratch_dir()?;
        let semaphore = Semaphore::new(self.options.workers.max(1));

        let jobs = manifests.iter().map(|manifest| {
            let semaphore = &semaphore;
            let progress = &progress;
            let scratch = scratch.path();
            async move {
                let outcome = match semaphore.acquire().await {
                    Ok(_permit) => match self.process(manifest, scratch).await {
                        Ok(outcome) => outcome,
                        Err(e) => ArchiveOutcome::Failed(e.to_string()),
                    },
                    Err(_) => ArchiveOutcome::Failed("worker pool closed".to_string()),
                };

                let mut guard = progress.lock();
                guard.completed += 1;
                let key = manifest.key.clone();
                match &outcome {
                    ArchiveOutcome::Uploaded => guard.report.uploaded.push(key.clone()),
                    ArchiveOutcome::Skipped => guard.report.skipped.push(key.clone()),
                    ArchiveOutcome::Failed(message) => {
                        guard.report.failed.push((key.clone(), message.clone()))
                    }
                }
                observer.archive_finished(&ArchiveProgress {
                    partition: partition.to_string(),
                    key,
                    outcome,
                    completed: guard.completed,
                    total,
                });
            }
        });
        join_all(jobs).await;

        let mut report = progress.into_inner().report;
        if self.options.keep {
            let kept = scratch.into_path();
            info!(path = %kept.display(), "Keeping materialized archives");
            report.kept_dir = Some(kept);
        }
        info!(
            partition,
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Partition upload finished"
        );
        Ok(report)
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, ApiError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("chunktree-");
        let dir = match &self.options.scratch_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(dir)
    }

    async fn process(
        &self,
        manifest: &ArchiveManifest,
        scratch: &Path,
    ) -> Result<ArchiveOutcome, StoreError> {
        if !self.options.overwrite {
            let mut attempt = 0;
            loop {
                match self.store.exists(&manifest.key).await {
                    Ok(true) => return Ok(ArchiveOutcome::Skipped),
                    Ok(false) => break,
                    Err(e) => self.backoff(e, &mut attempt).await?,
                }
            }
        }

        if !self.store.needs_materialized_archives() {
            self.store.upload(&manifest.path, &manifest.key).await?;
            return Ok(ArchiveOutcome::Uploaded);
        }

        let local = scratch_path(scratch, &manifest.key);
        materialize(manifest, &local)
            .await
            .map_err(|source| StoreError::Io {
                key: manifest.key.clone(),
                source,
            })?;

        let mut attempt = 0;
        let result = loop {
            match self.store.upload(&local, &manifest.key).await {
                Ok(()) => break Ok(ArchiveOutcome::Uploaded),
                Err(e) => {
                    if let Err(e) = self.backoff(e, &mut attempt).await {
                        break Err(e);
                    }
                }
            }
        };

        if !self.options.keep {
            if let Err(e) = tokio::fs::remove_file(&local).await {
                warn!(path = %local.display(), error = %e, "Failed to remove scratch archive");
            }
        }
        result
    }

    /// Wait before the next attempt, or give the error back when retrying is pointless.
    async fn backoff(&self, error: StoreError, attempt: &mut usize) -> Result<(), StoreError> {
        if *attempt >= self.options.max_retries || !is_retryable(&error) {
            return Err(error);
        }
        *attempt += 1;
        warn!(
            attempt = *attempt,
            max_retries = self.options.max_retries,
            error = %error,
            "Store call failed, retrying"
        );
        sleep(Duration::from_millis(self.options.retry_delay_ms)).await;
        Ok(())
    }
}

fn is_retryable(error: &StoreError) -> bool {
    match error {
        StoreError::Transient { .. } | StoreError::Http { .. } => true,
        StoreError::Io { .. } => false,
    }
}

fn scratch_path(scratch: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .fold(scratch.to_path_buf(), |path, segment| path.join(segment))
}

async fn materialize(manifest: &ArchiveManifest, dest: &Path) -> io::Result<u64> {
    let manifest = manifest.clone();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || write_tar(&manifest, &dest))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}
