//! Directory-backed object store
//!
//! Keys map to files below a target directory. Uploads copy to a temporary name first and
//! rename, so an interrupted copy never shows up under the final key.

use super::{prefixed_key, ObjectStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct LocalObjectStore {
    root: PathBuf,
    prefix: Option<String>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, prefix: Option<String>) -> Self {
        Self {
            root: root.into(),
            prefix,
        }
    }

    /// Filesystem location of `key`
    pub fn object_path(&self, key: &str) -> PathBuf {
        let full = prefixed_key(self.prefix.as_deref(), key);
        full.split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        tokio::fs::try_exists(self.object_path(key))
            .await
            .map_err(|source| StoreError::Io {
                key: key.to_string(),
                source,
            })
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };
        let target = self.object_path(key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let temp_path = target.with_extension("upload");
        if let Err(e) = tokio::fs::copy(local, &temp_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_err(e));
        }
        tokio::fs::rename(&temp_path, &target).await.map_err(io_err)?;
        Ok(())
    }
}
