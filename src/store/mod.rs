//! Object Store
//!
//! The upload phase depends on exactly two remote operations: checking whether a key
//! exists and uploading a finished local archive under a key. Both may fail transiently.

pub mod http;
pub mod local;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;

use crate::config::StoreConfig;
use crate::error::{ConfigurationError, StoreError};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Object store interface
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    async fn upload(&self, local: &Path, key: &str) -> Result<(), StoreError>;

    /// Whether archives must actually be written before `upload`
    fn needs_materialized_archives(&self) -> bool {
        true
    }
}

/// Store that reports what it would upload and never holds any key
#[derive(Debug, Default)]
pub struct DryRunStore;

#[async_trait]
impl ObjectStore for DryRunStore {
    async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn upload(&self, local: &Path, key: &str) -> Result<(), StoreError> {
        info!(key, local = %local.display(), "Would have uploaded archive");
        Ok(())
    }

    fn needs_materialized_archives(&self) -> bool {
        false
    }
}

/// Store backend selector
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    serde::Serialize,
    serde::Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    #[default]
    DryRun,
    Local,
    Http,
}

/// Build the configured store
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, ConfigurationError> {
    match config.kind {
        StoreKind::DryRun => Ok(Arc::new(DryRunStore)),
        StoreKind::Local => {
            let path = config.path.clone().ok_or_else(|| {
                ConfigurationError::InvalidStore("local store requires `store.path`".to_string())
            })?;
            Ok(Arc::new(LocalObjectStore::new(path, config.prefix.clone())))
        }
        StoreKind::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                ConfigurationError::InvalidStore("http store requires `store.endpoint`".to_string())
            })?;
            let bucket = config.bucket.clone().ok_or_else(|| {
                ConfigurationError::InvalidStore("http store requires `store.bucket`".to_string())
            })?;
            let store = HttpObjectStore::new(endpoint, bucket, config.prefix.clone())
                .with_token(config.token.clone())
                .with_public(config.public);
            Ok(Arc::new(store))
        }
    }
}

/// Join an optional prefix and a key with `/`
pub(crate) fn prefixed_key(prefix: Option<&str>, key: &str) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, key.trim_start_matches('/')),
        None => key.trim_start_matches('/').to_string(),
    }
}
