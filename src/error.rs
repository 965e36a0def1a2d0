//! Error types
//!
//! Four failure families: configuration problems caught before any tree work, structural
//! integrity violations in the arena or the chunked output, per-object store failures that
//! the upload phase tolerates, and the umbrella [`ApiError`] surfaced by the pipeline and CLI.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid partition, chunk, store or logging configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Leaf {leaf:?} matches both partition '{first}' and partition '{second}'")]
    OverlappingPartitions {
        leaf: PathBuf,
        first: String,
        second: String,
    },

    #[error("Partitions '{first}' and '{second}' share the pattern '{pattern}'")]
    DuplicatePattern {
        pattern: String,
        first: String,
        second: String,
    },

    #[error("Partition name '{0}' is used more than once")]
    DuplicatePartition(String),

    #[error("Only one wildcard partition is allowed, found '{first}' and '{second}'")]
    MultipleWildcards { first: String, second: String },

    #[error("Invalid pattern '{pattern}' for partition '{partition}': {source}")]
    InvalidPattern {
        partition: String,
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidExclude {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Invalid size '{0}'")]
    InvalidSize(String),

    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("Minimum split depth must be at least 1, got {0}")]
    InvalidSplitDepth(i64),

    #[error("Invalid partition file: {0}")]
    InvalidPartitionFile(String),

    #[error("Invalid store configuration: {0}")]
    InvalidStore(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidLogging(String),
}

/// Violated tree invariant. Never repaired, always fatal.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Path {0:?} already exists in the tree")]
    DuplicatePath(PathBuf),

    #[error("Node {0} is not part of the tree")]
    UnknownNode(usize),

    #[error("Cannot prune {0:?}: node still has children")]
    PruneNonEmpty(PathBuf),

    #[error("Cannot move {child:?} below its own descendant {target:?}")]
    CyclicMove { child: PathBuf, target: PathBuf },

    #[error("Found empty archive {0:?}")]
    EmptyArchive(PathBuf),

    #[error("Archive {inner:?} is nested inside archive {outer:?}")]
    NestedArchive { outer: PathBuf, inner: PathBuf },

    #[error("Leaf {0:?} is not wrapped in an archive")]
    UnwrappedLeaf(PathBuf),

    #[error("{} leaves missing after chunking, first: {:?}", .0.len(), .0.first())]
    MissingLeaves(Vec<PathBuf>),

    #[error("Leaf {0:?} appears more than once")]
    DuplicateLeaf(PathBuf),

    #[error("Leaf {0:?} was not present before chunking")]
    UnexpectedLeaf(PathBuf),

    #[error("Size of {path:?} is {recorded} but its children sum to {computed}")]
    SizeMismatch {
        path: PathBuf,
        recorded: u64,
        computed: u64,
    },
}

/// Object store failure. Reported per object; the run continues.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transient store failure for '{key}': {message}")]
    Transient { key: String, message: String },

    #[error("HTTP request for '{key}' failed: {source}")]
    Http {
        key: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("I/O failure for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn transient(key: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Transient {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Top-level error for pipeline and CLI operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),

    #[error("Structural integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Input not found: {0:?}")]
    InputNotFound(PathBuf),

    #[error("Scan root {0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Prompt failed: {0}")]
    Prompt(String),
}
