//! chunktree: Size-Bounded Archive Planning
//!
//! Turns a directory tree into a set of archives of roughly equal size for bulk upload to
//! an object store. Leaves are first split into disjoint partitions by glob pattern; each
//! partition is then rewritten so every leaf sits inside exactly one archive, validated,
//! materialized as tar files and uploaded with bounded concurrency.

pub mod archive;
pub mod chunker;
pub mod config;
pub mod error;
pub mod logging;
pub mod observer;
pub mod partition;
pub mod pipeline;
pub mod render;
pub mod size;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod upload;
pub mod validate;

pub use chunker::{ChunkReport, ChunkSettings, Chunker};
pub use error::{ApiError, ConfigurationError, IntegrityError, StoreError};
pub use partition::{partition_tree, Partition, PartitionRule, PartitionSet};
pub use pipeline::{plan, Plan};
pub use tree::{NodeId, NodeKind, Tree};
pub use validate::validate;
