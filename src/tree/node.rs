//! Tree node types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable handle of a node inside a [`Tree`](super::Tree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
    /// Synthetic bundle created by the chunker
    Archive,
}

impl NodeKind {
    pub fn icon(self) -> &'static str {
        match self {
            NodeKind::File => "📄",
            NodeKind::Directory => "📁",
            NodeKind::Archive => "💾",
        }
    }
}

/// Arena node
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) path: PathBuf,
    pub(crate) kind: NodeKind,
    pub(crate) size: u64,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) has_archive_descendant: bool,
}

impl Node {
    pub(crate) fn new(path: PathBuf, kind: NodeKind, size: u64) -> Self {
        Self {
            path,
            kind,
            size,
            parent: None,
            children: Vec::new(),
            has_archive_descendant: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_archive_descendant(&self) -> bool {
        self.has_archive_descendant
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_archive(&self) -> bool {
        self.kind == NodeKind::Archive
    }

    /// Final path component, or the whole path for roots like `/`.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}
