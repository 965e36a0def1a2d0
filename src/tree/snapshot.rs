//! Persisted tree description
//!
//! Nested JSON form of a [`Tree`], written after planning so archive trees can be
//! inspected or replayed later. Loading rebuilds a fresh arena; ids are not persisted.

use super::{NodeId, NodeKind, Tree};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One node with its subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub path: PathBuf,
    pub kind: NodeKind,
    pub size: u64,
    #[serde(default)]
    pub has_archive_descendant: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

/// Whole tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub name: String,
    pub roots: Vec<NodeSnapshot>,
}

impl TreeSnapshot {
    pub fn capture(tree: &Tree) -> Self {
        TreeSnapshot {
            name: tree.name().to_string(),
            roots: tree
                .roots()
                .iter()
                .filter_map(|r| capture_node(tree, *r))
                .collect(),
        }
    }

    /// Rebuild an arena tree. Sizes are taken from the snapshot as recorded.
    pub fn restore(&self) -> Result<Tree, ApiError> {
        let mut tree = Tree::new(self.name.clone());
        let mut stack: Vec<(&NodeSnapshot, Option<NodeId>)> =
            self.roots.iter().rev().map(|n| (n, None)).collect();
        while let Some((snapshot, parent)) = stack.pop() {
            let id = match parent {
                Some(p) => tree.add_child(p, snapshot.path.clone(), snapshot.kind, snapshot.size)?,
                None => tree.add_root(snapshot.path.clone(), snapshot.kind, snapshot.size)?,
            };
            tree.set_has_archive_descendant(id, snapshot.has_archive_descendant)?;
            stack.extend(snapshot.children.iter().rev().map(|c| (c, Some(id))));
        }
        Ok(tree)
    }

    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        if !path.exists() {
            return Err(ApiError::InputNotFound(path.to_path_buf()));
        }
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

fn capture_node(tree: &Tree, id: NodeId) -> Option<NodeSnapshot> {
    let node = tree.get(id)?;
    Some(NodeSnapshot {
        path: node.path().to_path_buf(),
        kind: node.kind(),
        size: node.size(),
        has_archive_descendant: node.has_archive_descendant(),
        children: node
            .children()
            .iter()
            .filter_map(|c| capture_node(tree, *c))
            .collect(),
    })
}
