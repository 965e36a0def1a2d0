//! Tree Model
//!
//! Arena-backed forest of filesystem nodes. Nodes are addressed by [`NodeId`]s that stay
//! stable for the lifetime of the tree, so restructuring (reparenting, pruning) only rewrites
//! ids. Paths are unique within a tree.
//!
//! The top level of a tree is the partition root: a freshly scanned tree has a single
//! top-level directory, and archives created for a top-level directory become its
//! top-level siblings.

pub mod builder;
pub mod node;
pub mod snapshot;

pub use builder::{ScanOptions, TreeBuilder};
pub use node::{Node, NodeId, NodeKind};
pub use snapshot::{NodeSnapshot, TreeSnapshot};

use crate::error::IntegrityError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Arena tree
#[derive(Debug, Clone, Default)]
pub struct Tree {
    name: String,
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
    by_path: HashMap<PathBuf, NodeId>,
}

impl Tree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Top-level nodes in insertion order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, IntegrityError> {
        self.get(id).ok_or(IntegrityError::UnknownNode(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, IntegrityError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(IntegrityError::UnknownNode(id.0))
    }

    /// Look up a node by its path
    pub fn find(&self, path: &Path) -> Option<NodeId> {
        self.by_path.get(path).copied()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Add a top-level node
    pub fn add_root(
        &mut self,
        path: impl Into<PathBuf>,
        kind: NodeKind,
        size: u64,
    ) -> Result<NodeId, IntegrityError> {
        self.insert(None, Node::new(path.into(), kind, size))
    }

    /// Append a child to `parent`
    pub fn add_child(
        &mut self,
        parent: NodeId,
        path: impl Into<PathBuf>,
        kind: NodeKind,
        size: u64,
    ) -> Result<NodeId, IntegrityError> {
        self.node(parent)?;
        self.insert(Some(parent), Node::new(path.into(), kind, size))
    }

    fn insert(&mut self, parent: Option<NodeId>, mut node: Node) -> Result<NodeId, IntegrityError> {
        if self.by_path.contains_key(&node.path) {
            return Err(IntegrityError::DuplicatePath(node.path));
        }
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        self.by_path.insert(node.path.clone(), id);
        self.nodes.push(Some(node));
        match parent {
            Some(p) => self.node_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Move `child` (with its subtree) below `new_parent`, or to the top level when `None`.
    ///
    /// The child is appended after the new parent's existing children. Sizes are not
    /// touched; call [`Tree::recompute_sizes`] once restructuring is done.
    pub fn reparent(
        &mut self,
        child: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<(), IntegrityError> {
        if let Some(target) = new_parent {
            if self.ancestors_inclusive(target)?.contains(&child) {
                return Err(IntegrityError::CyclicMove {
                    child: self.node(child)?.path.clone(),
                    target: self.node(target)?.path.clone(),
                });
            }
        }
        let old_parent = self.node(child)?.parent;
        self.detach(child, old_parent)?;
        match new_parent {
            Some(p) => self.node_mut(p)?.children.push(child),
            None => self.roots.push(child),
        }
        self.node_mut(child)?.parent = new_parent;
        Ok(())
    }

    fn detach(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), IntegrityError> {
        let siblings = match parent {
            Some(p) => &mut self.node_mut(p)?.children,
            None => &mut self.roots,
        };
        siblings.retain(|c| *c != child);
        Ok(())
    }

    /// Remove a childless node from the tree.
    pub fn prune(&mut self, id: NodeId) -> Result<(), IntegrityError> {
        let node = self.node(id)?;
        if !node.children.is_empty() {
            return Err(IntegrityError::PruneNonEmpty(node.path.clone()));
        }
        let parent = node.parent;
        self.detach(id, parent)?;
        if let Some(node) = self.nodes[id.0].take() {
            self.by_path.remove(&node.path);
        }
        Ok(())
    }

    fn ancestors_inclusive(&self, id: NodeId) -> Result<Vec<NodeId>, IntegrityError> {
        let mut chain = vec![id];
        let mut current = self.node(id)?.parent;
        while let Some(p) = current {
            chain.push(p);
            current = self.node(p)?.parent;
        }
        Ok(chain)
    }

    /// Strict ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, IntegrityError> {
        let mut chain = self.ancestors_inclusive(id)?;
        chain.remove(0);
        Ok(chain)
    }

    /// Depth of a node; top-level nodes are at depth 1
    pub fn depth(&self, id: NodeId) -> Result<usize, IntegrityError> {
        Ok(self.ancestors_inclusive(id)?.len())
    }

    /// All live nodes, parents before children, siblings in order
    pub fn pre_order(&self) -> Vec<NodeId> {
        self.pre_order_from(&self.roots)
    }

    /// `start` and everything below it, parents first
    pub fn subtree(&self, start: NodeId) -> Vec<NodeId> {
        self.pre_order_from(&[start])
    }

    fn pre_order_from(&self, start: &[NodeId]) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeId> = start.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                order.push(id);
                stack.extend(node.children.iter().rev());
            }
        }
        order
    }

    /// All live nodes, children before parents, siblings in order
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<(NodeId, bool)> = self.roots.iter().rev().map(|r| (*r, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            if expanded {
                order.push(id);
            } else {
                stack.push((id, true));
                stack.extend(node.children.iter().rev().map(|c| (*c, false)));
            }
        }
        order
    }

    /// Childless nodes in pre-order, archives included
    pub fn leaves(&self) -> Vec<NodeId> {
        self.pre_order()
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(Node::is_leaf))
            .collect()
    }

    /// Paths of the childless non-archive nodes
    pub fn leaf_paths(&self) -> Vec<PathBuf> {
        self.leaves()
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter(|n| !n.is_archive())
            .map(|n| n.path.clone())
            .collect()
    }

    /// Archive nodes in pre-order
    pub fn archives(&self) -> Vec<NodeId> {
        self.pre_order()
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(Node::is_archive))
            .collect()
    }

    /// Sum of the top-level node sizes
    pub fn total_size(&self) -> u64 {
        self.roots
            .iter()
            .filter_map(|r| self.get(*r))
            .map(|n| n.size)
            .sum()
    }

    /// Recompute every Directory/Archive size bottom-up. File sizes are kept.
    pub fn recompute_sizes(&mut self) {
        for id in self.post_order() {
            let Some(node) = self.get(id) else { continue };
            if node.kind == NodeKind::File {
                continue;
            }
            let total: u64 = node
                .children
                .iter()
                .filter_map(|c| self.get(*c))
                .map(|c| c.size)
                .sum();
            if let Some(Some(node)) = self.nodes.get_mut(id.0) {
                node.size = total;
            }
        }
    }

    pub(crate) fn mark_archive_descendant(&mut self, id: NodeId) -> Result<(), IntegrityError> {
        self.node_mut(id)?.has_archive_descendant = true;
        Ok(())
    }

    pub(crate) fn set_has_archive_descendant(
        &mut self,
        id: NodeId,
        value: bool,
    ) -> Result<(), IntegrityError> {
        self.node_mut(id)?.has_archive_descendant = value;
        Ok(())
    }

    /// Structural copy of the nodes in `keep`.
    ///
    /// Only nodes reachable from the top level through kept nodes are copied, so `keep`
    /// must be closed under ancestors. Child order is preserved; sizes are copied as-is.
    pub fn clone_induced(&self, keep: &HashSet<NodeId>, name: impl Into<String>) -> Tree {
        let mut out = Tree::new(name);
        let mut stack: Vec<(NodeId, Option<NodeId>)> = self
            .roots
            .iter()
            .rev()
            .filter(|r| keep.contains(r))
            .map(|r| (*r, None))
            .collect();

        while let Some((source, new_parent)) = stack.pop() {
            let Some(node) = self.get(source) else { continue };
            let mut copy = Node::new(node.path.clone(), node.kind, node.size);
            copy.has_archive_descendant = node.has_archive_descendant;
            // Paths are unique in the source, so the copy cannot collide.
            let Ok(copied) = out.insert(new_parent, copy) else { continue };
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .filter(|c| keep.contains(c))
                    .map(|c| (*c, Some(copied))),
            );
        }
        out
    }
}
