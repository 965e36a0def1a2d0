//! Validator
//!
//! Post-condition check for chunked trees. Confirms the archive normal form and that the
//! leaf set survived chunking unchanged, before any archive is materialized.

use crate::error::IntegrityError;
use crate::tree::{NodeId, NodeKind, Tree};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Summary of a successful validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub leaves: usize,
    pub archives: usize,
}

/// Check that `tree` is in normal form and holds exactly the `expected` leaves.
///
/// Every leaf must sit inside exactly one archive unless it is a top-level file, archives
/// must be non-empty and never nested, and Directory/Archive sizes must match their
/// children.
pub fn validate(tree: &Tree, expected: &[PathBuf]) -> Result<ValidationReport, IntegrityError> {
    check_sizes(tree)?;

    let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
    let mut archives = 0;
    let mut stack: Vec<(NodeId, Option<NodeId>)> =
        tree.roots().iter().rev().map(|r| (*r, None)).collect();

    while let Some((id, enclosing)) = stack.pop() {
        let node = tree.node(id)?;
        if node.is_archive() {
            if let Some(outer) = enclosing {
                return Err(IntegrityError::NestedArchive {
                    outer: tree.node(outer)?.path().to_path_buf(),
                    inner: node.path().to_path_buf(),
                });
            }
            if node.is_leaf() {
                return Err(IntegrityError::EmptyArchive(node.path().to_path_buf()));
            }
            archives += 1;
            stack.extend(node.children().iter().rev().map(|c| (*c, Some(id))));
            continue;
        }

        if node.is_leaf() {
            let top_level_file = node.parent().is_none() && node.kind() == NodeKind::File;
            if enclosing.is_none() && !top_level_file {
                return Err(IntegrityError::UnwrappedLeaf(node.path().to_path_buf()));
            }
            if !seen.insert(node.path().to_path_buf()) {
                return Err(IntegrityError::DuplicateLeaf(node.path().to_path_buf()));
            }
        }
        stack.extend(node.children().iter().rev().map(|c| (*c, enclosing)));
    }

    let mut expected_set: BTreeSet<&PathBuf> = BTreeSet::new();
    for path in expected {
        if !expected_set.insert(path) {
            return Err(IntegrityError::DuplicateLeaf(path.clone()));
        }
    }
    let missing: Vec<PathBuf> = expected_set
        .iter()
        .filter(|p| !seen.contains(**p))
        .map(|p| (*p).clone())
        .collect();
    if !missing.is_empty() {
        return Err(IntegrityError::MissingLeaves(missing));
    }
    if let Some(extra) = seen.iter().find(|p| !expected_set.contains(p)) {
        return Err(IntegrityError::UnexpectedLeaf(extra.clone()));
    }

    Ok(ValidationReport {
        leaves: seen.len(),
        archives,
    })
}

fn check_sizes(tree: &Tree) -> Result<(), IntegrityError> {
    for id in tree.post_order() {
        let node = tree.node(id)?;
        if node.kind() == NodeKind::File {
            continue;
        }
        let computed: u64 = node
            .children()
            .iter()
            .map(|c| tree.node(*c).map(|n| n.size()))
            .sum::<Result<u64, _>>()?;
        if computed != node.size() {
            return Err(IntegrityError::SizeMismatch {
                path: node.path().to_path_buf(),
                recorded: node.size(),
                computed,
            });
        }
    }
    Ok(())
}
