//! Size-Bounded Chunker
//!
//! Rewrites a partition tree so that every leaf ends up inside exactly one archive node.
//! Nodes are visited children-first; a node is split when it is larger than the chunk
//! size or sits at or above the minimum split depth. Splitting groups the node's eligible
//! children (those with no archive below them) into contiguous runs along cumulative-size
//! boundaries and moves each run into a new archive sibling of the node.
//!
//! Planning runs on the unmodified topology; the rewrite is applied afterwards in the same
//! children-first order. Archive subtrees are never entered, so re-running on an already
//! chunked tree changes nothing.

use crate::error::{ConfigurationError, IntegrityError};
use crate::tree::{NodeId, NodeKind, Tree};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// File extension of archive nodes
pub const ARCHIVE_EXTENSION: &str = "tar";

/// Validated chunking parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    /// Target uncompressed bytes per archive
    pub chunk_size: u64,
    /// Nodes at this depth or shallower are always split (root = 1)
    pub min_split_depth: usize,
}

impl ChunkSettings {
    pub fn new(chunk_size: u64, min_split_depth: i64) -> Result<Self, ConfigurationError> {
        if chunk_size == 0 {
            return Err(ConfigurationError::ZeroChunkSize);
        }
        if min_split_depth <= 0 {
            return Err(ConfigurationError::InvalidSplitDepth(min_split_depth));
        }
        Ok(Self {
            chunk_size,
            min_split_depth: min_split_depth as usize,
        })
    }

    pub fn with_min_split_depth(self, min_split_depth: usize) -> Self {
        Self {
            min_split_depth: min_split_depth.max(1),
            ..self
        }
    }

    /// Largest accepted multi-member archive (1.5 x chunk size)
    pub fn ceiling(&self) -> u64 {
        self.chunk_size.saturating_add(self.chunk_size / 2)
    }
}

/// One archive created by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub size: u64,
    pub members: usize,
}

/// Outcome of a chunker run
#[derive(Debug, Clone, Default)]
pub struct ChunkReport {
    pub archives: Vec<ArchiveInfo>,
    /// Directories removed after all their children moved into archives
    pub pruned: usize,
    pub chunk_size: u64,
}

impl ChunkReport {
    /// Single-member archives larger than the chunk size
    pub fn oversize(&self) -> Vec<&ArchiveInfo> {
        self.archives
            .iter()
            .filter(|a| a.members == 1 && a.size > self.chunk_size)
            .collect()
    }

    pub fn largest(&self) -> Option<&ArchiveInfo> {
        self.archives.iter().max_by_key(|a| a.size)
    }

    pub fn total_size(&self) -> u64 {
        self.archives.iter().map(|a| a.size).sum()
    }
}

struct SplitPlan {
    node: NodeId,
    groups: Vec<Vec<NodeId>>,
}

/// Size-bounded chunker
pub struct Chunker {
    settings: ChunkSettings,
}

impl Chunker {
    pub fn new(settings: ChunkSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ChunkSettings {
        &self.settings
    }

    /// Rewrite `tree` in place into archive-bearing normal form.
    pub fn run(&self, tree: &mut Tree) -> Result<ChunkReport, IntegrityError> {
        let mut report = ChunkReport {
            chunk_size: self.settings.chunk_size,
            ..Default::default()
        };
        if tree.is_empty() {
            return Ok(report);
        }
        tree.recompute_sizes();

        let (plans, flags) = self.plan(tree)?;
        let mut created = Vec::new();
        for plan in plans {
            created.extend(self.apply(tree, &plan, &mut report)?);
        }
        for (id, flag) in flags {
            if flag && tree.get(id).is_some() {
                tree.mark_archive_descendant(id)?;
            }
        }
        tree.recompute_sizes();

        for id in created {
            let node = tree.node(id)?;
            report.archives.push(ArchiveInfo {
                path: node.path().to_path_buf(),
                size: node.size(),
                members: node.children().len(),
            });
        }
        Ok(report)
    }

    /// Decide every split on the current topology, children first.
    fn plan(
        &self,
        tree: &Tree,
    ) -> Result<(Vec<SplitPlan>, HashMap<NodeId, bool>), IntegrityError> {
        let mut plans = Vec::new();
        let mut flags: HashMap<NodeId, bool> = HashMap::new();
        let delegated = |id: &NodeId, flags: &HashMap<NodeId, bool>| {
            tree.get(*id)
                .is_some_and(|c| c.is_archive() || flags.get(id).copied().unwrap_or(false))
        };

        for id in planning_order(tree) {
            let node = tree.node(id)?;
            let mut flag = node.has_archive_descendant()
                || node.children().iter().any(|c| delegated(c, &flags));

            let candidate = node.size() > self.settings.chunk_size
                || tree.depth(id)? <= self.settings.min_split_depth;
            if candidate {
                let mut eligible: Vec<NodeId> = node
                    .children()
                    .iter()
                    .filter(|c| !delegated(c, &flags))
                    .copied()
                    .collect();
                if !eligible.is_empty() {
                    sort_canonical(tree, &mut eligible);
                    let sizes: Vec<u64> = eligible
                        .iter()
                        .map(|c| tree.get(*c).map_or(0, |n| n.size()))
                        .collect();
                    let ChunkSettings { chunk_size, .. } = self.settings;
                    let groups = group_sizes(&sizes, chunk_size, self.settings.ceiling())
                        .into_iter()
                        .map(|range| eligible[range].to_vec())
                        .collect();
                    plans.push(SplitPlan { node: id, groups });
                    flag = true;
                }
            }
            flags.insert(id, flag);
        }
        Ok((plans, flags))
    }

    fn apply(
        &self,
        tree: &mut Tree,
        plan: &SplitPlan,
        report: &mut ChunkReport,
    ) -> Result<Vec<NodeId>, IntegrityError> {
        let (base_path, parent) = {
            let node = tree.node(plan.node)?;
            (node.path().to_path_buf(), node.parent())
        };

        let mut created = Vec::with_capacity(plan.groups.len());
        for (index, members) in plan.groups.iter().enumerate() {
            let path = archive_path(tree, &base_path, index);
            let archive = match parent {
                Some(p) => tree.add_child(p, path, NodeKind::Archive, 0)?,
                None => tree.add_root(path, NodeKind::Archive, 0)?,
            };
            for member in members {
                tree.reparent(*member, Some(archive))?;
            }
            created.push(archive);
        }

        tree.mark_archive_descendant(plan.node)?;
        if tree.node(plan.node)?.is_leaf() {
            tree.prune(plan.node)?;
            report.pruned += 1;
        }
        Ok(created)
    }
}

/// Children-first order that does not enter archive subtrees
fn planning_order(tree: &Tree) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut stack: Vec<(NodeId, bool)> = tree.roots().iter().rev().map(|r| (*r, false)).collect();
    while let Some((id, expanded)) = stack.pop() {
        let Some(node) = tree.get(id) else { continue };
        if node.is_archive() {
            continue;
        }
        if expanded {
            order.push(id);
        } else {
            stack.push((id, true));
            stack.extend(node.children().iter().rev().map(|c| (*c, false)));
        }
    }
    order
}

/// `<dir>/<name>_<index>.tar`, with a `~n` suffix if that path is taken.
fn archive_path(tree: &Tree, base: &Path, index: usize) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    let dir = base.parent().unwrap_or(base);
    let candidate = dir.join(format!("{}_{}.{}", name, index, ARCHIVE_EXTENSION));
    if !tree.contains_path(&candidate) {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}~{}.{}", name, index, n, ARCHIVE_EXTENSION)))
        .find(|p| !tree.contains_path(p))
        .unwrap_or(candidate)
}

/// Files before directories, then natural path order.
fn sort_canonical(tree: &Tree, ids: &mut [NodeId]) {
    ids.sort_by(|a, b| {
        let (Some(a), Some(b)) = (tree.get(*a), tree.get(*b)) else {
            return Ordering::Equal;
        };
        let a_dir = a.kind() != NodeKind::File;
        let b_dir = b.kind() != NodeKind::File;
        a_dir
            .cmp(&b_dir)
            .then_with(|| natural_cmp(&a.path().to_string_lossy(), &b.path().to_string_lossy()))
    });
}

/// Compare strings with digit runs ordered numerically (`f2` < `f10`).
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.as_bytes();
    let mut right = b.as_bytes();
    loop {
        match (left.first(), right.first()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_len = left.iter().take_while(|c| c.is_ascii_digit()).count();
                let r_len = right.iter().take_while(|c| c.is_ascii_digit()).count();
                let l_num = trim_zeros(&left[..l_len]);
                let r_num = trim_zeros(&right[..r_len]);
                let ord = l_num.len().cmp(&r_num.len()).then_with(|| l_num.cmp(r_num));
                if ord != Ordering::Equal {
                    return ord;
                }
                left = &left[l_len..];
                right = &right[r_len..];
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(r);
                }
                left = &left[1..];
                right = &right[1..];
            }
        }
    }
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let start = digits.iter().take_while(|d| **d == b'0').count();
    &digits[start..]
}

/// Contiguous runs that start whenever the cumulative size crosses into a new multiple
/// of `grain`.
fn boundary_runs(sizes: &[u64], grain: u64) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut cumulative: u64 = 0;
    let mut previous: Option<u64> = None;
    for (i, size) in sizes.iter().enumerate() {
        cumulative = cumulative.saturating_add(*size);
        let bucket = cumulative / grain;
        if previous.is_some_and(|p| p != bucket) {
            runs.push(start..i);
            start = i;
        }
        previous = Some(bucket);
    }
    if start < sizes.len() {
        runs.push(start..sizes.len());
    }
    runs
}

/// Group `sizes` into runs of at most `ceiling` bytes where possible.
///
/// Runs over the ceiling with more than one member are split again at half the
/// granularity, down to one byte. Only a single member may exceed the ceiling; zero-sized
/// members trailing it are grouped on their own.
pub(crate) fn group_sizes(sizes: &[u64], chunk_size: u64, ceiling: u64) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    refine(sizes, 0, chunk_size.max(1), ceiling, &mut out);
    out
}

fn refine(sizes: &[u64], offset: usize, grain: u64, ceiling: u64, out: &mut Vec<Range<usize>>) {
    for run in boundary_runs(sizes, grain) {
        let total: u64 = sizes[run.clone()].iter().sum();
        if total > ceiling && run.len() > 1 && grain > 1 {
            refine(&sizes[run.clone()], offset + run.start, grain / 2, ceiling, out);
        } else if total > ceiling && run.len() > 1 {
            // At one-byte grain an oversize run is one member plus zero-sized followers.
            out.push(offset + run.start..offset + run.start + 1);
            out.push(offset + run.start + 1..offset + run.end);
        } else {
            out.push(offset + run.start..offset + run.end);
        }
    }
}
