//! Pattern Partitioner
//!
//! Splits one source tree into disjoint named sub-trees by matching leaf paths against
//! glob patterns. Every leaf lands in exactly one partition; a leaf matched by two patterns
//! is a configuration error. Leaves matched by no pattern go to the wildcard partition.

use crate::error::ConfigurationError;
use crate::tree::{NodeId, Tree};
use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Name given to the wildcard partition when the configuration has none.
pub const DEFAULT_PARTITION: &str = "default";

/// One configured partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRule {
    #[serde(skip)]
    pub name: String,
    /// Glob over full leaf paths; `None` marks the wildcard partition
    #[serde(default)]
    pub pattern: Option<String>,
    /// Per-partition override of the minimum split depth
    #[serde(default)]
    pub min_split_depth: Option<i64>,
}

impl PartitionRule {
    pub fn new(name: impl Into<String>, pattern: Option<&str>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.map(str::to_string),
            min_split_depth: None,
        }
    }

    pub fn with_min_split_depth(mut self, depth: i64) -> Self {
        self.min_split_depth = Some(depth);
        self
    }
}

struct CompiledRule {
    name: String,
    matcher: Option<GlobMatcher>,
    min_split_depth: Option<usize>,
}

/// Validated, ordered partition configuration
pub struct PartitionSet {
    rules: Vec<CompiledRule>,
    wildcard: usize,
}

impl PartitionSet {
    /// Validate and compile `rules`, appending a [`DEFAULT_PARTITION`] wildcard if none
    /// of them is one.
    pub fn new(rules: Vec<PartitionRule>) -> Result<Self, ConfigurationError> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut patterns: HashMap<&str, &str> = HashMap::new();
        let mut wildcard: Option<&str> = None;

        for rule in &rules {
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigurationError::DuplicatePartition(rule.name.clone()));
            }
            match rule.pattern.as_deref() {
                Some(pattern) => {
                    if let Some(first) = patterns.insert(pattern, rule.name.as_str()) {
                        return Err(ConfigurationError::DuplicatePattern {
                            pattern: pattern.to_string(),
                            first: first.to_string(),
                            second: rule.name.clone(),
                        });
                    }
                }
                None => {
                    if let Some(first) = wildcard.replace(rule.name.as_str()) {
                        return Err(ConfigurationError::MultipleWildcards {
                            first: first.to_string(),
                            second: rule.name.clone(),
                        });
                    }
                }
            }
        }

        let mut compiled = rules
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;

        let wildcard = match compiled.iter().position(|r| r.matcher.is_none()) {
            Some(index) => index,
            None => {
                if names.contains(DEFAULT_PARTITION) {
                    return Err(ConfigurationError::DuplicatePartition(
                        DEFAULT_PARTITION.to_string(),
                    ));
                }
                compiled.push(CompiledRule {
                    name: DEFAULT_PARTITION.to_string(),
                    matcher: None,
                    min_split_depth: None,
                });
                compiled.len() - 1
            }
        };

        Ok(Self {
            rules: compiled,
            wildcard,
        })
    }

    /// A single unnamed wildcard partition holding every leaf
    pub fn single() -> Self {
        Self {
            rules: vec![CompiledRule {
                name: String::new(),
                matcher: None,
                min_split_depth: None,
            }],
            wildcard: 0,
        }
    }

    /// Parse the JSON partition file format. Values are either a bare pattern (`null` for
    /// the wildcard) or a rule object:
    /// `{"logs": "**/logs/**", "raw": {"pattern": "*.bin", "min_split_depth": 2}, "rest": null}`.
    /// Key order is the partition order.
    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let invalid =
            |e: serde_json::Error| ConfigurationError::InvalidPartitionFile(e.to_string());
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).map_err(invalid)?;
        let rules = map
            .into_iter()
            .map(|(name, value)| match value {
                serde_json::Value::String(pattern) => Ok(PartitionRule::new(name, Some(&pattern))),
                serde_json::Value::Null => Ok(PartitionRule::new(name, None)),
                value => {
                    let mut rule: PartitionRule = serde_json::from_value(value).map_err(invalid)?;
                    rule.name = name;
                    Ok(rule)
                }
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;
        Self::new(rules)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::InvalidPartitionFile(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    /// Partition names in configuration order
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn wildcard_name(&self) -> &str {
        &self.rules[self.wildcard].name
    }

    pub fn min_split_depth(&self, name: &str) -> Option<usize> {
        self.rules
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.min_split_depth)
    }

    /// Index of the partition owning `path`
    fn classify(&self, path: &Path) -> Result<usize, ConfigurationError> {
        let mut owner: Option<usize> = None;
        for (index, rule) in self.rules.iter().enumerate() {
            let Some(matcher) = &rule.matcher else { continue };
            if !matcher.is_match(path) {
                continue;
            }
            if let Some(first) = owner {
                return Err(ConfigurationError::OverlappingPartitions {
                    leaf: path.to_path_buf(),
                    first: self.rules[first].name.clone(),
                    second: rule.name.clone(),
                });
            }
            owner = Some(index);
        }
        Ok(owner.unwrap_or(self.wildcard))
    }
}

fn compile_rule(rule: &PartitionRule) -> Result<CompiledRule, ConfigurationError> {
    let min_split_depth = match rule.min_split_depth {
        Some(depth) if depth <= 0 => return Err(ConfigurationError::InvalidSplitDepth(depth)),
        Some(depth) => Some(depth as usize),
        None => None,
    };
    let matcher = match &rule.pattern {
        Some(pattern) => Some(
            GlobBuilder::new(pattern)
                .literal_separator(false)
                .build()
                .map_err(|source| ConfigurationError::InvalidPattern {
                    partition: rule.name.clone(),
                    pattern: pattern.clone(),
                    source,
                })?
                .compile_matcher(),
        ),
        None => None,
    };
    Ok(CompiledRule {
        name: rule.name.clone(),
        matcher,
        min_split_depth,
    })
}

/// A named partition of the source tree
#[derive(Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub tree: Tree,
    pub min_split_depth: Option<usize>,
}

/// Split `tree` into one induced sub-tree per partition, in configuration order.
///
/// Each sub-tree holds the partition's leaves plus their ancestor chain, with sizes
/// recomputed over those leaves only. Partitions without leaves are dropped.
pub fn partition_tree(
    tree: &Tree,
    set: &PartitionSet,
) -> Result<Vec<Partition>, ConfigurationError> {
    let mut groups: Vec<Vec<NodeId>> = vec![Vec::new(); set.rules.len()];
    for id in tree.leaves() {
        let Some(node) = tree.get(id) else { continue };
        if node.is_archive() {
            continue;
        }
        groups[set.classify(node.path())?].push(id);
    }

    let mut partitions = Vec::new();
    for (rule, leaves) in set.rules.iter().zip(groups) {
        if leaves.is_empty() {
            continue;
        }
        let mut keep: HashSet<NodeId> = HashSet::with_capacity(leaves.len() * 2);
        for leaf in leaves {
            if !keep.insert(leaf) {
                continue;
            }
            let mut current = tree.get(leaf).and_then(|n| n.parent());
            while let Some(id) = current {
                // Ancestors above an already kept node are kept too.
                if !keep.insert(id) {
                    break;
                }
                current = tree.get(id).and_then(|n| n.parent());
            }
        }
        let mut sub_tree = tree.clone_induced(&keep, rule.name.clone());
        sub_tree.recompute_sizes();
        partitions.push(Partition {
            name: rule.name.clone(),
            tree: sub_tree,
            min_split_depth: rule.min_split_depth,
        });
    }
    Ok(partitions)
}
