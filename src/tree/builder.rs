//! Tree builder
//!
//! Walks a directory and builds the source tree the partitioner consumes. Hidden and
//! dunder entries are skipped unless requested, as are entries matching exclude globs;
//! an excluded directory is skipped whole.

use super::{NodeKind, Tree};
use crate::error::{ApiError, ConfigurationError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Scan options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Exclude patterns; relative patterns match at any depth
    pub exclude: Vec<String>,
    /// Follow symbolic links (loops are reported and skipped); links are skipped otherwise
    pub follow_symlinks: bool,
    /// Keep `.`- and `_`-prefixed entries
    pub include_hidden: bool,
}

/// Builds a [`Tree`] from the filesystem
pub struct TreeBuilder {
    options: ScanOptions,
    exclude: GlobSet,
}

impl TreeBuilder {
    pub fn new(options: ScanOptions) -> Result<Self, ConfigurationError> {
        let exclude = compile_excludes(&options.exclude)?;
        Ok(Self { options, exclude })
    }

    /// Scan the directory `root` into a tree with a single top-level node.
    pub fn build(&self, root: &Path) -> Result<Tree, ApiError> {
        if !root.exists() {
            return Err(ApiError::InputNotFound(root.to_path_buf()));
        }
        let root = dunce::canonicalize(root)?;
        if !root.is_dir() {
            return Err(ApiError::NotADirectory(root));
        }
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut tree = Tree::new(name);

        let walker = WalkDir::new(&root)
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || self.keep(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if entry.depth() > 0 && !self.options.follow_symlinks && entry.path_is_symlink() {
                warn!("Skipping symbolic link {:?}", path);
                continue;
            }
            let kind = if entry.file_type().is_dir() {
                NodeKind::Directory
            } else {
                NodeKind::File
            };
            let size = match kind {
                NodeKind::File => match entry.metadata() {
                    Ok(meta) => meta.len(),
                    Err(e) => {
                        warn!("Skipping {:?}: {}", path, e);
                        continue;
                    }
                },
                _ => 0,
            };

            if entry.depth() == 0 {
                tree.add_root(path, kind, size)?;
                continue;
            }
            let parent = path
                .parent()
                .and_then(|p| tree.find(p))
                .ok_or_else(|| ApiError::InputNotFound(path.to_path_buf()))?;
            tree.add_child(parent, path, kind, size)?;
        }

        tree.recompute_sizes();
        debug!(
            root = %root.display(),
            nodes = tree.len(),
            bytes = tree.total_size(),
            "Scanned tree"
        );
        Ok(tree)
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if !self.options.include_hidden && (name.starts_with('.') || name.starts_with('_')) {
            debug!("Excluding hidden entry {:?}", entry.path());
            return false;
        }
        if self.exclude.is_match(entry.path()) {
            debug!("Excluding {:?}", entry.path());
            return false;
        }
        true
    }
}

fn compile_excludes(patterns: &[String]) -> Result<GlobSet, ConfigurationError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let trimmed = pattern.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        let expr = if trimmed.starts_with('/') || trimmed.starts_with("**") {
            trimmed.to_string()
        } else {
            format!("**/{}", trimmed)
        };
        let glob = Glob::new(&expr).map_err(|source| ConfigurationError::InvalidExclude {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|source| ConfigurationError::InvalidExclude {
            pattern: patterns.join(","),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(root.join("logs")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("a.bin"), vec![0u8; 100]).unwrap();
        fs::write(root.join("logs").join("x.log"), vec![0u8; 30]).unwrap();
        fs::write(root.join("logs").join("y.tmp"), vec![0u8; 5]).unwrap();
        fs::write(root.join("_private.txt"), b"secret").unwrap();
        fs::write(root.join(".git").join("HEAD"), b"ref").unwrap();
        temp_dir
    }

    #[test]
    fn test_build_skips_hidden_and_sums_sizes() {
        let temp_dir = fixture();
        let builder = TreeBuilder::new(ScanOptions::default()).unwrap();
        let tree = builder.build(&temp_dir.path().join("data")).unwrap();

        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.total_size(), 135);
        let names: Vec<String> = tree
            .leaf_paths()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.bin", "empty", "x.log", "y.tmp"]);
    }

    #[test]
    fn test_build_applies_excludes() {
        let temp_dir = fixture();
        let options = ScanOptions {
            exclude: vec!["*.tmp".to_string(), "empty/".to_string()],
            ..Default::default()
        };
        let tree = TreeBuilder::new(options)
            .unwrap()
            .build(&temp_dir.path().join("data"))
            .unwrap();
        assert_eq!(tree.total_size(), 130);
        assert_eq!(tree.leaf_paths().len(), 2);
    }

    #[test]
    fn test_build_includes_hidden_on_request() {
        let temp_dir = fixture();
        let options = ScanOptions {
            include_hidden: true,
            ..Default::default()
        };
        let tree = TreeBuilder::new(options)
            .unwrap()
            .build(&temp_dir.path().join("data"))
            .unwrap();
        assert_eq!(tree.total_size(), 144);
    }

    #[test]
    fn test_missing_root_is_input_not_found() {
        let builder = TreeBuilder::new(ScanOptions::default()).unwrap();
        let err = builder.build(Path::new("/no/such/dir/here")).unwrap_err();
        assert!(matches!(err, ApiError::InputNotFound(_)));
    }

    #[test]
    fn test_file_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("single.bin");
        fs::write(&file, vec![0u8; 100]).unwrap();
        let err = TreeBuilder::new(ScanOptions::default())
            .unwrap()
            .build(&file)
            .unwrap_err();
        assert!(matches!(err, ApiError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped_unless_followed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(root.join("real")).unwrap();
        fs::write(root.join("real").join("a.txt"), vec![0u8; 10]).unwrap();
        std::os::unix::fs::symlink("real", root.join("link")).unwrap();
        std::os::unix::fs::symlink("real/a.txt", root.join("alias.txt")).unwrap();

        let tree = TreeBuilder::new(ScanOptions::default())
            .unwrap()
            .build(&root)
            .unwrap();
        let canonical = dunce::canonicalize(&root).unwrap();
        assert_eq!(tree.leaf_paths(), vec![canonical.join("real").join("a.txt")]);
        assert_eq!(tree.total_size(), 10);

        let followed = TreeBuilder::new(ScanOptions {
            follow_symlinks: true,
            ..Default::default()
        })
        .unwrap()
        .build(&root)
        .unwrap();
        assert!(followed.contains_path(&canonical.join("link").join("a.txt")));
        assert_eq!(followed.total_size(), 30);
    }

    #[test]
    fn test_invalid_exclude_is_configuration_error() {
        let options = ScanOptions {
            exclude: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            TreeBuilder::new(options),
            Err(ConfigurationError::InvalidExclude { .. })
        ));
    }
}
