//! Integration tests for chunktree

mod chunking_properties;
mod end_to_end;
mod partition_contracts;

use chunktree::tree::{NodeKind, Tree};
use std::fs;
use std::path::Path;

/// Write `size` bytes of a repeating pattern to `root/relative`, creating parents.
pub fn write_file(root: &Path, relative: &str, size: usize) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let body: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    fs::write(path, body).unwrap();
}

/// In-memory tree from `(relative path, size)` pairs under `/r`.
pub fn tree_from_files(files: &[(String, u64)]) -> Tree {
    let mut tree = Tree::new("r");
    tree.add_root("/r", NodeKind::Directory, 0).unwrap();
    for (relative, size) in files {
        let mut parent = tree.find(Path::new("/r")).unwrap();
        let mut current = std::path::PathBuf::from("/r");
        let segments: Vec<&str> = relative.split('/').collect();
        for (i, segment) in segments.iter().enumerate() {
            current = current.join(segment);
            if let Some(existing) = tree.find(&current) {
                parent = existing;
                continue;
            }
            let last = i + 1 == segments.len();
            let (kind, bytes) = if last {
                (NodeKind::File, *size)
            } else {
                (NodeKind::Directory, 0)
            };
            parent = tree.add_child(parent, current.clone(), kind, bytes).unwrap();
        }
    }
    tree.recompute_sizes();
    tree
}
