use super::tree_from_files;
use chunktree::chunker::{ChunkSettings, Chunker};
use chunktree::partition::{partition_tree, PartitionRule, PartitionSet};
use chunktree::tree::TreeSnapshot;
use chunktree::validate::validate;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn files_strategy() -> impl Strategy<Value = Vec<(String, u64)>> {
    prop::collection::vec((0usize..5, prop::option::of(0usize..3), 0u64..5_000), 1..40).prop_map(
        |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (dir, sub, size))| {
                    let path = match (dir, sub) {
                        (4, _) => format!("f{}", i),
                        (d, Some(s)) => format!("d{}/s{}/f{}", d, s, i),
                        (d, None) => format!("d{}/f{}", d, i),
                    };
                    (path, size)
                })
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_chunking_conserves_leaves_and_sizes(
        files in files_strategy(),
        chunk_size in 1u64..6_000,
        depth in 1i64..4,
    ) {
        let mut tree = tree_from_files(&files);
        let expected = tree.leaf_paths();
        let total = tree.total_size();

        Chunker::new(ChunkSettings::new(chunk_size, depth).unwrap()).run(&mut tree).unwrap();

        let report = validate(&tree, &expected).unwrap();
        prop_assert_eq!(report.leaves, expected.len());
        prop_assert_eq!(tree.total_size(), total);
    }

    #[test]
    fn test_only_single_members_exceed_ceiling(
        files in files_strategy(),
        chunk_size in 1u64..6_000,
    ) {
        let mut tree = tree_from_files(&files);
        let settings = ChunkSettings::new(chunk_size, 1).unwrap();
        Chunker::new(settings).run(&mut tree).unwrap();

        for id in tree.archives() {
            let archive = tree.node(id).unwrap();
            if archive.size() <= settings.ceiling() {
                continue;
            }
            let members = archive.children().len();
            prop_assert_eq!(members, 1, "{:?} holds {} members", archive.path(), members);
        }
    }

    #[test]
    fn test_shallow_directories_are_fully_delegated(
        files in files_strategy(),
        chunk_size in 1u64..20_000,
        depth in 1i64..4,
    ) {
        let mut tree = tree_from_files(&files);
        Chunker::new(ChunkSettings::new(chunk_size, depth).unwrap()).run(&mut tree).unwrap();

        let mut stack: Vec<_> = tree.roots().to_vec();
        while let Some(id) = stack.pop() {
            let node = tree.node(id).unwrap();
            if node.is_archive() {
                continue;
            }
            if tree.depth(id).unwrap() <= depth as usize {
                for child in node.children() {
                    let child = tree.node(*child).unwrap();
                    prop_assert!(
                        child.is_archive() || child.has_archive_descendant(),
                        "{:?} keeps undelegated child {:?}",
                        node.path(),
                        child.path()
                    );
                }
            }
            stack.extend(node.children().iter().copied());
        }
    }

    #[test]
    fn test_rechunking_is_a_no_op(
        files in files_strategy(),
        chunk_size in 1u64..6_000,
        depth in 1i64..4,
    ) {
        let mut tree = tree_from_files(&files);
        let chunker = Chunker::new(ChunkSettings::new(chunk_size, depth).unwrap());
        chunker.run(&mut tree).unwrap();
        let before = TreeSnapshot::capture(&tree);

        let report = chunker.run(&mut tree).unwrap();
        prop_assert!(report.archives.is_empty());
        prop_assert_eq!(TreeSnapshot::capture(&tree), before);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete(files in files_strategy()) {
        let tree = tree_from_files(&files);
        let set = PartitionSet::new(vec![
            PartitionRule::new("zero", Some("**/d0/**")),
            PartitionRule::new("one", Some("**/d1/**")),
        ])
        .unwrap();

        let partitions = partition_tree(&tree, &set).unwrap();
        let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
        for partition in &partitions {
            prop_assert!(!partition.tree.leaf_paths().is_empty());
            for leaf in partition.tree.leaf_paths() {
                prop_assert!(seen.insert(leaf));
            }
        }
        let all: BTreeSet<PathBuf> = tree.leaf_paths().into_iter().collect();
        prop_assert_eq!(seen, all);
        let sizes: u64 = partitions.iter().map(|p| p.tree.total_size()).sum();
        prop_assert_eq!(sizes, tree.total_size());
    }
}
