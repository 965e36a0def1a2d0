use super::tree_from_files;
use chunktree::error::ConfigurationError;
use chunktree::partition::{partition_tree, PartitionRule, PartitionSet, DEFAULT_PARTITION};
use std::path::Path;

fn files(entries: &[(&str, u64)]) -> Vec<(String, u64)> {
    entries.iter().map(|(p, s)| (p.to_string(), *s)).collect()
}

#[test]
fn test_logs_never_share_a_tree_with_data() {
    let tree = tree_from_files(&files(&[("logs/x.txt", 10), ("data/y.txt", 20)]));
    let set = PartitionSet::from_json(r#"{"logs": "**/logs/**"}"#).unwrap();

    let partitions = partition_tree(&tree, &set).unwrap();
    let names: Vec<&str> = partitions.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["logs", DEFAULT_PARTITION]);

    let logs = &partitions[0].tree;
    assert!(logs.contains_path(Path::new("/r/logs/x.txt")));
    assert!(!logs.contains_path(Path::new("/r/data")));
    assert_eq!(logs.total_size(), 10);

    let rest = &partitions[1].tree;
    assert!(rest.contains_path(Path::new("/r/data/y.txt")));
    assert!(!rest.contains_path(Path::new("/r/logs")));
    assert_eq!(rest.total_size(), 20);
}

#[test]
fn test_overlapping_patterns_name_the_leaf() {
    let tree = tree_from_files(&files(&[("logs/x.csv", 10)]));
    let set = PartitionSet::new(vec![
        PartitionRule::new("logs", Some("**/logs/**")),
        PartitionRule::new("tables", Some("*.csv")),
    ])
    .unwrap();

    match partition_tree(&tree, &set).unwrap_err() {
        ConfigurationError::OverlappingPartitions { leaf, first, second } => {
            assert_eq!(leaf, Path::new("/r/logs/x.csv"));
            assert_eq!((first.as_str(), second.as_str()), ("logs", "tables"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unmatched_patterns_produce_no_partition() {
    let tree = tree_from_files(&files(&[("data/y.txt", 20)]));
    let set = PartitionSet::from_json(r#"{"logs": "**/logs/**", "rest": null}"#).unwrap();
    let partitions = partition_tree(&tree, &set).unwrap();
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].name, "rest");
}

#[test]
fn test_invalid_partition_files_are_rejected() {
    assert!(matches!(
        PartitionSet::from_json(r#"{"a": null, "b": null}"#),
        Err(ConfigurationError::MultipleWildcards { .. })
    ));
    assert!(matches!(
        PartitionSet::from_json(r#"{"a": "*.txt", "b": "*.txt"}"#),
        Err(ConfigurationError::DuplicatePattern { .. })
    ));
    assert!(matches!(
        PartitionSet::from_json(r#"{"a": "[oops"}"#),
        Err(ConfigurationError::InvalidPattern { .. })
    ));
    assert!(matches!(
        PartitionSet::from_json(r#"{"a": {"pattern": "*.txt", "min_split_depth": 0}}"#),
        Err(ConfigurationError::InvalidSplitDepth(0))
    ));
}
