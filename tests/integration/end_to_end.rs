use super::write_file;
use chunktree::chunker::ChunkSettings;
use chunktree::observer::NullObserver;
use chunktree::partition::PartitionSet;
use chunktree::pipeline::{self, Plan};
use chunktree::store::LocalObjectStore;
use chunktree::tree::{ScanOptions, TreeBuilder, TreeSnapshot};
use chunktree::upload::{UploadOptions, Uploader};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn dataset() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("dataset");
    write_file(&root, "README.md", 120);
    write_file(&root, "logs/2024/jan.log", 900);
    write_file(&root, "logs/2024/feb.log", 1_500);
    write_file(&root, "logs/2023/dec.log", 400);
    write_file(&root, "images/a.png", 2_000);
    write_file(&root, "images/b.png", 2_000);
    write_file(&root, "images/thumbs/a.png", 50);
    write_file(&root, "tables/t1.csv", 700);
    write_file(&root, ".cache/skip.bin", 5_000);
    std::fs::create_dir_all(root.join("empty")).unwrap();
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink("images", root.join("pictures")).unwrap();
        std::os::unix::fs::symlink("tables/t1.csv", root.join("latest.csv")).unwrap();
    }
    temp_dir
}

fn plan_dataset(root: &Path, partitions: &PartitionSet) -> Plan {
    let tree = TreeBuilder::new(ScanOptions::default())
        .unwrap()
        .build(root)
        .unwrap();
    let settings = ChunkSettings::new(2_048, 1).unwrap();
    pipeline::plan(&tree, partitions, &settings, &NullObserver).unwrap()
}

/// Every regular file under `root` keyed by its path relative to `base`, skipping hidden
/// entries and symbolic links.
fn source_files(root: &Path, base: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e.path().strip_prefix(base).unwrap().to_path_buf();
            (relative, std::fs::read(e.path()).unwrap())
        })
        .collect()
}

/// Unpack every uploaded archive back into `relative path -> contents`.
fn uploaded_files(bucket: &Path, keys: &[String], partition: &str) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    for key in keys {
        let relative_key = key
            .strip_prefix(&format!("{}/", partition))
            .unwrap_or(key.as_str());
        let archive_dir = Path::new(relative_key).parent().unwrap().to_path_buf();
        let mut archive = tar::Archive::new(File::open(bucket.join(key)).unwrap());
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let path = archive_dir.join(entry.path().unwrap());
            let mut body = Vec::new();
            entry.read_to_end(&mut body).unwrap();
            assert!(files.insert(path, body).is_none(), "file packed twice");
        }
    }
    files
}

#[tokio::test]
async fn test_scan_plan_upload_round_trip() {
    let temp_dir = dataset();
    let root = dunce::canonicalize(temp_dir.path().join("dataset")).unwrap();
    let bucket = temp_dir.path().join("bucket");

    let partitions = PartitionSet::from_json(r#"{"logs": "**/logs/**"}"#).unwrap();
    let plan = plan_dataset(&root, &partitions);
    assert_eq!(plan.base, root.parent().unwrap());

    let uploader = Uploader::new(
        Arc::new(LocalObjectStore::new(&bucket, None)),
        UploadOptions {
            workers: 3,
            scratch_dir: Some(temp_dir.path().join("scratch")),
            retry_delay_ms: 1,
            ..Default::default()
        },
    );
    let reports = pipeline::upload(&plan, &uploader, &NullObserver).await.unwrap();
    assert!(reports.iter().all(|r| r.is_success()));
    assert_eq!(
        reports.iter().map(|r| r.uploaded.len()).sum::<usize>(),
        plan.archive_count()
    );

    let mut restored = BTreeMap::new();
    for report in &reports {
        assert!(report.uploaded.iter().all(|k| k.starts_with(&format!("{}/", report.partition))));
        restored.extend(uploaded_files(&bucket, &report.uploaded, &report.partition));
    }
    assert_eq!(restored, source_files(&root, &plan.base));
}

#[tokio::test]
async fn test_second_upload_skips_existing_archives() {
    let temp_dir = dataset();
    let root = dunce::canonicalize(temp_dir.path().join("dataset")).unwrap();
    let plan = plan_dataset(&root, &PartitionSet::single());
    let store = Arc::new(LocalObjectStore::new(temp_dir.path().join("bucket"), None));
    let options = UploadOptions {
        scratch_dir: Some(temp_dir.path().join("scratch")),
        ..Default::default()
    };

    let first_uploader = Uploader::new(store.clone(), options.clone());
    let first = pipeline::upload(&plan, &first_uploader, &NullObserver)
        .await
        .unwrap();
    let second = pipeline::upload(&plan, &Uploader::new(store, options), &NullObserver)
        .await
        .unwrap();

    assert_eq!(first[0].uploaded.len(), plan.archive_count());
    assert!(second[0].uploaded.is_empty());
    assert_eq!(second[0].skipped.len(), plan.archive_count());
}

#[test]
fn test_snapshot_replays_plan() {
    let temp_dir = dataset();
    let root = dunce::canonicalize(temp_dir.path().join("dataset")).unwrap();
    let plan = plan_dataset(&root, &PartitionSet::single());

    let written = plan.save_snapshots(&temp_dir.path().join("snapshots")).unwrap();
    let restored = TreeSnapshot::load(&written[0]).unwrap().restore().unwrap();
    let expected = plan.partitions[0].tree.leaf_paths();
    chunktree::validate(&restored, &expected).unwrap();
    assert_eq!(
        TreeSnapshot::capture(&restored),
        TreeSnapshot::capture(&plan.partitions[0].tree)
    );
}

#[test]
fn test_missing_input_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let err = TreeBuilder::new(ScanOptions::default())
        .unwrap()
        .build(&temp_dir.path().join("absent"))
        .unwrap_err();
    assert!(matches!(err, chunktree::ApiError::InputNotFound(_)));
}

#[test]
fn test_file_input_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    write_file(temp_dir.path(), "single.bin", 100);
    let err = TreeBuilder::new(ScanOptions::default())
        .unwrap()
        .build(&temp_dir.path().join("single.bin"))
        .unwrap_err();
    assert!(matches!(err, chunktree::ApiError::NotADirectory(_)));
}
