//! Archive manifests and materialization
//!
//! An [`ArchiveManifest`] is everything the upload phase needs to know about one archive
//! node: its object key and the `(source, archive-relative)` pairs to bundle. Archives are
//! written as tar files to a temporary name and renamed into place once complete, so a
//! partially written archive is never visible under its final name.

use crate::error::IntegrityError;
use crate::tree::{NodeId, NodeKind, Tree};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Builder, EntryType, Header, HeaderMode};

/// One member of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path of the leaf on disk
    pub source: PathBuf,
    /// Path inside the archive, relative to the archive's directory
    pub archive_path: PathBuf,
    pub kind: NodeKind,
}

/// Upload unit derived from an archive node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveManifest {
    pub partition: String,
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
    pub entries: Vec<ArchiveEntry>,
}

impl ArchiveManifest {
    /// Manifests for every archive of a chunked partition tree, in tree order.
    ///
    /// Keys are `<partition>/<archive path relative to base>`; an empty partition name
    /// gives keys without a prefix.
    pub fn collect(tree: &Tree, partition: &str, base: &Path) -> Result<Vec<Self>, IntegrityError> {
        tree.archives()
            .into_iter()
            .map(|id| Self::from_node(tree, id, partition, base))
            .collect()
    }

    pub fn from_node(
        tree: &Tree,
        archive: NodeId,
        partition: &str,
        base: &Path,
    ) -> Result<Self, IntegrityError> {
        let node = tree.node(archive)?;
        let archive_dir = node.path().parent().unwrap_or(Path::new("/"));

        let mut entries = Vec::new();
        for id in tree.subtree(archive).into_iter().skip(1) {
            let member = tree.node(id)?;
            if !member.is_leaf() || member.is_archive() {
                continue;
            }
            let relative = member
                .path()
                .strip_prefix(archive_dir)
                .unwrap_or(member.path())
                .to_path_buf();
            entries.push(ArchiveEntry {
                source: member.path().to_path_buf(),
                archive_path: relative,
                kind: member.kind(),
            });
        }

        Ok(Self {
            partition: partition.to_string(),
            key: object_key(partition, node.path(), base),
            path: node.path().to_path_buf(),
            size: node.size(),
            entries,
        })
    }

    /// File name of the archive (last key segment)
    pub fn file_name(&self) -> String {
        self.key.rsplit('/').next().unwrap_or(&self.key).to_string()
    }
}

/// Object key for an archive path: `<partition>/<path relative to base>` with `/`
/// separators.
pub fn object_key(partition: &str, path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let mut segments: Vec<String> = Vec::new();
    if !partition.is_empty() {
        segments.push(partition.trim_matches('/').to_string());
    }
    segments.extend(relative.components().filter_map(|c| match c {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }));
    segments.join("/")
}

/// Write `manifest` as a tar archive at `dest`, returning the archive's size in bytes.
///
/// The archive is built under a temporary name next to `dest` and renamed on success;
/// on failure the temporary file is removed.
pub fn write_tar(manifest: &ArchiveManifest, dest: &Path) -> io::Result<u64> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let temp_path = dest.with_extension("partial");
    match write_tar_inner(manifest, &temp_path) {
        Ok(()) => {
            fs::rename(&temp_path, dest)?;
            Ok(fs::metadata(dest)?.len())
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn write_tar_inner(manifest: &ArchiveManifest, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut builder = Builder::new(BufWriter::new(file));

    for entry in &manifest.entries {
        let metadata = fs::metadata(&entry.source)?;
        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&metadata, HeaderMode::Deterministic);
        match entry.kind {
            NodeKind::Directory => {
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                builder.append_data(&mut header, &entry.archive_path, io::empty())?;
            }
            NodeKind::File | NodeKind::Archive => {
                let source = File::open(&entry.source)?;
                builder.append_data(&mut header, &entry.archive_path, source)?;
            }
        }
    }

    let mut writer = builder.into_inner()?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}
