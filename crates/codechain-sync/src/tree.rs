use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use walkdir::WalkDir;

use crate::error::{SyncError, SyncResult};

/// An in-memory directory tree: file bytes keyed by `/`-separated relative
/// path, plus the directories seen along the way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileTree {
    files: BTreeMap<String, Bytes>,
    directories: BTreeSet<String>,
}

/// A regular file found under a local root.
#[derive(Clone, Debug)]
pub(crate) struct LocalFile {
    pub(crate) absolute: PathBuf,
    pub(crate) relative: String,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file. Parent directories are recorded implicitly.
    pub fn insert_file(&mut self, path: impl Into<String>, data: Bytes) {
        let path = path.into();
        let mut parent = path.as_str();
        while let Some((dir, _)) = parent.rsplit_once('/') {
            self.directories.insert(dir.to_string());
            parent = dir;
        }
        self.files.insert(path, data);
    }

    pub fn insert_directory(&mut self, path: impl Into<String>) {
        self.directories.insert(path.into());
    }

    pub fn get(&self, path: &str) -> Option<&Bytes> {
        self.files.get(path)
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.files.iter().map(|(p, d)| (p.as_str(), d))
    }

    /// Directories in path order; parents sort before their children.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.directories.iter().map(String::as_str)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|d| d.len() as u64).sum()
    }

    /// Whether both trees hold the same (path, bytes) pairs, ignoring
    /// directories.
    pub fn same_files(&self, other: &FileTree) -> bool {
        self.files == other.files
    }

    /// Read every regular file under `root` into memory.
    pub fn from_dir(root: &Path) -> SyncResult<Self> {
        let mut tree = Self::new();
        for file in walk_regular_files(root)? {
            let data = std::fs::read(&file.absolute)
                .map_err(|e| SyncError::local(&file.absolute, e))?;
            tree.insert_file(file.relative, Bytes::from(data));
        }
        Ok(tree)
    }
}

/// Enumerate regular files under `root`. Symlinks and other special files
/// are skipped.
pub(crate) fn walk_regular_files(root: &Path) -> SyncResult<Vec<LocalFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            SyncError::LocalIo {
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_path(root, entry.path())?;
        files.push(LocalFile {
            absolute: entry.into_path(),
            relative,
        });
    }
    Ok(files)
}

fn relative_path(root: &Path, path: &Path) -> SyncResult<String> {
    let stripped = path
        .strip_prefix(root)
        .map_err(|_| SyncError::NonUtf8Path(path.to_path_buf()))?;
    let mut segments = Vec::new();
    for component in stripped.components() {
        let segment = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| SyncError::NonUtf8Path(path.to_path_buf()))?;
        segments.push(segment);
    }
    Ok(segments.join("/"))
}
