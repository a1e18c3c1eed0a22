use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use codechain_types::ContentId;

use crate::error::{StoreError, StoreResult};
use crate::object::{DirEntry, DirectoryNode, NodeKind, StoredNode};
use crate::path::StorePath;
use crate::traits::{ByteStream, ContentStore, WriteOptions};

/// Size of the chunks `read` yields, matching common object store defaults.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// In-memory content store.
///
/// Intended for tests, embedding, and the local devnet. Nodes are held in a
/// `HashMap` keyed by content id; the mutable path namespace is a tree of
/// `BTreeMap`s that only records ids, so freezing a directory just hashes
/// its listing.
pub struct InMemoryContentStore {
    inner: RwLock<StoreState>,
    chunk_size: usize,
}

#[derive(Default, Serialize, Deserialize)]
struct StoreState {
    nodes: HashMap<ContentId, StoredNode>,
    root: MutableDir,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct MutableDir {
    children: BTreeMap<String, MutableEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum MutableEntry {
    File { id: ContentId, size: u64 },
    Dir(MutableDir),
}

enum Found<'a> {
    File(ContentId),
    Dir(&'a MutableDir),
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Create a store whose reads are split into `chunk_size`-byte chunks.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Number of immutable nodes currently stored.
    pub fn node_count(&self) -> StoreResult<usize> {
        Ok(self.read_state()?.nodes.len())
    }

    /// Total bytes across all stored nodes.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        Ok(self.read_state()?.nodes.values().map(|n| n.size).sum())
    }

    /// Whether a node with this id is stored.
    pub fn contains(&self, id: &ContentId) -> StoreResult<bool> {
        Ok(self.read_state()?.nodes.contains_key(id))
    }

    /// Load a store from a snapshot file, or start empty if the file does
    /// not exist yet.
    pub fn load_snapshot(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let reader = BufReader::new(fs::File::open(path)?);
        let state: StoreState = bincode::deserialize_from(reader)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tracing::debug!(path = %path.display(), nodes = state.nodes.len(), "loaded store snapshot");
        Ok(Self {
            inner: RwLock::new(state),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Write the full store state to `path` atomically.
    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let state = self.read_state()?;
            let mut writer = BufWriter::new(temp.as_file_mut());
            bincode::serialize_into(&mut writer, &*state)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path)?;
        Ok(())
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn get_node(&self, id: &ContentId) -> StoreResult<StoredNode> {
        self.read_state()?
            .nodes
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound(*id))
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.node_count().unwrap_or_default();
        f.debug_struct("InMemoryContentStore")
            .field("node_count", &count)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Walk to the directory at `path`, creating missing directories when
/// `create` is set.
fn dir_mut<'a>(
    root: &'a mut MutableDir,
    path: &StorePath,
    create: bool,
) -> StoreResult<&'a mut MutableDir> {
    let mut current = root;
    let mut walked = StorePath::root();
    for segment in path.segments() {
        walked.push(segment)?;
        let entry = if create {
            current
                .children
                .entry(segment.clone())
                .or_insert_with(|| MutableEntry::Dir(MutableDir::default()))
        } else {
            current
                .children
                .get_mut(segment)
                .ok_or_else(|| StoreError::PathNotFound(walked.to_string()))?
        };
        current = match entry {
            MutableEntry::Dir(dir) => dir,
            MutableEntry::File { .. } => return Err(StoreError::NotADirectory(walked.to_string())),
        };
    }
    Ok(current)
}

fn lookup<'a>(root: &'a MutableDir, path: &StorePath) -> StoreResult<Found<'a>> {
    let mut current = root;
    let segments = path.segments();
    for (index, segment) in segments.iter().enumerate() {
        match current.children.get(segment) {
            Some(MutableEntry::Dir(dir)) => current = dir,
            Some(MutableEntry::File { id, .. }) if index + 1 == segments.len() => {
                return Ok(Found::File(*id));
            }
            Some(MutableEntry::File { .. }) => {
                return Err(StoreError::NotADirectory(segment.clone()));
            }
            None => return Err(StoreError::PathNotFound(path.to_string())),
        }
    }
    Ok(Found::Dir(current))
}

/// Hash a mutable directory into immutable nodes, returning its id and the
/// cumulative size of everything below it.
fn freeze(
    nodes: &mut HashMap<ContentId, StoredNode>,
    dir: &MutableDir,
) -> StoreResult<(ContentId, u64)> {
    let mut entries = Vec::with_capacity(dir.children.len());
    for (name, entry) in &dir.children {
        match entry {
            MutableEntry::File { id, size } => {
                entries.push(DirEntry::new(name.clone(), *id, NodeKind::File, *size));
            }
            MutableEntry::Dir(sub) => {
                let (id, size) = freeze(nodes, sub)?;
                entries.push(DirEntry::new(name.clone(), id, NodeKind::Directory, size));
            }
        }
    }
    let listing = DirectoryNode::new(entries);
    let size = listing.total_size();
    let stored = listing.to_stored_node()?;
    let id = stored.compute_id();
    nodes.entry(id).or_insert(stored);
    Ok((id, size))
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn mkdir(&self, path: &StorePath) -> StoreResult<()> {
        let mut guard = self.write_state()?;
        dir_mut(&mut guard.root, path, true)?;
        Ok(())
    }

    async fn write(&self, path: &StorePath, data: Bytes, options: WriteOptions) -> StoreResult<()> {
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| StoreError::NotAFile(path.to_string()))?;
        let node = StoredNode::file(data.to_vec());
        let id = node.compute_id();
        let size = node.size;

        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let dir = dir_mut(&mut state.root, &parent, options.parents)?;
        match dir.children.get(name) {
            Some(MutableEntry::Dir(_)) => return Err(StoreError::NotAFile(path.to_string())),
            None if !options.create => return Err(StoreError::PathNotFound(path.to_string())),
            _ => {}
        }
        dir.children
            .insert(name.to_string(), MutableEntry::File { id, size });
        state.nodes.entry(id).or_insert(node);

        tracing::trace!(path = %path, id = %id.short_hex(), size, "wrote file");
        Ok(())
    }

    async fn stat(&self, path: &StorePath) -> StoreResult<ContentId> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        match lookup(&state.root, path)? {
            Found::File(id) => Ok(id),
            Found::Dir(dir) => {
                let (id, _) = freeze(&mut state.nodes, dir)?;
                Ok(id)
            }
        }
    }

    async fn list(&self, id: &ContentId) -> StoreResult<Vec<DirEntry>> {
        let node = self.get_node(id)?;
        if node.kind != NodeKind::Directory {
            return Err(StoreError::NotADirectory(id.to_hex()));
        }
        Ok(DirectoryNode::from_stored_node(&node)?.entries)
    }

    async fn read(&self, id: &ContentId) -> StoreResult<ByteStream> {
        let node = self.get_node(id)?;
        if node.kind != NodeKind::File {
            return Err(StoreError::NotAFile(id.to_hex()));
        }
        let data = Bytes::from(node.data);
        let chunk_size = self.chunk_size;
        let chunks: Vec<StoreResult<Bytes>> = (0..data.len())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn path(p: &str) -> StorePath {
        StorePath::parse(p).unwrap()
    }

    async fn write(store: &InMemoryContentStore, p: &str, data: &[u8]) {
        store
            .write(&path(p), Bytes::copy_from_slice(data), WriteOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn write_then_stat_file() {
        let store = InMemoryContentStore::new();
        write(&store, "/stage/a.txt", b"hello").await;
        let id = store.stat(&path("/stage/a.txt")).await.unwrap();
        assert_eq!(id, StoredNode::file(b"hello".to_vec()).compute_id());
        assert_eq!(store.read_all(&id).await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn same_content_same_id_at_different_paths() {
        let store = InMemoryContentStore::new();
        write(&store, "/one/a.txt", b"dup").await;
        write(&store, "/two/deep/b.txt", b"dup").await;
        let a = store.stat(&path("/one/a.txt")).await.unwrap();
        let b = store.stat(&path("/two/deep/b.txt")).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn directory_stat_lists_children() {
        let store = InMemoryContentStore::new();
        write(&store, "/stage/src/main.rs", b"fn main() {}").await;
        write(&store, "/stage/README", b"readme").await;

        let root = store.stat(&path("/stage")).await.unwrap();
        let entries = store.list(&root).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["README", "src"]);
        assert_eq!(entries[0].kind, NodeKind::File);
        assert_eq!(entries[1].kind, NodeKind::Directory);
        assert_eq!(entries[1].size, 12);

        let src = store.list(&entries[1].id).await.unwrap();
        assert_eq!(src.len(), 1);
        assert_eq!(src[0].name, "main.rs");
    }

    #[tokio::test]
    async fn identical_trees_share_root_id() {
        let store = InMemoryContentStore::new();
        for stage in ["/s1", "/s2"] {
            write(&store, &format!("{stage}/x/y.txt"), b"y").await;
            write(&store, &format!("{stage}/z.txt"), b"z").await;
        }
        let a = store.stat(&path("/s1")).await.unwrap();
        let b = store.stat(&path("/s2")).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mkdir_is_idempotent() {
        let store = InMemoryContentStore::new();
        store.mkdir(&path("/a/b/c")).await.unwrap();
        store.mkdir(&path("/a/b/c")).await.unwrap();
        let id = store.stat(&path("/a/b/c")).await.unwrap();
        assert!(store.list(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_without_parents_requires_existing_dir() {
        let store = InMemoryContentStore::new();
        let opts = WriteOptions {
            create: true,
            parents: false,
        };
        let err = store
            .write(&path("/missing/f"), Bytes::from_static(b"x"), opts)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PathNotFound(_)));

        store.mkdir(&path("/present")).await.unwrap();
        store
            .write(&path("/present/f"), Bytes::from_static(b"x"), opts)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn write_without_create_requires_existing_file() {
        let store = InMemoryContentStore::new();
        let opts = WriteOptions {
            create: false,
            parents: true,
        };
        let err = store
            .write(&path("/d/f"), Bytes::from_static(b"x"), opts)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn file_in_place_of_directory_is_rejected() {
        let store = InMemoryContentStore::new();
        write(&store, "/a", b"file").await;
        let err = store.mkdir(&path("/a/b")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotADirectory(_)));

        store.mkdir(&path("/dir")).await.unwrap();
        let err = store
            .write(&path("/dir"), Bytes::from_static(b"x"), WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAFile(_)));
    }

    #[tokio::test]
    async fn stat_missing_path() {
        let store = InMemoryContentStore::new();
        let err = store.stat(&path("/nope")).await.unwrap_err();
        assert!(matches!(err, StoreError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn read_is_chunked_in_order() {
        let store = InMemoryContentStore::with_chunk_size(4);
        let data: Vec<u8> = (0u8..10).collect();
        write(&store, "/f", &data).await;
        let id = store.stat(&path("/f")).await.unwrap();

        let chunks: Vec<Bytes> = store.read(&id).await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 2);
        assert_eq!(store.read_all(&id).await.unwrap().to_vec(), data);
    }

    #[tokio::test]
    async fn read_empty_file() {
        let store = InMemoryContentStore::new();
        write(&store, "/empty", b"").await;
        let id = store.stat(&path("/empty")).await.unwrap();
        assert!(store.read_all(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_and_list_check_kinds() {
        let store = InMemoryContentStore::new();
        write(&store, "/d/f", b"x").await;
        let dir = store.stat(&path("/d")).await.unwrap();
        let file = store.stat(&path("/d/f")).await.unwrap();
        assert!(matches!(store.read(&dir).await, Err(StoreError::NotAFile(_))));
        assert!(matches!(store.list(&file).await, Err(StoreError::NotADirectory(_))));
        let unknown = ContentId::from_bytes(b"unknown");
        assert!(matches!(store.list(&unknown).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn frozen_tree_survives_later_writes() {
        let store = InMemoryContentStore::new();
        write(&store, "/stage/a", b"v1").await;
        let before = store.stat(&path("/stage")).await.unwrap();
        write(&store, "/stage/a", b"v2").await;
        let after = store.stat(&path("/stage")).await.unwrap();
        assert_ne!(before, after);

        let old = store.list(&before).await.unwrap();
        assert_eq!(store.read_all(&old[0].id).await.unwrap(), Bytes::from_static(b"v1"));
    }

    #[tokio::test]
    async fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("state").join("store.bin");

        let store = InMemoryContentStore::new();
        write(&store, "/stage/a.txt", b"persisted").await;
        let root = store.stat(&path("/stage")).await.unwrap();
        store.save_snapshot(&snapshot).unwrap();

        let loaded = InMemoryContentStore::load_snapshot(&snapshot).unwrap();
        assert_eq!(loaded.node_count().unwrap(), store.node_count().unwrap());
        let entries = loaded.list(&root).await.unwrap();
        assert_eq!(
            loaded.read_all(&entries[0].id).await.unwrap(),
            Bytes::from_static(b"persisted")
        );
    }

    #[test]
    fn load_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryContentStore::load_snapshot(&dir.path().join("none.bin")).unwrap();
        assert_eq!(store.node_count().unwrap(), 0);
    }
}
