use std::sync::Arc;

use bytes::Bytes;
use codechain_store::{ContentStore, NodeKind};
use codechain_types::ContentId;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::pool::TransferPool;
use crate::tree::FileTree;

/// Rebuilds a stored tree in memory, byte for byte.
///
/// Directories are walked with an explicit stack, so tree depth never grows
/// the call stack. File reads run concurrently through the transfer pool.
pub struct TreeReconstructor {
    store: Arc<dyn ContentStore>,
    config: SyncConfig,
    cancel: CancellationToken,
}

impl TreeReconstructor {
    pub fn new(store: Arc<dyn ContentStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reconstruct the tree rooted at `root`. Any failed listing or read
    /// aborts the whole reconstruction.
    pub async fn reconstruct(&self, root: &ContentId) -> SyncResult<FileTree> {
        let mut tree = FileTree::new();
        let mut fetched: Vec<(String, Bytes)> = Vec::new();
        let mut pool = TransferPool::new(self.config.max_concurrency);
        let mut pending = vec![(*root, String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let entries = self
                .store
                .list(&dir)
                .await
                .map_err(|e| SyncError::store("list", dir, e))?;

            for entry in entries {
                if self.cancel.is_cancelled() {
                    tracing::warn!(root = %root.short_hex(), "clone cancelled");
                    pool.drain().await;
                    return Err(SyncError::Cancelled);
                }
                let path = if prefix.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{prefix}/{}", entry.name)
                };
                match entry.kind {
                    NodeKind::Directory => {
                        tree.insert_directory(path.clone());
                        pending.push((entry.id, path));
                    }
                    NodeKind::File => {
                        pool.collect_ready(&mut fetched)?;
                        let store = Arc::clone(&self.store);
                        let id = entry.id;
                        pool.spawn(async move {
                            let data = store
                                .read_all(&id)
                                .await
                                .map_err(|e| SyncError::store("read", id, e))?;
                            tracing::debug!(path = %path, bytes = data.len(), "fetched file");
                            Ok((path, data))
                        })
                        .await?;
                    }
                }
            }
        }
        pool.finish(&mut fetched).await?;

        for (path, data) in fetched {
            tree.insert_file(path, data);
        }
        tracing::info!(
            root = %root.short_hex(),
            files = tree.file_count(),
            bytes = tree.total_bytes(),
            "reconstruction complete"
        );
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use codechain_store::{
        ByteStream, DirEntry, InMemoryContentStore, StoreError, StorePath, StoreResult,
        WriteOptions,
    };
    use proptest::prelude::*;

    use super::*;
    use crate::mirror::DirectoryMirror;

    fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
        for (path, data) in files {
            let full = root.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, data).unwrap();
        }
    }

    async fn upload(store: &Arc<InMemoryContentStore>, root: &Path) -> ContentId {
        DirectoryMirror::new(store.clone(), SyncConfig::default())
            .upload(root)
            .await
            .unwrap()
            .root
            .unwrap()
    }

    /// Store wrapper whose reads always fail.
    struct UnreadableStore(InMemoryContentStore);

    #[async_trait::async_trait]
    impl ContentStore for UnreadableStore {
        async fn mkdir(&self, path: &StorePath) -> StoreResult<()> {
            self.0.mkdir(path).await
        }

        async fn write(&self, path: &StorePath, data: Bytes, options: WriteOptions) -> StoreResult<()> {
            self.0.write(path, data, options).await
        }

        async fn stat(&self, path: &StorePath) -> StoreResult<ContentId> {
            self.0.stat(path).await
        }

        async fn list(&self, id: &ContentId) -> StoreResult<Vec<DirEntry>> {
            self.0.list(id).await
        }

        async fn read(&self, id: &ContentId) -> StoreResult<ByteStream> {
            Err(StoreError::NotFound(*id))
        }
    }

    #[tokio::test]
    async fn round_trip_three_files() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("main.rs", b"fn main() {}"),
                ("util/mod.rs", b"pub mod io;"),
                ("util/io.rs", b""),
            ],
        );
        let store = Arc::new(InMemoryContentStore::with_chunk_size(4));
        let root = upload(&store, dir.path()).await;

        let tree = TreeReconstructor::new(store, SyncConfig::default())
            .reconstruct(&root)
            .await
            .unwrap();
        assert!(tree.same_files(&FileTree::from_dir(dir.path()).unwrap()));
        assert_eq!(tree.directories().collect::<Vec<_>>(), vec!["util"]);
    }

    #[tokio::test]
    async fn deep_trees_do_not_recurse() {
        let dir = tempfile::tempdir().unwrap();
        let deep: String = (0..200).map(|i| format!("d{i}/")).collect();
        write_tree(dir.path(), &[(&format!("{deep}leaf.txt"), b"leaf")]);
        let store = Arc::new(InMemoryContentStore::new());
        let root = upload(&store, dir.path()).await;

        let tree = TreeReconstructor::new(store, SyncConfig::default())
            .reconstruct(&root)
            .await
            .unwrap();
        assert_eq!(tree.get(&format!("{deep}leaf.txt")).unwrap().as_ref(), b"leaf");
    }

    #[tokio::test]
    async fn read_failure_aborts_reconstruction() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a.txt", b"a"), ("b/c.txt", b"c")]);
        let backing = Arc::new(InMemoryContentStore::new());
        let root = upload(&backing, dir.path()).await;

        let inner = Arc::try_unwrap(backing).unwrap();
        let store = Arc::new(UnreadableStore(inner));
        let err = TreeReconstructor::new(store, SyncConfig::default())
            .reconstruct(&root)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store { operation: "read", .. }));
    }

    #[tokio::test]
    async fn unknown_root_fails_listing() {
        let store = Arc::new(InMemoryContentStore::new());
        let err = TreeReconstructor::new(store, SyncConfig::default())
            .reconstruct(&ContentId::from_bytes(b"nothing"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store { operation: "list", .. }));
    }

    #[tokio::test]
    async fn cancelled_reconstruction() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a.txt", b"a")]);
        let store = Arc::new(InMemoryContentStore::new());
        let root = upload(&store, dir.path()).await;

        let token = CancellationToken::new();
        token.cancel();
        let err = TreeReconstructor::new(store, SyncConfig::default())
            .with_cancellation(token)
            .reconstruct(&root)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
    }

    /// Relative file paths where no file path is a directory prefix of another.
    fn tree_strategy() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
        prop::collection::btree_map(
            "[a-z]{1,5}(/[a-z]{1,5}){0,2}",
            prop::collection::vec(any::<u8>(), 0..300),
            1..10,
        )
        .prop_filter("file used as directory", |files| {
            files.keys().all(|a| {
                files
                    .keys()
                    .all(|b| !b.starts_with(&format!("{a}/")))
            })
        })
        .prop_map(|files| files.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn mirror_then_reconstruct_is_identity(files in tree_strategy()) {
            let dir = tempfile::tempdir().unwrap();
            let borrowed: Vec<(&str, &[u8])> =
                files.iter().map(|(p, d)| (p.as_str(), d.as_slice())).collect();
            write_tree(dir.path(), &borrowed);

            let runtime = tokio::runtime::Runtime::new().unwrap();
            let tree = runtime.block_on(async {
                let store = Arc::new(InMemoryContentStore::with_chunk_size(64));
                let root = upload(&store, dir.path()).await;
                TreeReconstructor::new(store, SyncConfig { max_concurrency: 3, ..SyncConfig::default() })
                    .reconstruct(&root)
                    .await
                    .unwrap()
            });

            prop_assert_eq!(tree.file_count(), files.len());
            for (path, data) in &files {
                prop_assert_eq!(tree.get(path).map(|b| b.to_vec()), Some(data.clone()));
            }
        }

        #[test]
        fn identical_content_shares_an_id(
            data in prop::collection::vec(any::<u8>(), 0..512),
            first in "[a-z]{1,6}",
            second in "[a-z]{1,6}/[a-z]{1,6}",
        ) {
            let dir = tempfile::tempdir().unwrap();
            write_tree(dir.path(), &[(first.as_str(), &data)]);
            let other = tempfile::tempdir().unwrap();
            write_tree(other.path(), &[(second.as_str(), &data)]);

            let runtime = tokio::runtime::Runtime::new().unwrap();
            let (a, b) = runtime.block_on(async {
                let store = Arc::new(InMemoryContentStore::new());
                let ra = upload(&store, dir.path()).await;
                let rb = upload(&store, other.path()).await;
                let a = store.list(&ra).await.unwrap()[0].id;
                let sub = store.list(&rb).await.unwrap()[0].id;
                let b = store.list(&sub).await.unwrap()[0].id;
                (a, b)
            });
            prop_assert_eq!(a, b);
        }
    }
}
