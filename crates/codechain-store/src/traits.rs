use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use codechain_types::ContentId;

use crate::error::StoreResult;
use crate::object::DirEntry;
use crate::path::StorePath;

/// Chunked byte stream returned by [`ContentStore::read`].
pub type ByteStream = BoxStream<'static, StoreResult<Bytes>>;

/// Options for [`ContentStore::write`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create the file if it does not exist.
    pub create: bool,
    /// Create missing parent directories.
    pub parents: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create: true,
            parents: true,
        }
    }
}

/// Client for a content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Identical content always maps to the same [`ContentId`].
/// - Nodes reachable from an id returned by `stat` never change.
/// - `mkdir` is idempotent.
/// - Independent paths may be written concurrently.
/// - All I/O errors are propagated, never silently ignored.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a directory and any missing parents. Succeeds if it already
    /// exists.
    async fn mkdir(&self, path: &StorePath) -> StoreResult<()>;

    /// Write a file at `path`, replacing any previous content.
    async fn write(&self, path: &StorePath, data: Bytes, options: WriteOptions) -> StoreResult<()>;

    /// Return the content id of the node currently at `path`.
    async fn stat(&self, path: &StorePath) -> StoreResult<ContentId>;

    /// List the immediate children of a directory node.
    async fn list(&self, id: &ContentId) -> StoreResult<Vec<DirEntry>>;

    /// Stream the bytes of a file node. Chunks arrive in order.
    async fn read(&self, id: &ContentId) -> StoreResult<ByteStream>;

    /// Read a file node fully, concatenating chunks in order.
    async fn read_all(&self, id: &ContentId) -> StoreResult<Bytes> {
        let chunks: Vec<Bytes> = self.read(id).await?.try_collect().await?;
        if chunks.len() == 1 {
            return Ok(chunks.into_iter().next().unwrap_or_default());
        }
        let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}
