use serde::{Deserialize, Serialize};
use codechain_types::ContentId;

use crate::error::{StoreError, StoreResult};

const FILE_DOMAIN: &[u8] = b"codechain-file-v1";
const DIRECTORY_DOMAIN: &[u8] = b"codechain-dir-v1";

/// The kind of node stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Raw file bytes.
    File,
    /// Directory listing: ordered entries mapping names to node ids.
    Directory,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "dir"),
        }
    }
}

/// A stored node: kind tag + encoded data + cached size.
///
/// `StoredNode` is the unit of storage. Its id is a domain-separated BLAKE3
/// hash of the data, so a file and a directory with identical bytes never
/// collide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    pub kind: NodeKind,
    pub data: Vec<u8>,
    pub size: u64,
}

impl StoredNode {
    pub fn new(kind: NodeKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// A file node holding raw bytes.
    pub fn file(data: Vec<u8>) -> Self {
        Self::new(NodeKind::File, data)
    }

    /// Compute the content-addressed ID for this node.
    pub fn compute_id(&self) -> ContentId {
        let domain = match self.kind {
            NodeKind::File => FILE_DOMAIN,
            NodeKind::Directory => DIRECTORY_DOMAIN,
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(b":");
        hasher.update(&self.data);
        ContentId::from_hash(*hasher.finalize().as_bytes())
    }
}

/// A single entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub id: ContentId,
    pub kind: NodeKind,
    /// File size in bytes, or cumulative size for directories.
    pub size: u64,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, id: ContentId, kind: NodeKind, size: u64) -> Self {
        Self {
            name: name.into(),
            id,
            kind,
            size,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Directory listing node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Entries sorted by name.
    pub entries: Vec<DirEntry>,
}

impl DirectoryNode {
    /// Create a directory node. Entries are sorted by name for deterministic
    /// hashing.
    pub fn new(mut entries: Vec<DirEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }

    pub fn to_stored_node(&self) -> StoreResult<StoredNode> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredNode::new(NodeKind::Directory, data))
    }

    pub fn from_stored_node(node: &StoredNode) -> StoreResult<Self> {
        if node.kind != NodeKind::Directory {
            return Err(StoreError::CorruptNode {
                id: node.compute_id(),
                reason: format!("expected dir, got {}", node.kind),
            });
        }
        serde_json::from_slice(&node.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Sum of entry sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_is_content_addressed() {
        let a = StoredNode::file(b"same".to_vec()).compute_id();
        let b = StoredNode::file(b"same".to_vec()).compute_id();
        let c = StoredNode::file(b"other".to_vec()).compute_id();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn kinds_are_domain_separated() {
        let file = StoredNode::new(NodeKind::File, b"{}".to_vec());
        let dir = StoredNode::new(NodeKind::Directory, b"{}".to_vec());
        assert_ne!(file.compute_id(), dir.compute_id());
    }

    #[test]
    fn directory_entry_order_is_canonical() {
        let id = ContentId::from_bytes(b"x");
        let a = DirectoryNode::new(vec![
            DirEntry::new("z.txt", id, NodeKind::File, 1),
            DirEntry::new("a.txt", id, NodeKind::File, 1),
        ]);
        let b = DirectoryNode::new(vec![
            DirEntry::new("a.txt", id, NodeKind::File, 1),
            DirEntry::new("z.txt", id, NodeKind::File, 1),
        ]);
        assert_eq!(a.entries[0].name, "a.txt");
        assert_eq!(
            a.to_stored_node().unwrap().compute_id(),
            b.to_stored_node().unwrap().compute_id()
        );
        assert_eq!(a.total_size(), 2);
    }

    #[test]
    fn decoding_a_file_as_directory_fails() {
        let file = StoredNode::file(b"data".to_vec());
        assert!(matches!(
            DirectoryNode::from_stored_node(&file),
            Err(StoreError::CorruptNode { .. })
        ));
    }

    #[test]
    fn directory_node_roundtrip() {
        let dir = DirectoryNode::new(vec![DirEntry::new(
            "sub",
            ContentId::from_bytes(b"sub"),
            NodeKind::Directory,
            10,
        )]);
        let decoded = DirectoryNode::from_stored_node(&dir.to_stored_node().unwrap()).unwrap();
        assert_eq!(decoded, dir);
        assert!(decoded.get("sub").unwrap().is_dir());
    }
}
