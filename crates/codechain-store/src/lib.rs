//! Content-addressed store client for CodeChain.
//!
//! The store is hierarchy-unaware at its core: every node (file bytes or a
//! directory listing) lives under the BLAKE3 hash of its canonical encoding.
//! On top of that sits a mutable path namespace, used as a staging area while
//! uploading: files are written by path, and `stat` on a directory path
//! freezes that subtree into immutable nodes and returns the root id.
//!
//! # Capabilities
//!
//! All backends implement the [`ContentStore`] trait:
//!
//! - `mkdir(path)` -- idempotent, creates intermediate directories
//! - `write(path, bytes, options)` -- create or replace a file at a path
//! - `stat(path)` -- content id of the node at a path
//! - `list(id)` -- immediate children of a directory node
//! - `read(id)` -- chunked byte stream of a file node
//!
//! [`InMemoryContentStore`] is the bundled backend, used by tests and by the
//! local devnet (it can be saved to and loaded from a snapshot file).
//!
//! # Design Rules
//!
//! 1. Nodes are immutable once written; identical content maps to one id.
//! 2. Only the path namespace is mutable; freezing it never rewrites nodes.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod object;
pub mod path;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryContentStore;
pub use object::{DirEntry, DirectoryNode, NodeKind, StoredNode};
pub use path::StorePath;
pub use traits::{ByteStream, ContentStore, WriteOptions};
