//! Synchronization engine for CodeChain.
//!
//! Moves a local directory tree into the content store and back:
//! - [`DirectoryMirror`] replicates a directory under a fresh staging root
//!   and returns the root content id
//! - [`TreeReconstructor`] re-materializes a root id into a [`FileTree`]
//!
//! File transfers run concurrently through a bounded pool, and every
//! transfer is joined before the root is stat'ed or the tree is returned.
//! Cancellation is honoured between files.

pub mod config;
pub mod error;
pub mod mirror;
pub mod reconstruct;
pub mod tree;

mod pool;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use mirror::{DirectoryMirror, UploadReport};
pub use reconstruct::TreeReconstructor;
pub use tree::FileTree;
