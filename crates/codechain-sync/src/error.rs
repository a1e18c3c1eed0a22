use std::path::{Path, PathBuf};

use codechain_store::StoreError;

/// Errors produced while mirroring or reconstructing a tree.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A content store call failed. `target` is the store path or content id.
    #[error("content store {operation} failed for {target}: {source}")]
    Store {
        operation: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("local I/O error at {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("operation cancelled")]
    Cancelled,

    /// Every randomly drawn staging name was already present in the store.
    #[error("no free staging name after {0} attempts")]
    StagingExhausted(usize),

    /// A transfer task panicked or was aborted.
    #[error("transfer task failed: {0}")]
    Task(String),
}

impl SyncError {
    pub(crate) fn store(operation: &'static str, target: impl ToString, source: StoreError) -> Self {
        Self::Store {
            operation,
            target: target.to_string(),
            source,
        }
    }

    pub(crate) fn local(path: &Path, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
