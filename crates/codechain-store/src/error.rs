use codechain_types::ContentId;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing exists at the given path in the mutable namespace.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// No node is stored under the given content id.
    #[error("content not found: {0}")]
    NotFound(ContentId),

    /// A directory operation hit a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file operation hit a directory.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// The path is malformed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The node data is malformed or cannot be decoded.
    #[error("corrupt node {id}: {reason}")]
    CorruptNode { id: ContentId, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding backend state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tempfile::PersistError> for StoreError {
    fn from(err: tempfile::PersistError) -> Self {
        StoreError::Io(err.error)
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
