use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive entry {path:?}: {reason}")]
    InvalidEntry { path: String, reason: String },

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("tar error: {0}")]
    Tar(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tempfile::PersistError> for ArchiveError {
    fn from(err: tempfile::PersistError) -> Self {
        ArchiveError::Io(err.error)
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
