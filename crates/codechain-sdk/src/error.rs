use std::path::PathBuf;

use codechain_archive::ArchiveError;
use codechain_ledger::{LedgerError, RevertReason};
use codechain_store::StoreError;
use codechain_sync::SyncError;
use thiserror::Error;

/// Error category, for callers that report or branch on the kind of failure
/// rather than its details.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    MissingInput,
    ContentStore,
    LedgerCall,
    LocalIo,
    Cancelled,
    Internal,
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("authentication required: {0}")]
    Authentication(String),

    #[error("missing required input: {field}")]
    MissingInput { field: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("content store {operation} failed: {source}")]
    ContentStore {
        operation: String,
        #[source]
        source: StoreError,
    },

    #[error("{operation} failed: {source}")]
    LedgerCall {
        operation: String,
        #[source]
        source: LedgerError,
    },

    #[error("local I/O error at {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive {} failed: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::MissingInput { .. } | Self::InvalidInput { .. } => ErrorKind::MissingInput,
            Self::ContentStore { .. } => ErrorKind::ContentStore,
            Self::LedgerCall { .. } => ErrorKind::LedgerCall,
            Self::LocalIo { .. } | Self::Archive { .. } => ErrorKind::LocalIo,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The ledger's revert reason, for rejected ledger calls.
    pub fn revert_reason(&self) -> Option<RevertReason> {
        match self {
            Self::LedgerCall { source, .. } => source.revert_reason(),
            _ => None,
        }
    }

    pub(crate) fn ledger(operation: impl Into<String>, source: LedgerError) -> Self {
        Self::LedgerCall {
            operation: operation.into(),
            source,
        }
    }

    /// A call refused locally for the same reason the ledger would revert it.
    pub(crate) fn rejected(operation: impl Into<String>, reason: RevertReason) -> Self {
        Self::ledger(operation, LedgerError::Reverted { reason })
    }
}

impl From<SyncError> for SdkError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Store {
                operation,
                target,
                source,
            } => Self::ContentStore {
                operation: format!("{operation} {target}"),
                source,
            },
            SyncError::LocalIo { path, source } => Self::LocalIo { path, source },
            SyncError::NotADirectory(path) => Self::InvalidInput {
                field: "path",
                reason: format!("{} is not a directory", path.display()),
            },
            SyncError::NonUtf8Path(path) => Self::InvalidInput {
                field: "path",
                reason: format!("{} is not valid UTF-8", path.display()),
            },
            SyncError::Cancelled => Self::Cancelled,
            SyncError::Task(msg) => Self::Internal(msg),
            err @ SyncError::StagingExhausted(_) => Self::Internal(err.to_string()),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            SdkError::InvalidInput {
                field: "branch",
                reason: "bad".into()
            }
            .kind(),
            ErrorKind::MissingInput
        );
        let reverted = SdkError::rejected("commit", RevertReason::BranchNotFound);
        assert_eq!(reverted.kind(), ErrorKind::LedgerCall);
        assert_eq!(reverted.revert_reason(), Some(RevertReason::BranchNotFound));
        assert_eq!(SdkError::Cancelled.revert_reason(), None);
    }

    #[test]
    fn sync_errors_map_to_categories() {
        let store: SdkError = SyncError::Store {
            operation: "write",
            target: "/abc/f".into(),
            source: StoreError::PathNotFound("/abc".into()),
        }
        .into();
        assert_eq!(store.kind(), ErrorKind::ContentStore);
        assert!(store.to_string().contains("write /abc/f"));

        let cancelled: SdkError = SyncError::Cancelled.into();
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);

        let not_dir: SdkError = SyncError::NotADirectory(PathBuf::from("x")).into();
        assert_eq!(not_dir.kind(), ErrorKind::MissingInput);
    }
}
