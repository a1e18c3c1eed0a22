use serde::{Deserialize, Serialize};

use crate::records::TxHash;

/// Why the ledger refused a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum RevertReason {
    #[error("name already exists")]
    NameTaken,

    #[error("repository not found")]
    RepositoryNotFound,

    #[error("branch not found")]
    BranchNotFound,

    #[error("branch already exists")]
    BranchExists,

    #[error("commit not found")]
    CommitNotFound,

    #[error("pull request not found")]
    PullRequestNotFound,

    #[error("not authorized")]
    NotAuthorized,

    #[error("insufficient payment")]
    InsufficientPayment,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("invalid state transition")]
    InvalidStateTransition,

    #[error("source and target branch are the same")]
    SameBranch,
}

/// Errors produced by ledger client operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The ledger executed the call and rejected it. View calls revert the
    /// same way when the entity they ask for does not exist.
    #[error("reverted: {reason}")]
    Reverted { reason: RevertReason },

    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// The revert reason, if the ledger rejected the call.
    pub fn revert_reason(&self) -> Option<RevertReason> {
        match self {
            Self::Reverted { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl From<RevertReason> for LedgerError {
    fn from(reason: RevertReason) -> Self {
        Self::Reverted { reason }
    }
}

impl From<tempfile::PersistError> for LedgerError {
    fn from(err: tempfile::PersistError) -> Self {
        Self::Io(err.error)
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
