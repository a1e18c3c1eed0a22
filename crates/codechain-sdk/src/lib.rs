//! High-level SDK for CodeChain.
//!
//! Binds human-meaningful version-control operations to content ids recorded
//! on the ledger. Everything runs against an explicit [`Session`], which
//! carries the acting account, the store and ledger clients, configuration,
//! and a cancellation token.
//!
//! - [`VersionControl`]: repositories, branches, commits, pull requests,
//!   collaborators, and read-only queries
//! - [`Workflows`]: upload, commit-a-directory, and clone-to-archive
//!
//! Every operation takes a request object that is validated before any
//! store or ledger call is made.

pub mod config;
pub mod error;
pub mod protocol;
pub mod requests;
pub mod session;
pub mod workflow;

pub use config::SdkConfig;
pub use error::{ErrorKind, SdkError, SdkResult};
pub use protocol::VersionControl;
pub use requests::{
    parse_pull_request_id, BranchRequest, CloneRequest, CommitDirectoryRequest, CommitRequest,
    DescriptionRequest, InitRequest, JoinRequest, PullRequestRequest, RepositoryRequest,
    ReviewRequest, UploadRequest,
};
pub use session::Session;
pub use workflow::{CloneOutcome, CommitOutcome, Workflows};

// Re-export key types
pub use codechain_archive::{ArchiveFormat, ArchiveInfo, ArchiveOptions};
pub use codechain_ledger::{InMemoryLedger, LedgerClient, LedgerConfig, RevertReason};
pub use codechain_store::{ContentStore, InMemoryContentStore};
pub use codechain_sync::{SyncConfig, UploadReport};
pub use codechain_types::{
    AccountId, Branch, Commit, CommitId, ContentId, PullRequest, PullRequestId,
    PullRequestState, Repository,
};
