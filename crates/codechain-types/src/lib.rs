//! Foundation types for CodeChain.
//!
//! CodeChain keeps file content in a content-addressed object store and the
//! small amount of version-control metadata (repositories, branch heads,
//! commits, pull requests) on an append-only ledger. This crate holds the
//! vocabulary shared by both sides.
//!
//! # Key Types
//!
//! - [`ContentId`]: Content-addressed identifier (BLAKE3 hash)
//! - [`AccountId`]: Ledger account address of a participant
//! - [`CommitId`] / [`PullRequestId`]: Ledger-assigned entity identifiers
//! - [`Repository`], [`Branch`], [`Commit`], [`PullRequest`]: Ledger entities
//! - [`PullRequestState`]: Monotonic pull request state machine

#[macro_use]
mod codec;

pub mod entity;
pub mod error;
pub mod identity;
pub mod names;
pub mod object;

pub use entity::{Branch, Commit, CommitId, PullRequest, PullRequestId, PullRequestState, Repository};
pub use error::TypeError;
pub use identity::AccountId;
pub use names::{validate_branch_name, validate_repository_name};
pub use object::ContentId;
