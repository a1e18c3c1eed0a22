//! Ledger entities: repositories, branches, commits, and pull requests.
//!
//! These are read models. The ledger owns them; CodeChain only ever receives
//! copies through queries and never mutates them locally.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::AccountId;
use crate::object::ContentId;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a recorded commit.
///
/// Derived by the ledger from the commit's fields, so two commits never share
/// an id even when they carry the same content root.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId([u8; 32]);

impl_hex_serde!(CommitId, 32);

impl CommitId {
    /// Derive the id of a commit from everything that distinguishes it.
    pub fn derive(
        repository: &str,
        branch: &str,
        author: &AccountId,
        message: &str,
        content_root: &ContentId,
        parent: Option<&CommitId>,
        sequence: u64,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"codechain-commit-v1:");
        for field in [repository.as_bytes(), branch.as_bytes(), message.as_bytes()] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        hasher.update(author.as_bytes());
        hasher.update(content_root.as_bytes());
        match parent {
            Some(parent) => {
                hasher.update(&[1]);
                hasher.update(parent.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(&sequence.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitId({})", self.short_hex())
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for CommitId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

/// Per-repository pull request number, assigned by the ledger starting at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PullRequestId(pub u64);

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::str::FromStr for PullRequestId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        s.strip_prefix('#').unwrap_or(s).parse().map(Self)
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// A named repository recorded on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Unique key across the ledger.
    pub name: String,
    pub owner: AccountId,
    pub description: String,
    /// Accounts that joined by paying the collaborator fee.
    pub collaborators: BTreeSet<AccountId>,
    /// Visibility flag; set once the owner publishes the repository.
    pub public: bool,
    /// Branch names in creation order.
    pub branches: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Repository {
    /// Whether the account may write to this repository (owner or collaborator).
    pub fn is_member(&self, account: &AccountId) -> bool {
        self.owner == *account || self.collaborators.contains(account)
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// A branch and its head commit. `head` is `None` until the first commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub repository: String,
    pub name: String,
    pub head: Option<CommitId>,
    pub commit_count: u64,
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// An immutable commit binding a message to a content tree snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub repository: String,
    pub branch: String,
    pub author: AccountId,
    pub message: String,
    /// Root content id of the full tree snapshot.
    pub content_root: ContentId,
    pub timestamp: DateTime<Utc>,
    pub parent: Option<CommitId>,
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

/// Pull request lifecycle.
///
/// `Open` is the only non-terminal state; nothing ever returns to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PullRequestState {
    Open,
    Approved,
    Rejected,
}

impl PullRequestState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: PullRequestState) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Approved) | (Self::Open, Self::Rejected)
        )
    }
}

impl fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A request to bring `from_branch` into `to_branch` of the same repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: PullRequestId,
    pub repository: String,
    pub from_branch: String,
    pub to_branch: String,
    pub author: AccountId,
    pub state: PullRequestState,
    pub approvers: BTreeSet<AccountId>,
    pub created_at: DateTime<Utc>,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.state == PullRequestState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_id(message: &str, parent: Option<&CommitId>, seq: u64) -> CommitId {
        CommitId::derive(
            "demo",
            "main",
            &AccountId::derive("alice"),
            message,
            &ContentId::from_bytes(b"root"),
            parent,
            seq,
        )
    }

    #[test]
    fn commit_id_is_deterministic() {
        assert_eq!(commit_id("first", None, 0), commit_id("first", None, 0));
    }

    #[test]
    fn commit_id_depends_on_parent_and_sequence() {
        let first = commit_id("same", None, 0);
        let second = commit_id("same", Some(&first), 1);
        assert_ne!(first, second);
        assert_ne!(commit_id("same", None, 0), commit_id("same", None, 1));
    }

    #[test]
    fn commit_id_fields_are_length_prefixed() {
        let a = CommitId::derive(
            "ab",
            "c",
            &AccountId::derive("x"),
            "m",
            &ContentId::null(),
            None,
            0,
        );
        let b = CommitId::derive(
            "a",
            "bc",
            &AccountId::derive("x"),
            "m",
            &ContentId::null(),
            None,
            0,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn commit_id_hex_parse() {
        let id = commit_id("x", None, 0);
        assert_eq!(id.to_hex().parse::<CommitId>().unwrap(), id);
    }

    #[test]
    fn pull_request_id_parse() {
        assert_eq!("#7".parse::<PullRequestId>().unwrap(), PullRequestId(7));
        assert_eq!("12".parse::<PullRequestId>().unwrap(), PullRequestId(12));
        assert!("abc".parse::<PullRequestId>().is_err());
        assert_eq!(PullRequestId(3).to_string(), "#3");
    }

    #[test]
    fn pull_request_transitions_are_monotonic() {
        use PullRequestState::*;
        assert!(Open.can_transition_to(Approved));
        assert!(Open.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Open));
        assert!(!Approved.can_transition_to(Approved));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Open.can_transition_to(Open));
        assert!(Approved.is_terminal());
        assert!(!Open.is_terminal());
    }

    #[test]
    fn repository_membership() {
        let owner = AccountId::derive("owner");
        let collaborator = AccountId::derive("collaborator");
        let stranger = AccountId::derive("stranger");
        let repo = Repository {
            name: "demo".into(),
            owner,
            description: String::new(),
            collaborators: [collaborator].into_iter().collect(),
            public: false,
            branches: vec!["main".into()],
            created_at: Utc::now(),
        };
        assert!(repo.is_member(&owner));
        assert!(repo.is_member(&collaborator));
        assert!(!repo.is_member(&stranger));
        assert!(repo.has_branch("main"));
        assert!(!repo.has_branch("dev"));
    }
}
