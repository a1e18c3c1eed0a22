//! Transaction and receipt records exchanged with the ledger.

use std::fmt;

use serde::{Deserialize, Serialize};
use codechain_types::{AccountId, CommitId, ContentId, PullRequestId, TypeError};

use crate::error::RevertReason;

/// A version-control mutation understood by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum LedgerCall {
    CreateRepository {
        name: String,
    },
    SetRepositoryDescription {
        repository: String,
        description: String,
    },
    PublishRepository {
        repository: String,
    },
    CreateBranch {
        repository: String,
        branch: String,
    },
    Commit {
        repository: String,
        branch: String,
        message: String,
        content_root: ContentId,
    },
    CreatePullRequest {
        repository: String,
        from_branch: String,
        to_branch: String,
    },
    ApprovePullRequest {
        repository: String,
        id: PullRequestId,
    },
    RejectPullRequest {
        repository: String,
        id: PullRequestId,
    },
    /// Join as a collaborator; the payment travels in [`Transaction::value`].
    AddCollaborator {
        repository: String,
    },
}

impl LedgerCall {
    /// Contract method name, used in logs and error context.
    pub fn method(&self) -> &'static str {
        match self {
            Self::CreateRepository { .. } => "createRepository",
            Self::SetRepositoryDescription { .. } => "setRepoDescription",
            Self::PublishRepository { .. } => "publishRepository",
            Self::CreateBranch { .. } => "createBranch",
            Self::Commit { .. } => "commit",
            Self::CreatePullRequest { .. } => "createPullRequest",
            Self::ApprovePullRequest { .. } => "approvePullRequest",
            Self::RejectPullRequest { .. } => "rejectPullRequest",
            Self::AddCollaborator { .. } => "addCollaborator",
        }
    }

    /// Repository the call targets.
    pub fn repository(&self) -> &str {
        match self {
            Self::CreateRepository { name } => name,
            Self::SetRepositoryDescription { repository, .. }
            | Self::PublishRepository { repository }
            | Self::CreateBranch { repository, .. }
            | Self::Commit { repository, .. }
            | Self::CreatePullRequest { repository, .. }
            | Self::ApprovePullRequest { repository, .. }
            | Self::RejectPullRequest { repository, .. }
            | Self::AddCollaborator { repository } => repository,
        }
    }
}

/// A signed call: who sends it, what it does, and the attached payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: AccountId,
    pub call: LedgerCall,
    pub value: u64,
}

impl Transaction {
    pub fn new(sender: AccountId, call: LedgerCall) -> Self {
        Self {
            sender,
            call,
            value: 0,
        }
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }
}

/// Handle returned by submission, used to await finality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Hash of a transaction together with its submission nonce.
    pub fn compute(tx: &Transaction, nonce: u64) -> Result<Self, serde_json::Error> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"codechain-tx-v1:");
        hasher.update(&nonce.to_le_bytes());
        hasher.update(&serde_json::to_vec(tx)?);
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", &self.to_hex()[..10])
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for TxHash {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(&s))
            .map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| TypeError::InvalidLength {
            expected: 32,
            actual: b.len(),
        })?;
        Ok(Self(arr))
    }
}

/// Value produced by a successful call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TxOutput {
    None,
    Commit(CommitId),
    PullRequest(PullRequestId),
}

/// Final outcome of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Succeeded(TxOutput),
    Reverted(RevertReason),
}

/// Receipt of a finalized transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: TxHash,
    /// Position in the ledger's total order of finalized transactions.
    pub sequence: u64,
    pub status: TxStatus,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TxStatus::Succeeded(_))
    }

    /// The output on success, the revert reason otherwise.
    pub fn into_result(self) -> Result<TxOutput, RevertReason> {
        match self.status {
            TxStatus::Succeeded(output) => Ok(output),
            TxStatus::Reverted(reason) => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> Transaction {
        Transaction::new(
            AccountId::derive("alice"),
            LedgerCall::CreateBranch {
                repository: "demo".into(),
                branch: "main".into(),
            },
        )
    }

    #[test]
    fn tx_hash_depends_on_nonce() {
        let a = TxHash::compute(&tx(), 1).unwrap();
        let b = TxHash::compute(&tx(), 2).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, TxHash::compute(&tx(), 1).unwrap());
    }

    #[test]
    fn tx_hash_serializes_as_hex_string() {
        let hash = TxHash::compute(&tx(), 7).unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert!(json.starts_with("\"0x"));
        let parsed: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn call_metadata() {
        let call = tx().call;
        assert_eq!(call.method(), "createBranch");
        assert_eq!(call.repository(), "demo");
        let create = LedgerCall::CreateRepository { name: "x".into() };
        assert_eq!(create.repository(), "x");
    }

    #[test]
    fn receipt_into_result() {
        let hash = TxHash::compute(&tx(), 0).unwrap();
        let ok = TxReceipt {
            hash,
            sequence: 1,
            status: TxStatus::Succeeded(TxOutput::None),
        };
        assert!(ok.is_success());
        assert_eq!(ok.into_result(), Ok(TxOutput::None));

        let reverted = TxReceipt {
            hash,
            sequence: 2,
            status: TxStatus::Reverted(RevertReason::BranchExists),
        };
        assert_eq!(reverted.into_result(), Err(RevertReason::BranchExists));
    }
}
