use serde::{Deserialize, Serialize};

/// Parameters of the local devnet ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Minimum payment attached to `AddCollaborator`.
    pub collaborator_fee: u64,
    /// Balance credited to an account the first time it is seen.
    pub initial_balance: u64,
    /// Most recent receipts kept for `await_finality`; older ones are dropped.
    pub receipt_retention: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            collaborator_fee: 1_000,
            initial_balance: 1_000_000,
            receipt_retention: 1_024,
        }
    }
}
