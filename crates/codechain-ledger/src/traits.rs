use async_trait::async_trait;
use codechain_types::{AccountId, Branch, Commit, CommitId, ContentId, PullRequest, PullRequestId, Repository};

use crate::error::{LedgerError, LedgerResult};
use crate::records::{Transaction, TxHash, TxOutput, TxReceipt, TxStatus};

/// Client boundary for the version-control ledger.
///
/// Mutations go through `submit` and only take effect once
/// `await_finality` reports them final. Queries never mutate state and need
/// no sender.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Hand a transaction to the ledger for inclusion.
    async fn submit(&self, tx: Transaction) -> LedgerResult<TxHash>;

    /// Block until the transaction is final and return its receipt.
    async fn await_finality(&self, hash: &TxHash) -> LedgerResult<TxReceipt>;

    async fn repository_info(&self, repository: &str) -> LedgerResult<Repository>;

    async fn branch_info(&self, repository: &str, branch: &str) -> LedgerResult<Branch>;

    async fn commit(&self, repository: &str, id: &CommitId) -> LedgerResult<Commit>;

    async fn pull_request_info(
        &self,
        repository: &str,
        id: PullRequestId,
    ) -> LedgerResult<PullRequest>;

    /// Pull requests of the repository still in the `Open` state.
    async fn active_pull_requests(&self, repository: &str) -> LedgerResult<Vec<PullRequest>>;

    /// Content root of the branch head, `None` before the first commit.
    async fn latest_content_id(
        &self,
        repository: &str,
        branch: &str,
    ) -> LedgerResult<Option<ContentId>>;

    async fn balance(&self, account: &AccountId) -> LedgerResult<u64>;

    /// Submit and wait for finality, turning a revert into an error.
    async fn execute(&self, tx: Transaction) -> LedgerResult<TxOutput> {
        let method = tx.call.method();
        let hash = self.submit(tx).await?;
        let receipt = self.await_finality(&hash).await?;
        match receipt.status {
            TxStatus::Succeeded(output) => Ok(output),
            TxStatus::Reverted(reason) => {
                tracing::warn!(%hash, method, %reason, "transaction reverted");
                Err(LedgerError::Reverted { reason })
            }
        }
    }
}
