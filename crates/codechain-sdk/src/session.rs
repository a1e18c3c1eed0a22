use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use codechain_ledger::LedgerClient;
use codechain_store::ContentStore;
use codechain_types::AccountId;
use tokio_util::sync::CancellationToken;

use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use crate::protocol::VersionControl;
use crate::workflow::Workflows;

/// Per-invocation context passed to every operation.
///
/// Holds the acting account, the store and ledger clients, configuration,
/// and a cancellation token. It also tracks commits awaiting finality so
/// one session never races itself on a branch head.
pub struct Session {
    account: Option<AccountId>,
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn LedgerClient>,
    config: SdkConfig,
    cancel: CancellationToken,
    pending_commits: Mutex<HashSet<(String, String)>>,
}

impl Session {
    /// Anonymous session: queries only until an account is set.
    pub fn new(store: Arc<dyn ContentStore>, ledger: Arc<dyn LedgerClient>, config: SdkConfig) -> Self {
        Self {
            account: None,
            store,
            ledger,
            config,
            cancel: CancellationToken::new(),
            pending_commits: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_account(mut self, account: AccountId) -> Self {
        self.account = Some(account);
        self
    }

    /// The acting account. Mutations fail without one.
    pub fn account(&self) -> SdkResult<AccountId> {
        self.account
            .ok_or_else(|| SdkError::Authentication("no account selected for this session".into()))
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Token that cancels this session's operations at their next boundary.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn version_control(&self) -> VersionControl<'_> {
        VersionControl::new(self)
    }

    pub fn workflows(&self) -> Workflows<'_> {
        Workflows::new(self)
    }

    pub(crate) fn check_cancelled(&self) -> SdkResult<()> {
        if self.cancel.is_cancelled() {
            tracing::warn!("operation cancelled");
            return Err(SdkError::Cancelled);
        }
        Ok(())
    }

    /// Mark a commit on `repository`/`branch` as in flight. Fails if one is
    /// already pending; the mark clears when the guard drops.
    pub(crate) fn begin_commit(&self, repository: &str, branch: &str) -> SdkResult<PendingCommit<'_>> {
        let key = (repository.to_string(), branch.to_string());
        let mut pending = self
            .pending_commits
            .lock()
            .map_err(|_| SdkError::Internal("pending commit set poisoned".into()))?;
        if !pending.insert(key.clone()) {
            return Err(SdkError::InvalidInput {
                field: "branch",
                reason: format!("a commit to {repository}/{branch} is still awaiting finality"),
            });
        }
        Ok(PendingCommit { session: self, key })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

pub(crate) struct PendingCommit<'s> {
    session: &'s Session,
    key: (String, String),
}

impl Drop for PendingCommit<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.session.pending_commits.lock() {
            pending.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use codechain_ledger::InMemoryLedger;
    use codechain_store::InMemoryContentStore;

    use super::*;
    use crate::error::ErrorKind;

    fn session() -> Session {
        Session::new(
            Arc::new(InMemoryContentStore::new()),
            Arc::new(InMemoryLedger::new()),
            SdkConfig::default(),
        )
    }

    #[test]
    fn anonymous_session_has_no_account() {
        let err = session().account().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        let alice = AccountId::derive("alice");
        assert_eq!(session().with_account(alice).account().unwrap(), alice);
    }

    #[test]
    fn pending_commit_blocks_same_branch_only() {
        let session = session();
        let guard = session.begin_commit("demo", "main").unwrap();
        assert!(session.begin_commit("demo", "main").is_err());
        let other = session.begin_commit("demo", "dev").unwrap();
        drop(guard);
        drop(other);
        assert!(session.begin_commit("demo", "main").is_ok());
    }

    #[test]
    fn cancel_is_observed() {
        let session = session();
        assert!(session.check_cancelled().is_ok());
        session.cancel();
        assert!(matches!(session.check_cancelled(), Err(SdkError::Cancelled)));
    }
}
