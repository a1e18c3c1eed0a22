use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use codechain_types::{
    AccountId, Branch, Commit, CommitId, ContentId, PullRequest, PullRequestId, PullRequestState,
    Repository,
};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult, RevertReason};
use crate::records::{LedgerCall, Transaction, TxHash, TxOutput, TxReceipt, TxStatus};
use crate::traits::LedgerClient;

/// In-memory devnet ledger for tests, local demos, and the CLI.
///
/// Submitted transactions queue up and are executed in submission order the
/// first time finality is awaited for any of them, so nothing takes effect
/// before a caller observes it final.
pub struct InMemoryLedger {
    config: LedgerConfig,
    inner: RwLock<LedgerState>,
}

#[derive(Default, Serialize, Deserialize)]
struct LedgerState {
    repositories: BTreeMap<String, RepositoryRecord>,
    balances: BTreeMap<AccountId, u64>,
    pending: VecDeque<PendingTx>,
    receipts: HashMap<TxHash, TxReceipt>,
    /// Receipt hashes, oldest first, for retention.
    #[serde(default)]
    receipt_order: VecDeque<TxHash>,
    sequence: u64,
    nonce: u64,
}

#[derive(Serialize, Deserialize)]
struct PendingTx {
    hash: TxHash,
    tx: Transaction,
}

#[derive(Serialize, Deserialize)]
struct RepositoryRecord {
    info: Repository,
    branches: BTreeMap<String, Branch>,
    commits: BTreeMap<CommitId, Commit>,
    pull_requests: BTreeMap<u64, PullRequest>,
    next_pull_request: u64,
}

impl RepositoryRecord {
    fn branch(&self, name: &str) -> Result<&Branch, RevertReason> {
        self.branches.get(name).ok_or(RevertReason::BranchNotFound)
    }

    fn pull_request(&self, id: PullRequestId) -> Result<&PullRequest, RevertReason> {
        self.pull_requests
            .get(&id.0)
            .ok_or(RevertReason::PullRequestNotFound)
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(LedgerState::default()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Number of submitted transactions not yet final.
    pub fn pending_count(&self) -> LedgerResult<usize> {
        Ok(self.read_state()?.pending.len())
    }

    /// Load ledger state from a JSON snapshot, or start empty if the file
    /// does not exist yet.
    pub fn load_snapshot(path: &Path, config: LedgerConfig) -> LedgerResult<Self> {
        if !path.exists() {
            return Ok(Self::with_config(config));
        }
        let reader = BufReader::new(fs::File::open(path)?);
        let state: LedgerState = serde_json::from_reader(reader)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        tracing::debug!(
            path = %path.display(),
            repositories = state.repositories.len(),
            "loaded ledger snapshot"
        );
        Ok(Self {
            config,
            inner: RwLock::new(state),
        })
    }

    /// Write the full ledger state to `path` atomically.
    pub fn save_snapshot(&self, path: &Path) -> LedgerResult<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let state = self.read_state()?;
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &*state)
                .map_err(|e| LedgerError::Serialization(e.to_string()))?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path)?;
        Ok(())
    }

    fn read_state(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write_state(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }

    fn balance_of(&self, state: &LedgerState, account: &AccountId) -> u64 {
        state
            .balances
            .get(account)
            .copied()
            .unwrap_or(self.config.initial_balance)
    }

    /// Execute queued transactions up to and including `target`.
    fn finalize_through(&self, state: &mut LedgerState, target: &TxHash) {
        while let Some(PendingTx { hash, tx }) = state.pending.pop_front() {
            let status = match self.apply(state, &tx) {
                Ok(output) => {
                    tracing::info!(%hash, method = tx.call.method(), repository = tx.call.repository(), "transaction final");
                    TxStatus::Succeeded(output)
                }
                Err(reason) => TxStatus::Reverted(reason),
            };
            state.sequence += 1;
            state.receipts.insert(
                hash,
                TxReceipt {
                    hash,
                    sequence: state.sequence,
                    status,
                },
            );
            state.receipt_order.push_back(hash);
            self.prune_receipts(state);
            if hash == *target {
                break;
            }
        }
    }

    /// Drop the oldest receipts beyond the retention limit. The newest one
    /// always survives.
    fn prune_receipts(&self, state: &mut LedgerState) {
        let keep = self.config.receipt_retention.max(1);
        while state.receipt_order.len() > keep {
            if let Some(old) = state.receipt_order.pop_front() {
                state.receipts.remove(&old);
            }
        }
    }

    /// Apply one call. Every check runs before any state is touched, so a
    /// revert leaves the ledger unchanged.
    fn apply(&self, state: &mut LedgerState, tx: &Transaction) -> Result<TxOutput, RevertReason> {
        let sender = tx.sender;
        match &tx.call {
            LedgerCall::CreateRepository { name } => {
                if state.repositories.contains_key(name) {
                    return Err(RevertReason::NameTaken);
                }
                let info = Repository {
                    name: name.clone(),
                    owner: sender,
                    description: String::new(),
                    collaborators: BTreeSet::new(),
                    public: false,
                    branches: Vec::new(),
                    created_at: Utc::now(),
                };
                state.repositories.insert(
                    name.clone(),
                    RepositoryRecord {
                        info,
                        branches: BTreeMap::new(),
                        commits: BTreeMap::new(),
                        pull_requests: BTreeMap::new(),
                        next_pull_request: 1,
                    },
                );
                Ok(TxOutput::None)
            }

            LedgerCall::SetRepositoryDescription {
                repository,
                description,
            } => {
                let record = owned_repository(state, repository, &sender)?;
                record.info.description = description.clone();
                Ok(TxOutput::None)
            }

            LedgerCall::PublishRepository { repository } => {
                let record = owned_repository(state, repository, &sender)?;
                record.info.public = true;
                Ok(TxOutput::None)
            }

            LedgerCall::CreateBranch { repository, branch } => {
                let record = member_repository(state, repository, &sender)?;
                if record.branches.contains_key(branch) {
                    return Err(RevertReason::BranchExists);
                }
                record.branches.insert(
                    branch.clone(),
                    Branch {
                        repository: repository.clone(),
                        name: branch.clone(),
                        head: None,
                        commit_count: 0,
                    },
                );
                record.info.branches.push(branch.clone());
                Ok(TxOutput::None)
            }

            LedgerCall::Commit {
                repository,
                branch,
                message,
                content_root,
            } => {
                let record = member_repository(state, repository, &sender)?;
                let current = record.branch(branch)?;
                let parent = current.head;
                let id = CommitId::derive(
                    repository,
                    branch,
                    &sender,
                    message,
                    content_root,
                    parent.as_ref(),
                    current.commit_count,
                );
                record.commits.insert(
                    id,
                    Commit {
                        id,
                        repository: repository.clone(),
                        branch: branch.clone(),
                        author: sender,
                        message: message.clone(),
                        content_root: *content_root,
                        timestamp: Utc::now(),
                        parent,
                    },
                );
                if let Some(head) = record.branches.get_mut(branch) {
                    head.head = Some(id);
                    head.commit_count += 1;
                }
                Ok(TxOutput::Commit(id))
            }

            LedgerCall::CreatePullRequest {
                repository,
                from_branch,
                to_branch,
            } => {
                let record = member_repository(state, repository, &sender)?;
                if from_branch == to_branch {
                    return Err(RevertReason::SameBranch);
                }
                record.branch(from_branch)?;
                record.branch(to_branch)?;
                let id = PullRequestId(record.next_pull_request);
                record.next_pull_request += 1;
                record.pull_requests.insert(
                    id.0,
                    PullRequest {
                        id,
                        repository: repository.clone(),
                        from_branch: from_branch.clone(),
                        to_branch: to_branch.clone(),
                        author: sender,
                        state: PullRequestState::Open,
                        approvers: BTreeSet::new(),
                        created_at: Utc::now(),
                    },
                );
                Ok(TxOutput::PullRequest(id))
            }

            LedgerCall::ApprovePullRequest { repository, id } => {
                transition_pull_request(state, repository, *id, &sender, PullRequestState::Approved)
            }

            LedgerCall::RejectPullRequest { repository, id } => {
                transition_pull_request(state, repository, *id, &sender, PullRequestState::Rejected)
            }

            LedgerCall::AddCollaborator { repository } => {
                let sender_balance = self.balance_of(state, &sender);
                let record = state
                    .repositories
                    .get(repository)
                    .ok_or(RevertReason::RepositoryNotFound)?;
                if record.info.is_member(&sender) {
                    return Err(RevertReason::InvalidStateTransition);
                }
                if tx.value < self.config.collaborator_fee {
                    return Err(RevertReason::InsufficientPayment);
                }
                if sender_balance < tx.value {
                    return Err(RevertReason::InsufficientFunds);
                }
                let owner = record.info.owner;
                let owner_balance = self.balance_of(state, &owner);

                state.balances.insert(sender, sender_balance - tx.value);
                state
                    .balances
                    .insert(owner, owner_balance.saturating_add(tx.value));
                if let Some(record) = state.repositories.get_mut(repository) {
                    record.info.collaborators.insert(sender);
                }
                Ok(TxOutput::None)
            }
        }
    }

    fn repository_record<'a>(
        state: &'a LedgerState,
        repository: &str,
    ) -> LedgerResult<&'a RepositoryRecord> {
        state
            .repositories
            .get(repository)
            .ok_or(LedgerError::Reverted {
                reason: RevertReason::RepositoryNotFound,
            })
    }
}

fn owned_repository<'a>(
    state: &'a mut LedgerState,
    repository: &str,
    sender: &AccountId,
) -> Result<&'a mut RepositoryRecord, RevertReason> {
    let record = state
        .repositories
        .get_mut(repository)
        .ok_or(RevertReason::RepositoryNotFound)?;
    if record.info.owner != *sender {
        return Err(RevertReason::NotAuthorized);
    }
    Ok(record)
}

fn member_repository<'a>(
    state: &'a mut LedgerState,
    repository: &str,
    sender: &AccountId,
) -> Result<&'a mut RepositoryRecord, RevertReason> {
    let record = state
        .repositories
        .get_mut(repository)
        .ok_or(RevertReason::RepositoryNotFound)?;
    if !record.info.is_member(sender) {
        return Err(RevertReason::NotAuthorized);
    }
    Ok(record)
}

fn transition_pull_request(
    state: &mut LedgerState,
    repository: &str,
    id: PullRequestId,
    sender: &AccountId,
    next: PullRequestState,
) -> Result<TxOutput, RevertReason> {
    let record = owned_repository(state, repository, sender)?;
    let current = record.pull_request(id)?.state;
    if !current.can_transition_to(next) {
        return Err(RevertReason::InvalidStateTransition);
    }
    if let Some(pr) = record.pull_requests.get_mut(&id.0) {
        pr.state = next;
        if next == PullRequestState::Approved {
            pr.approvers.insert(*sender);
        }
    }
    Ok(TxOutput::None)
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("config", &self.config)
            .field("pending", &self.pending_count().unwrap_or_default())
            .finish()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit(&self, tx: Transaction) -> LedgerResult<TxHash> {
        let mut state = self.write_state()?;
        state.nonce += 1;
        let hash = TxHash::compute(&tx, state.nonce)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        tracing::debug!(%hash, method = tx.call.method(), sender = %tx.sender, "transaction submitted");
        state.pending.push_back(PendingTx { hash, tx });
        Ok(hash)
    }

    async fn await_finality(&self, hash: &TxHash) -> LedgerResult<TxReceipt> {
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        if let Some(receipt) = state.receipts.get(hash) {
            return Ok(receipt.clone());
        }
        if !state.pending.iter().any(|p| p.hash == *hash) {
            return Err(LedgerError::UnknownTransaction(*hash));
        }
        self.finalize_through(state, hash);
        state
            .receipts
            .get(hash)
            .cloned()
            .ok_or(LedgerError::UnknownTransaction(*hash))
    }

    async fn repository_info(&self, repository: &str) -> LedgerResult<Repository> {
        let state = self.read_state()?;
        Ok(Self::repository_record(&state, repository)?.info.clone())
    }

    async fn branch_info(&self, repository: &str, branch: &str) -> LedgerResult<Branch> {
        let state = self.read_state()?;
        let record = Self::repository_record(&state, repository)?;
        Ok(record.branch(branch)?.clone())
    }

    async fn commit(&self, repository: &str, id: &CommitId) -> LedgerResult<Commit> {
        let state = self.read_state()?;
        let record = Self::repository_record(&state, repository)?;
        record
            .commits
            .get(id)
            .cloned()
            .ok_or(LedgerError::Reverted {
                reason: RevertReason::CommitNotFound,
            })
    }

    async fn pull_request_info(
        &self,
        repository: &str,
        id: PullRequestId,
    ) -> LedgerResult<PullRequest> {
        let state = self.read_state()?;
        let record = Self::repository_record(&state, repository)?;
        Ok(record.pull_request(id)?.clone())
    }

    async fn active_pull_requests(&self, repository: &str) -> LedgerResult<Vec<PullRequest>> {
        let state = self.read_state()?;
        let record = Self::repository_record(&state, repository)?;
        Ok(record
            .pull_requests
            .values()
            .filter(|pr| pr.is_open())
            .cloned()
            .collect())
    }

    async fn latest_content_id(
        &self,
        repository: &str,
        branch: &str,
    ) -> LedgerResult<Option<ContentId>> {
        let state = self.read_state()?;
        let record = Self::repository_record(&state, repository)?;
        let head = match record.branch(branch)?.head {
            Some(head) => head,
            None => return Ok(None),
        };
        let commit = record.commits.get(&head).ok_or(LedgerError::Reverted {
            reason: RevertReason::CommitNotFound,
        })?;
        Ok(Some(commit.content_root))
    }

    async fn balance(&self, account: &AccountId) -> LedgerResult<u64> {
        let state = self.read_state()?;
        Ok(self.balance_of(&state, account))
    }
}
