use codechain_ledger::{LedgerCall, LedgerClient, LedgerResult, RevertReason, Transaction, TxOutput};
use codechain_types::{
    AccountId, Branch, Commit, CommitId, ContentId, PullRequest, PullRequestId, PullRequestState,
    Repository,
};

use crate::error::{SdkError, SdkResult};
use crate::requests::{
    require, BranchRequest, CommitRequest, DescriptionRequest, InitRequest, JoinRequest,
    PullRequestRequest, RepositoryRequest, ReviewRequest,
};
use crate::session::Session;

fn context<T>(operation: &str, result: LedgerResult<T>) -> SdkResult<T> {
    result.map_err(|e| SdkError::ledger(operation, e))
}

/// The version-control protocol: repository, branch, commit, and pull
/// request state transitions expressed as ledger calls.
///
/// Preconditions the ledger would enforce are checked locally first, so
/// doomed calls are never submitted. Every mutation waits for finality
/// before it reports success.
pub struct VersionControl<'s> {
    session: &'s Session,
}

impl<'s> VersionControl<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    fn ledger(&self) -> &dyn LedgerClient {
        self.session.ledger().as_ref()
    }

    /// Submit a call and wait for it to become final. Cancellation is
    /// honoured only before submission.
    async fn submit(&self, call: LedgerCall, value: u64) -> SdkResult<TxOutput> {
        let account = self.session.account()?;
        self.session.check_cancelled()?;
        let operation = format!("{} on {}", call.method(), call.repository());
        let tx = Transaction::new(account, call).with_value(value);
        context(&operation, self.ledger().execute(tx).await)
    }

    async fn member_repository(&self, operation: &str, repository: &str) -> SdkResult<(AccountId, Repository)> {
        let account = self.session.account()?;
        let info = context(operation, self.ledger().repository_info(repository).await)?;
        if !info.is_member(&account) {
            return Err(SdkError::rejected(operation, RevertReason::NotAuthorized));
        }
        Ok((account, info))
    }

    // ---- Repositories ----

    /// Create a repository owned by the session account, then set its
    /// description if the request carries one.
    pub async fn create_repository(&self, request: &InitRequest) -> SdkResult<Repository> {
        request.validate()?;
        self.session.account()?;
        self.submit(
            LedgerCall::CreateRepository {
                name: request.repository.clone(),
            },
            0,
        )
        .await?;

        if let Some(description) = request.description.as_deref().filter(|d| !d.trim().is_empty()) {
            self.submit(
                LedgerCall::SetRepositoryDescription {
                    repository: request.repository.clone(),
                    description: description.to_string(),
                },
                0,
            )
            .await?;
        }

        tracing::info!(repository = %request.repository, "repository created");
        self.repository_info(&request.repository).await
    }

    pub async fn set_description(&self, request: &DescriptionRequest) -> SdkResult<Repository> {
        request.validate()?;
        let operation = format!("setRepoDescription on {}", request.repository);
        let account = self.session.account()?;
        let info = context(&operation, self.ledger().repository_info(&request.repository).await)?;
        if info.owner != account {
            return Err(SdkError::rejected(operation, RevertReason::NotAuthorized));
        }
        self.submit(
            LedgerCall::SetRepositoryDescription {
                repository: request.repository.clone(),
                description: request.description.clone(),
            },
            0,
        )
        .await?;
        self.repository_info(&request.repository).await
    }

    /// Make a repository publicly visible. Owner only.
    pub async fn publish_repository(&self, request: &RepositoryRequest) -> SdkResult<Repository> {
        request.validate()?;
        let operation = format!("publishRepository on {}", request.repository);
        let account = self.session.account()?;
        let info = context(&operation, self.ledger().repository_info(&request.repository).await)?;
        if info.owner != account {
            return Err(SdkError::rejected(operation, RevertReason::NotAuthorized));
        }
        self.submit(
            LedgerCall::PublishRepository {
                repository: request.repository.clone(),
            },
            0,
        )
        .await?;
        tracing::info!(repository = %request.repository, "repository published");
        self.repository_info(&request.repository).await
    }

    /// Pay the collaborator fee to join a repository.
    pub async fn add_collaborator(&self, request: &JoinRequest) -> SdkResult<Repository> {
        request.validate()?;
        let operation = format!("addCollaborator on {}", request.repository);
        let account = self.session.account()?;
        let info = context(&operation, self.ledger().repository_info(&request.repository).await)?;
        if info.is_member(&account) {
            return Err(SdkError::rejected(operation, RevertReason::InvalidStateTransition));
        }
        self.submit(
            LedgerCall::AddCollaborator {
                repository: request.repository.clone(),
            },
            request.payment,
        )
        .await?;
        tracing::info!(repository = %request.repository, account = %account, "joined as collaborator");
        self.repository_info(&request.repository).await
    }

    // ---- Branches and commits ----

    pub async fn create_branch(&self, request: &BranchRequest) -> SdkResult<Branch> {
        request.validate()?;
        let operation = format!("createBranch on {}", request.repository);
        let (_, info) = self.member_repository(&operation, &request.repository).await?;
        if info.has_branch(&request.branch) {
            return Err(SdkError::rejected(operation, RevertReason::BranchExists));
        }
        self.submit(
            LedgerCall::CreateBranch {
                repository: request.repository.clone(),
                branch: request.branch.clone(),
            },
            0,
        )
        .await?;
        tracing::info!(repository = %request.repository, branch = %request.branch, "branch created");
        self.branch_info(&request.repository, &request.branch).await
    }

    /// Record `content_root` as the next commit on the branch.
    ///
    /// The tree behind `content_root` is not checked against the store; the
    /// caller uploads it first. A second commit to the same branch from this
    /// session is refused while the first is still awaiting finality.
    pub async fn commit(&self, request: &CommitRequest) -> SdkResult<Commit> {
        request.validate()?;
        let _pending = self.session.begin_commit(&request.repository, &request.branch)?;
        let operation = format!("commit on {}/{}", request.repository, request.branch);
        let (_, info) = self.member_repository(&operation, &request.repository).await?;
        if !info.has_branch(&request.branch) {
            return Err(SdkError::rejected(operation, RevertReason::BranchNotFound));
        }
        let previous = self.branch_info(&request.repository, &request.branch).await?.head;

        let output = self
            .submit(
                LedgerCall::Commit {
                    repository: request.repository.clone(),
                    branch: request.branch.clone(),
                    message: request.message.clone(),
                    content_root: request.content_root,
                },
                0,
            )
            .await?;
        let id = match output {
            TxOutput::Commit(id) => id,
            other => {
                return Err(SdkError::Internal(format!(
                    "{operation}: expected a commit id, ledger returned {other:?}"
                )))
            }
        };

        let commit = self.commit_info(&request.repository, &id).await?;
        if commit.content_root != request.content_root || commit.branch != request.branch {
            return Err(SdkError::Internal(format!(
                "{operation}: recorded commit {id} does not match the request"
            )));
        }
        if commit.parent != previous {
            tracing::debug!(commit = %id.short_hex(), "branch advanced concurrently before this commit");
        }
        tracing::info!(
            repository = %request.repository,
            branch = %request.branch,
            commit = %id.short_hex(),
            root = %request.content_root.short_hex(),
            "commit recorded"
        );
        Ok(commit)
    }

    // ---- Pull requests ----

    pub async fn create_pull_request(&self, request: &PullRequestRequest) -> SdkResult<PullRequest> {
        request.validate()?;
        let operation = format!("createPullRequest on {}", request.repository);
        let (_, info) = self.member_repository(&operation, &request.repository).await?;
        for branch in [&request.from_branch, &request.to_branch] {
            if !info.has_branch(branch) {
                return Err(SdkError::rejected(&operation, RevertReason::BranchNotFound));
            }
        }
        let output = self
            .submit(
                LedgerCall::CreatePullRequest {
                    repository: request.repository.clone(),
                    from_branch: request.from_branch.clone(),
                    to_branch: request.to_branch.clone(),
                },
                0,
            )
            .await?;
        let id = match output {
            TxOutput::PullRequest(id) => id,
            other => {
                return Err(SdkError::Internal(format!(
                    "{operation}: expected a pull request id, ledger returned {other:?}"
                )))
            }
        };
        tracing::info!(repository = %request.repository, id = %id, "pull request opened");
        self.pull_request_info(&request.repository, id).await
    }

    /// Move an open pull request to `Approved`. Owner only.
    pub async fn approve_pull_request(&self, request: &ReviewRequest) -> SdkResult<PullRequest> {
        self.review(request, PullRequestState::Approved).await
    }

    /// Move an open pull request to `Rejected`. Owner only.
    pub async fn reject_pull_request(&self, request: &ReviewRequest) -> SdkResult<PullRequest> {
        self.review(request, PullRequestState::Rejected).await
    }

    async fn review(&self, request: &ReviewRequest, next: PullRequestState) -> SdkResult<PullRequest> {
        request.validate()?;
        let (call, method) = match next {
            PullRequestState::Rejected => (
                LedgerCall::RejectPullRequest {
                    repository: request.repository.clone(),
                    id: request.id,
                },
                "rejectPullRequest",
            ),
            _ => (
                LedgerCall::ApprovePullRequest {
                    repository: request.repository.clone(),
                    id: request.id,
                },
                "approvePullRequest",
            ),
        };
        let operation = format!("{method} {} on {}", request.id, request.repository);
        let account = self.session.account()?;
        let info = context(&operation, self.ledger().repository_info(&request.repository).await)?;
        if info.owner != account {
            return Err(SdkError::rejected(operation, RevertReason::NotAuthorized));
        }
        let current = self.pull_request_info(&request.repository, request.id).await?;
        if !current.state.can_transition_to(next) {
            return Err(SdkError::rejected(operation, RevertReason::InvalidStateTransition));
        }

        self.submit(call, 0).await?;
        tracing::info!(repository = %request.repository, id = %request.id, state = %next, "pull request reviewed");
        self.pull_request_info(&request.repository, request.id).await
    }

    // ---- Queries ----

    pub async fn repository_info(&self, repository: &str) -> SdkResult<Repository> {
        require("repository", repository)?;
        context(
            &format!("getRepositoryInfo {repository}"),
            self.ledger().repository_info(repository).await,
        )
    }

    pub async fn branch_info(&self, repository: &str, branch: &str) -> SdkResult<Branch> {
        require("repository", repository)?;
        require("branch", branch)?;
        context(
            &format!("getBranchInfo {repository}/{branch}"),
            self.ledger().branch_info(repository, branch).await,
        )
    }

    pub async fn commit_info(&self, repository: &str, id: &CommitId) -> SdkResult<Commit> {
        require("repository", repository)?;
        context(
            &format!("getCommit {} on {repository}", id.short_hex()),
            self.ledger().commit(repository, id).await,
        )
    }

    pub async fn pull_request_info(&self, repository: &str, id: PullRequestId) -> SdkResult<PullRequest> {
        require("repository", repository)?;
        context(
            &format!("getPullRequestInfo {id} on {repository}"),
            self.ledger().pull_request_info(repository, id).await,
        )
    }

    pub async fn active_pull_requests(&self, repository: &str) -> SdkResult<Vec<PullRequest>> {
        require("repository", repository)?;
        context(
            &format!("getActivePullRequests {repository}"),
            self.ledger().active_pull_requests(repository).await,
        )
    }

    /// Content root of the branch head, `None` before the first commit.
    pub async fn latest_content_id(&self, repository: &str, branch: &str) -> SdkResult<Option<ContentId>> {
        require("repository", repository)?;
        require("branch", branch)?;
        context(
            &format!("getLatestContentId {repository}/{branch}"),
            self.ledger().latest_content_id(repository, branch).await,
        )
    }

    /// Balance of `account`, or of the session account when `None`.
    pub async fn balance(&self, account: Option<&AccountId>) -> SdkResult<u64> {
        let account = match account {
            Some(account) => *account,
            None => self.session.account()?,
        };
        context(
            &format!("balance {account}"),
            self.ledger().balance(&account).await,
        )
    }
}
