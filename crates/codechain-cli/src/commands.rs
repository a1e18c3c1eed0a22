use anyhow::Context;
use codechain_sdk::{
    parse_pull_request_id, AccountId, BranchRequest, CloneRequest, CommitDirectoryRequest,
    CommitId, DescriptionRequest, InitRequest, JoinRequest, PullRequestRequest, RepositoryRequest,
    ReviewRequest, Session, UploadRequest,
};

use crate::cli::*;
use crate::config::CliConfig;
use crate::devnet::Devnet;
use crate::output::Output;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref(), cli.data_dir.as_deref())?
        .with_overrides(cli.data_dir, cli.account);
    let devnet = Devnet::open(&config)?;
    let session = devnet.session(&config);

    let token = session.cancellation_token().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            token.cancel();
        }
    });

    let mutating = cli.command.is_mutating();
    let result = execute(&session, &config, &Output::new(cli.format), cli.command).await;
    interrupt.abort();

    // A failed command keeps its own error; the save failure is only logged.
    if mutating {
        if let Err(err) = devnet.save() {
            if result.is_ok() {
                return Err(err);
            }
            tracing::error!(error = %format!("{err:#}"), "devnet state not saved");
        }
    }
    result
}

async fn execute(session: &Session, config: &CliConfig, out: &Output, command: Command) -> anyhow::Result<()> {
    let vc = session.version_control();
    match command {
        Command::Init(args) => {
            let mut request = InitRequest::new(args.repository);
            if let Some(description) = args.description {
                request = request.with_description(description);
            }
            let repo = vc.create_repository(&request).await?;
            out.repository(&repo)
        }
        Command::Upload(args) => {
            let report = session.workflows().upload(&UploadRequest::new(args.path)).await?;
            out.upload(&report)
        }
        Command::Commit(args) => {
            let request = CommitDirectoryRequest::new(args.repository, args.branch, args.message, args.path);
            let outcome = session.workflows().commit_directory(&request).await?;
            out.commit_outcome(&outcome)
        }
        Command::Publish(args) => {
            let repo = vc.publish_repository(&RepositoryRequest::new(args.repository)).await?;
            out.done("published", &repo.name)
        }
        Command::Join(args) => {
            let payment = args.payment.unwrap_or(config.ledger.collaborator_fee);
            let repo = vc.add_collaborator(&JoinRequest::new(args.repository, payment)).await?;
            out.done("joined", &repo.name)
        }
        Command::Hash(args) => {
            let root = vc.latest_content_id(&args.repository, &args.branch).await?;
            out.content_id(&args.repository, &args.branch, root.map(|id| id.to_hex()))
        }
        Command::Branch(args) => {
            let branch = vc.create_branch(&BranchRequest::new(args.repository, args.branch)).await?;
            out.branch(&branch)
        }
        Command::PullRequest(args) => {
            let request = PullRequestRequest::new(args.repository, args.from_branch, args.to_branch);
            let pr = vc.create_pull_request(&request).await?;
            out.pull_request(&pr)
        }
        Command::Approve(args) => {
            let id = parse_pull_request_id(&args.id)?;
            let pr = vc.approve_pull_request(&ReviewRequest::new(args.repository, id)).await?;
            out.pull_request(&pr)
        }
        Command::Reject(args) => {
            let id = parse_pull_request_id(&args.id)?;
            let pr = vc.reject_pull_request(&ReviewRequest::new(args.repository, id)).await?;
            out.pull_request(&pr)
        }
        Command::Clone(args) => {
            let request = CloneRequest::new(args.repository, args.branch).with_output_dir(args.output);
            let outcome = session.workflows().clone(&request).await?;
            out.clone_outcome(&outcome)
        }
        Command::Balance(args) => {
            let (name, account) = match args.name {
                Some(name) => {
                    let account = AccountId::derive(&name);
                    (name, account)
                }
                None => {
                    let account = session.account()?;
                    (config.account.clone().unwrap_or_else(|| account.to_hex()), account)
                }
            };
            let balance = vc.balance(Some(&account)).await?;
            out.balance(&name, balance)
        }
        Command::RepoDescr(args) => {
            let repo = vc
                .set_description(&DescriptionRequest::new(args.repository, args.description))
                .await?;
            out.done("described", &repo.name)
        }
        Command::GetCommit(args) => {
            let id = CommitId::from_hex(args.commit.trim())
                .with_context(|| format!("invalid commit id {:?}", args.commit))?;
            let commit = vc.commit_info(&args.repository, &id).await?;
            out.commit(&commit)
        }
        Command::GetBranch(args) => {
            let branch = vc.branch_info(&args.repository, &args.branch).await?;
            out.branch(&branch)
        }
        Command::GetRepo(args) => {
            let repo = vc.repository_info(&args.repository).await?;
            out.repository(&repo)
        }
        Command::GetPullRequest(args) => {
            let id = parse_pull_request_id(&args.id)?;
            let pr = vc.pull_request_info(&args.repository, id).await?;
            out.pull_request(&pr)
        }
        Command::GetActivePullRequests(args) => {
            let prs = vc.active_pull_requests(&args.repository).await?;
            out.pull_requests(&prs)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;
    use codechain_sdk::{PullRequestId, PullRequestState};

    use super::*;

    async fn run(data_dir: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["codechain", "--data-dir", data_dir.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap()).await
    }

    fn reopen(data_dir: &Path, account: &str) -> (Devnet, CliConfig) {
        let config = CliConfig::default().with_overrides(Some(data_dir.to_path_buf()), Some(account.into()));
        (Devnet::open(&config).unwrap(), config)
    }

    #[tokio::test]
    async fn init_commit_clone_across_invocations() {
        let data = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(work.path().join("src")).unwrap();
        std::fs::write(work.path().join("src/main.rs"), b"fn main() {}").unwrap();

        run(data.path(), &["--account", "alice", "init", "demo", "-d", "demo repo"]).await.unwrap();
        run(data.path(), &["--account", "alice", "branch", "demo", "main"]).await.unwrap();
        let src = work.path().join("src");
        run(data.path(), &["--account", "alice", "commit", "demo", "main", "-m", "first", src.to_str().unwrap()])
            .await
            .unwrap();
        let out = work.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        run(data.path(), &["clone", "demo", "main", "-o", out.to_str().unwrap()]).await.unwrap();
        assert!(out.join("demo.zip").exists());

        let (devnet, config) = reopen(data.path(), "alice");
        let session = devnet.session(&config);
        let repo = session.version_control().repository_info("demo").await.unwrap();
        assert_eq!(repo.description, "demo repo");
        let branch = session.version_control().branch_info("demo", "main").await.unwrap();
        assert_eq!(branch.commit_count, 1);
    }

    #[tokio::test]
    async fn mutation_without_account_fails() {
        let data = tempfile::tempdir().unwrap();
        let err = run(data.path(), &["init", "demo"]).await.unwrap_err();
        assert!(err.to_string().contains("authentication"));
    }

    #[tokio::test]
    async fn join_and_review_flow() {
        let data = tempfile::tempdir().unwrap();
        run(data.path(), &["--account", "owner", "init", "demo"]).await.unwrap();
        run(data.path(), &["--account", "owner", "branch", "demo", "main"]).await.unwrap();
        run(data.path(), &["--account", "dev", "join", "demo"]).await.unwrap();
        run(data.path(), &["--account", "dev", "branch", "demo", "feature"]).await.unwrap();
        run(data.path(), &["--account", "dev", "pull-request", "demo", "feature", "main"]).await.unwrap();

        assert!(run(data.path(), &["--account", "dev", "approve", "demo", "#1"]).await.is_err());
        run(data.path(), &["--account", "owner", "approve", "demo", "#1"]).await.unwrap();
        assert!(run(data.path(), &["--account", "owner", "reject", "demo", "1"]).await.is_err());

        let (devnet, config) = reopen(data.path(), "owner");
        let session = devnet.session(&config);
        let pr = session
            .version_control()
            .pull_request_info("demo", PullRequestId(1))
            .await
            .unwrap();
        assert_eq!(pr.state, PullRequestState::Approved);
        let owner_balance = session
            .version_control()
            .balance(Some(&AccountId::derive("owner")))
            .await
            .unwrap();
        assert_eq!(owner_balance, config.ledger.initial_balance + config.ledger.collaborator_fee);
    }

    #[tokio::test]
    async fn queries_do_not_write_state() {
        let data = tempfile::tempdir().unwrap();
        assert!(run(data.path(), &["get-repo", "missing"]).await.is_err());
        run(data.path(), &["balance", "someone"]).await.unwrap();
        assert!(!data.path().join("ledger.json").exists());
    }

    #[tokio::test]
    async fn invalid_commit_id_is_rejected_before_lookup() {
        let data = tempfile::tempdir().unwrap();
        let err = run(data.path(), &["get-commit", "demo", "not-hex"]).await.unwrap_err();
        assert!(err.to_string().contains("invalid commit id"));
    }

    #[tokio::test]
    async fn command_error_wins_over_save_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("not-a-dir");
        std::fs::write(&blocked, b"").unwrap();

        let err = run(&blocked, &["init", "demo"]).await.unwrap_err();
        assert!(err.to_string().contains("authentication"), "{err:#}");

        let err = run(&blocked, &["--account", "alice", "init", "demo"]).await.unwrap_err();
        assert!(err.to_string().contains("saving"), "{err:#}");
    }
}
