use codechain_sdk::{Branch, CloneOutcome, Commit, CommitOutcome, PullRequest, PullRequestState, Repository, UploadReport};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;

/// Renders command results as coloured text or pretty JSON on stdout.
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }

    pub fn done(&self, action: &str, subject: &str) -> anyhow::Result<()> {
        self.emit(&json!({ "status": "ok", "action": action, "subject": subject }), || {
            println!("{} {} {}", "✓".green().bold(), action, subject.yellow());
        })
    }

    pub fn repository(&self, repo: &Repository) -> anyhow::Result<()> {
        self.emit(repo, || {
            let visibility = if repo.public { "public".green() } else { "private".dimmed() };
            println!("{} ({})", repo.name.bold(), visibility);
            println!("  Owner: {}", repo.owner.to_string().cyan());
            if !repo.description.is_empty() {
                println!("  Description: {}", repo.description);
            }
            println!("  Branches: {}", repo.branches.join(", ").yellow());
            println!("  Collaborators: {}", repo.collaborators.len());
            println!("  Created: {}", repo.created_at.to_rfc3339());
        })
    }

    pub fn branch(&self, branch: &Branch) -> anyhow::Result<()> {
        self.emit(branch, || {
            println!("{}/{}", branch.repository.bold(), branch.name.yellow().bold());
            match &branch.head {
                Some(head) => println!("  Head: {}", head.to_string().yellow()),
                None => println!("  Head: {}", "(no commits)".dimmed()),
            }
            println!("  Commits: {}", branch.commit_count);
        })
    }

    pub fn commit(&self, commit: &Commit) -> anyhow::Result<()> {
        self.emit(commit, || print_commit(commit))
    }

    pub fn commit_outcome(&self, outcome: &CommitOutcome) -> anyhow::Result<()> {
        let value = json!({
            "files": outcome.upload.files,
            "bytes": outcome.upload.bytes,
            "commit": outcome.commit,
        });
        self.emit(&value, || {
            println!(
                "{} Uploaded {} files ({} bytes)",
                "✓".green().bold(),
                outcome.upload.files,
                outcome.upload.bytes
            );
            print_commit(&outcome.commit);
        })
    }

    pub fn pull_request(&self, pr: &PullRequest) -> anyhow::Result<()> {
        self.emit(pr, || print_pull_request(pr))
    }

    pub fn pull_requests(&self, prs: &[PullRequest]) -> anyhow::Result<()> {
        self.emit(&prs, || {
            if prs.is_empty() {
                println!("No active pull requests.");
            }
            for pr in prs {
                print_pull_request(pr);
            }
        })
    }

    pub fn upload(&self, report: &UploadReport) -> anyhow::Result<()> {
        let value = json!({
            "root": report.root,
            "staging": report.staging.to_string(),
            "files": report.files,
            "bytes": report.bytes,
        });
        self.emit(&value, || match &report.root {
            Some(root) => {
                println!("{} Uploaded {} files ({} bytes)", "✓".green().bold(), report.files, report.bytes);
                println!("  Content id: {}", root.to_string().yellow());
            }
            None => println!("No files found under the given directory."),
        })
    }

    pub fn content_id(&self, repository: &str, branch: &str, root: Option<String>) -> anyhow::Result<()> {
        let value = json!({ "repository": repository, "branch": branch, "content_id": root });
        self.emit(&value, || match &root {
            Some(root) => println!("{}", root.yellow()),
            None => println!("{}/{} has no commits.", repository, branch),
        })
    }

    pub fn clone_outcome(&self, outcome: &CloneOutcome) -> anyhow::Result<()> {
        let value = json!({
            "root": outcome.root,
            "archive": outcome.archive.path,
            "files": outcome.archive.files,
            "size_bytes": outcome.archive.size_bytes,
        });
        self.emit(&value, || {
            println!(
                "{} Cloned {} files into {}",
                "✓".green().bold(),
                outcome.archive.files,
                outcome.archive.path.display().to_string().bold()
            );
            println!("  Content id: {}", outcome.root.to_string().yellow());
        })
    }

    pub fn balance(&self, account: &str, balance: u64) -> anyhow::Result<()> {
        self.emit(&json!({ "account": account, "balance": balance }), || {
            println!("{}: {}", account.cyan(), balance.to_string().bold());
        })
    }
}

fn print_commit(commit: &Commit) {
    println!("commit {}", commit.id.to_string().yellow().bold());
    println!("  Branch: {}/{}", commit.repository, commit.branch.green());
    println!("  Author: {}", commit.author.to_string().cyan());
    println!("  Date: {}", commit.timestamp.to_rfc3339());
    println!("  Content id: {}", commit.content_root);
    if let Some(parent) = &commit.parent {
        println!("  Parent: {}", parent.to_string().dimmed());
    }
    println!("\n    {}", commit.message);
}

fn print_pull_request(pr: &PullRequest) {
    let state = match pr.state {
        PullRequestState::Open => pr.state.to_string().yellow(),
        PullRequestState::Approved => pr.state.to_string().green(),
        PullRequestState::Rejected => pr.state.to_string().red(),
    };
    println!(
        "{} {} {} → {} [{}]",
        pr.id.to_string().bold(),
        pr.repository,
        pr.from_branch.yellow(),
        pr.to_branch.yellow(),
        state
    );
    println!("  Author: {}", pr.author.to_string().cyan());
    if !pr.approvers.is_empty() {
        println!("  Approvers: {}", pr.approvers.len());
    }
}
