use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "codechain",
    about = "CodeChain: decentralized code collaboration on a content store and a ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to <data-dir>/codechain.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the local devnet state
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Named identity to act as
    #[arg(long, global = true)]
    pub account: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new repository
    Init(InitArgs),
    /// Upload a folder to the content store
    Upload(UploadArgs),
    /// Upload a folder and commit it to a branch
    Commit(CommitArgs),
    /// Publish a repository
    Publish(RepoArgs),
    /// Join a repository as a collaborator
    Join(JoinArgs),
    /// Get the latest content id of a branch
    Hash(BranchArgs),
    /// Create a new branch
    Branch(BranchArgs),
    /// Open a pull request
    PullRequest(PullRequestArgs),
    /// Approve a pull request
    Approve(ReviewArgs),
    /// Reject a pull request
    Reject(ReviewArgs),
    /// Clone a branch into an archive
    Clone(CloneArgs),
    /// Show an account balance
    Balance(BalanceArgs),
    /// Set the description of a repository
    RepoDescr(DescriptionArgs),
    /// Show commit details
    GetCommit(GetCommitArgs),
    /// Show branch details
    GetBranch(BranchArgs),
    /// Show repository details
    GetRepo(RepoArgs),
    /// Show pull request details
    GetPullRequest(ReviewArgs),
    /// List open pull requests of a repository
    GetActivePullRequests(RepoArgs),
}

impl Command {
    /// Whether the command can change devnet state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Init(_)
                | Self::Upload(_)
                | Self::Commit(_)
                | Self::Publish(_)
                | Self::Join(_)
                | Self::Branch(_)
                | Self::PullRequest(_)
                | Self::Approve(_)
                | Self::Reject(_)
                | Self::RepoDescr(_)
        )
    }
}

#[derive(Args)]
pub struct InitArgs {
    pub repository: String,
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct UploadArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct CommitArgs {
    pub repository: String,
    pub branch: String,
    #[arg(short, long)]
    pub message: String,
    /// Directory to upload
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Args)]
pub struct RepoArgs {
    pub repository: String,
}

#[derive(Args)]
pub struct BranchArgs {
    pub repository: String,
    pub branch: String,
}

#[derive(Args)]
pub struct JoinArgs {
    pub repository: String,
    /// Payment attached to the request (defaults to the configured fee)
    pub payment: Option<u64>,
}

#[derive(Args)]
pub struct PullRequestArgs {
    pub repository: String,
    pub from_branch: String,
    pub to_branch: String,
}

#[derive(Args)]
pub struct ReviewArgs {
    pub repository: String,
    /// Pull request number, with or without a leading '#'
    pub id: String,
}

#[derive(Args)]
pub struct CloneArgs {
    pub repository: String,
    pub branch: String,
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct BalanceArgs {
    /// Account name (defaults to the acting account)
    #[arg(value_name = "ACCOUNT")]
    pub name: Option<String>,
}

#[derive(Args)]
pub struct DescriptionArgs {
    pub repository: String,
    pub description: String,
}

#[derive(Args)]
pub struct GetCommitArgs {
    pub repository: String,
    pub commit: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["codechain", "init", "demo"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert_eq!(args.repository, "demo");
            assert!(args.description.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_init_with_description() {
        let cli = Cli::try_parse_from(["codechain", "init", "demo", "-d", "a demo"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert_eq!(args.description, Some("a demo".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_commit() {
        let cli =
            Cli::try_parse_from(["codechain", "commit", "demo", "main", "-m", "first", "./src"]).unwrap();
        if let Command::Commit(args) = cli.command {
            assert_eq!(args.message, "first");
            assert_eq!(args.path, PathBuf::from("./src"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn commit_requires_message() {
        assert!(Cli::try_parse_from(["codechain", "commit", "demo", "main"]).is_err());
    }

    #[test]
    fn parse_pull_request() {
        let cli = Cli::try_parse_from(["codechain", "pull-request", "demo", "feature", "main"]).unwrap();
        if let Command::PullRequest(args) = cli.command {
            assert_eq!(args.from_branch, "feature");
            assert_eq!(args.to_branch, "main");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_clone_output() {
        let cli = Cli::try_parse_from(["codechain", "clone", "demo", "main", "-o", "/tmp/out"]).unwrap();
        if let Command::Clone(args) = cli.command {
            assert_eq!(args.output, PathBuf::from("/tmp/out"));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_get_active_pull_requests() {
        let cli = Cli::try_parse_from(["codechain", "get-active-pull-requests", "demo"]).unwrap();
        assert!(matches!(cli.command, Command::GetActivePullRequests(_)));
    }

    #[test]
    fn parse_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "codechain", "balance", "--account", "alice", "--data-dir", "/tmp/cc", "-v",
        ])
        .unwrap();
        assert_eq!(cli.account, Some("alice".into()));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/cc")));
        assert!(cli.verbose);
    }

    #[test]
    fn balance_takes_name_and_global_account() {
        let cli = Cli::try_parse_from(["codechain", "balance", "bob", "--account", "alice"]).unwrap();
        assert_eq!(cli.account, Some("alice".into()));
        if let Command::Balance(args) = cli.command {
            assert_eq!(args.name, Some("bob".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["codechain", "--format", "json", "get-repo", "demo"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.command.is_mutating());
    }

    #[test]
    fn mutating_commands() {
        let cli = Cli::try_parse_from(["codechain", "approve", "demo", "#1"]).unwrap();
        assert!(cli.command.is_mutating());
        let cli = Cli::try_parse_from(["codechain", "hash", "demo", "main"]).unwrap();
        assert!(!cli.command.is_mutating());
    }
}
