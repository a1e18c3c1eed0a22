//! Validated request objects.
//!
//! Each operation takes one of these. `validate` runs before any store or
//! ledger call, so components below never see missing or empty fields.

use std::path::PathBuf;

use codechain_types::{validate_branch_name, validate_repository_name, ContentId, PullRequestId};

use crate::error::{SdkError, SdkResult};

pub(crate) fn require(field: &'static str, value: &str) -> SdkResult<()> {
    if value.trim().is_empty() {
        return Err(SdkError::MissingInput { field });
    }
    Ok(())
}

fn require_path(field: &'static str, value: &std::path::Path) -> SdkResult<()> {
    if value.as_os_str().is_empty() {
        return Err(SdkError::MissingInput { field });
    }
    Ok(())
}

fn repository(name: &str) -> SdkResult<()> {
    require("repository", name)?;
    validate_repository_name(name).map_err(|e| SdkError::InvalidInput {
        field: "repository",
        reason: e.to_string(),
    })
}

fn branch(field: &'static str, name: &str) -> SdkResult<()> {
    require(field, name)?;
    validate_branch_name(name).map_err(|e| SdkError::InvalidInput {
        field,
        reason: e.to_string(),
    })
}

/// Create a repository, optionally setting its description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitRequest {
    pub repository: String,
    pub description: Option<String>,
}

impl InitRequest {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)
    }
}

/// Target a whole repository (publish).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryRequest {
    pub repository: String,
}

impl RepositoryRequest {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
        }
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptionRequest {
    pub repository: String,
    pub description: String,
}

impl DescriptionRequest {
    pub fn new(repository: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            description: description.into(),
        }
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)?;
        require("description", &self.description)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchRequest {
    pub repository: String,
    pub branch: String,
}

impl BranchRequest {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
        }
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)?;
        branch("branch", &self.branch)
    }
}

/// Record an already uploaded tree as the next commit on a branch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRequest {
    pub repository: String,
    pub branch: String,
    pub message: String,
    pub content_root: ContentId,
}

impl CommitRequest {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        message: impl Into<String>,
        content_root: ContentId,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            message: message.into(),
            content_root,
        }
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)?;
        branch("branch", &self.branch)?;
        require("message", &self.message)?;
        if self.content_root.is_null() {
            return Err(SdkError::MissingInput {
                field: "content root",
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub path: PathBuf,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn validate(&self) -> SdkResult<()> {
        require_path("path", &self.path)
    }
}

/// Upload a local directory and commit the resulting tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitDirectoryRequest {
    pub repository: String,
    pub branch: String,
    pub message: String,
    pub path: PathBuf,
}

impl CommitDirectoryRequest {
    pub fn new(
        repository: impl Into<String>,
        branch: impl Into<String>,
        message: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            message: message.into(),
            path: path.into(),
        }
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)?;
        branch("branch", &self.branch)?;
        require("message", &self.message)?;
        require_path("path", &self.path)
    }
}

/// Materialize a branch head into `<output_dir>/<repository>.<ext>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloneRequest {
    pub repository: String,
    pub branch: String,
    pub output_dir: PathBuf,
}

impl CloneRequest {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            output_dir: PathBuf::from("."),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)?;
        branch("branch", &self.branch)?;
        require_path("output directory", &self.output_dir)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullRequestRequest {
    pub repository: String,
    pub from_branch: String,
    pub to_branch: String,
}

impl PullRequestRequest {
    pub fn new(
        repository: impl Into<String>,
        from_branch: impl Into<String>,
        to_branch: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            from_branch: from_branch.into(),
            to_branch: to_branch.into(),
        }
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)?;
        branch("from branch", &self.from_branch)?;
        branch("to branch", &self.to_branch)?;
        if self.from_branch == self.to_branch {
            return Err(SdkError::InvalidInput {
                field: "to branch",
                reason: "source and target branch are the same".into(),
            });
        }
        Ok(())
    }
}

/// Approve or reject a pull request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewRequest {
    pub repository: String,
    pub id: PullRequestId,
}

impl ReviewRequest {
    pub fn new(repository: impl Into<String>, id: PullRequestId) -> Self {
        Self {
            repository: repository.into(),
            id,
        }
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)?;
        if self.id.0 == 0 {
            return Err(SdkError::InvalidInput {
                field: "pull request id",
                reason: "ids start at 1".into(),
            });
        }
        Ok(())
    }
}

/// Join a repository as a collaborator, paying `payment`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinRequest {
    pub repository: String,
    pub payment: u64,
}

impl JoinRequest {
    pub fn new(repository: impl Into<String>, payment: u64) -> Self {
        Self {
            repository: repository.into(),
            payment,
        }
    }

    pub fn validate(&self) -> SdkResult<()> {
        repository(&self.repository)?;
        if self.payment == 0 {
            return Err(SdkError::MissingInput { field: "payment" });
        }
        Ok(())
    }
}

/// Parse a user-supplied pull request id such as `3` or `#3`.
pub fn parse_pull_request_id(value: &str) -> SdkResult<PullRequestId> {
    require("pull request id", value)?;
    value.trim().parse().map_err(|_| SdkError::InvalidInput {
        field: "pull request id",
        reason: format!("{value:?} is not a number"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(result: SdkResult<()>) -> &'static str {
        match result {
            Err(SdkError::MissingInput { field }) => field,
            other => panic!("expected missing input, got {other:?}"),
        }
    }

    #[test]
    fn empty_fields_are_missing() {
        assert_eq!(missing(InitRequest::new("").validate()), "repository");
        assert_eq!(missing(BranchRequest::new("demo", " ").validate()), "branch");
        assert_eq!(
            missing(CommitRequest::new("demo", "main", "", ContentId::from_bytes(b"x")).validate()),
            "message"
        );
        assert_eq!(
            missing(CommitRequest::new("demo", "main", "msg", ContentId::null()).validate()),
            "content root"
        );
        assert_eq!(missing(UploadRequest::new("").validate()), "path");
        assert_eq!(missing(JoinRequest::new("demo", 0).validate()), "payment");
    }

    #[test]
    fn malformed_names_are_invalid() {
        assert!(matches!(
            InitRequest::new("a/b").validate(),
            Err(SdkError::InvalidInput { field: "repository", .. })
        ));
        assert!(matches!(
            BranchRequest::new("demo", "bad..name").validate(),
            Err(SdkError::InvalidInput { field: "branch", .. })
        ));
        assert!(matches!(
            PullRequestRequest::new("demo", "main", "main").validate(),
            Err(SdkError::InvalidInput { .. })
        ));
    }

    #[test]
    fn well_formed_requests_pass() {
        InitRequest::new("demo").with_description("d").validate().unwrap();
        CommitDirectoryRequest::new("demo", "main", "first", "./src").validate().unwrap();
        CloneRequest::new("demo", "main").validate().unwrap();
        PullRequestRequest::new("demo", "feature", "main").validate().unwrap();
        DescriptionRequest::new("demo", "text").validate().unwrap();
    }

    #[test]
    fn pull_request_ids_parse_with_or_without_hash() {
        assert_eq!(parse_pull_request_id("#4").unwrap(), PullRequestId(4));
        assert_eq!(parse_pull_request_id(" 7 ").unwrap(), PullRequestId(7));
        assert!(parse_pull_request_id("seven").is_err());
        assert!(matches!(
            parse_pull_request_id(""),
            Err(SdkError::MissingInput { .. })
        ));
    }
}
