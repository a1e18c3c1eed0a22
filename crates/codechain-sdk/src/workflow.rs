use codechain_archive::{ArchiveBuilder, ArchiveInfo};
use codechain_ledger::RevertReason;
use codechain_sync::{DirectoryMirror, TreeReconstructor, UploadReport};
use codechain_types::{Commit, ContentId};

use crate::error::{SdkError, SdkResult};
use crate::requests::{CloneRequest, CommitDirectoryRequest, CommitRequest, UploadRequest};
use crate::session::Session;

/// Result of uploading a directory and committing it.
#[derive(Clone, Debug)]
pub struct CommitOutcome {
    pub upload: UploadReport,
    pub commit: Commit,
}

/// Result of cloning a branch head into an archive.
#[derive(Clone, Debug)]
pub struct CloneOutcome {
    pub root: ContentId,
    pub archive: ArchiveInfo,
}

/// Multi-step operations combining the sync engine, the protocol, and the
/// archive builder.
pub struct Workflows<'s> {
    session: &'s Session,
}

impl<'s> Workflows<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Mirror a local directory into the content store.
    pub async fn upload(&self, request: &UploadRequest) -> SdkResult<UploadReport> {
        request.validate()?;
        self.session.check_cancelled()?;
        let mirror = DirectoryMirror::new(
            self.session.store().clone(),
            self.session.config().sync.clone(),
        )
        .with_cancellation(self.session.cancellation_token().clone());
        Ok(mirror.upload(&request.path).await?)
    }

    /// Upload a directory, then commit its root. Nothing is committed when
    /// the upload fails or finds no files.
    pub async fn commit_directory(&self, request: &CommitDirectoryRequest) -> SdkResult<CommitOutcome> {
        request.validate()?;
        self.session.account()?;

        let upload = self.upload(&UploadRequest::new(request.path.clone())).await?;
        let root = upload.root.ok_or(SdkError::MissingInput {
            field: "files to commit",
        })?;

        let commit = self
            .session
            .version_control()
            .commit(&CommitRequest::new(
                request.repository.clone(),
                request.branch.clone(),
                request.message.clone(),
                root,
            ))
            .await?;
        Ok(CommitOutcome { upload, commit })
    }

    /// Resolve the branch head, rebuild its tree, and write
    /// `<output_dir>/<repository>.<ext>` with everything under a folder named
    /// after the repository.
    pub async fn clone(&self, request: &CloneRequest) -> SdkResult<CloneOutcome> {
        request.validate()?;
        let root = self
            .session
            .version_control()
            .latest_content_id(&request.repository, &request.branch)
            .await?
            .ok_or_else(|| {
                SdkError::rejected(
                    format!("clone {}/{}", request.repository, request.branch),
                    RevertReason::CommitNotFound,
                )
            })?;
        self.session.check_cancelled()?;

        let tree = TreeReconstructor::new(
            self.session.store().clone(),
            self.session.config().sync.clone(),
        )
        .with_cancellation(self.session.cancellation_token().clone())
        .reconstruct(&root)
        .await?;
        self.session.check_cancelled()?;

        let builder = ArchiveBuilder::new(self.session.config().archive.clone());
        let target = request.output_dir.join(builder.file_name(&request.repository));
        let repository = request.repository.clone();
        let write_target = target.clone();
        let archive = tokio::task::spawn_blocking(move || builder.write(&write_target, &repository, &tree))
            .await
            .map_err(|e| SdkError::Internal(e.to_string()))?
            .map_err(|source| SdkError::Archive {
                path: target,
                source,
            })?;

        tracing::info!(
            repository = %request.repository,
            branch = %request.branch,
            root = %root.short_hex(),
            archive = %archive.path.display(),
            "clone complete"
        );
        Ok(CloneOutcome { root, archive })
    }
}
