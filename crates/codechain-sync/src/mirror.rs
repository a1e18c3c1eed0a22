use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use codechain_store::{ContentStore, StoreError, StorePath, WriteOptions};
use codechain_types::ContentId;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::pool::TransferPool;
use crate::tree::{walk_regular_files, LocalFile};

/// Fresh staging names tried before an upload gives up.
const STAGING_ATTEMPTS: usize = 8;

/// Outcome of mirroring a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReport {
    /// Root content id of the staged tree. `None` when no regular file was
    /// found, in which case there is nothing to commit.
    pub root: Option<ContentId>,
    /// Staging namespace the files were written under.
    pub staging: StorePath,
    pub files: usize,
    pub bytes: u64,
}

/// Replicates a local directory into the content store.
///
/// Every upload writes under its own randomly named staging root, so
/// concurrent uploads against one store never touch the same paths.
pub struct DirectoryMirror {
    store: Arc<dyn ContentStore>,
    config: SyncConfig,
    cancel: CancellationToken,
}

impl DirectoryMirror {
    pub fn new(store: Arc<dyn ContentStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Upload every regular file under `local_root` and return the staged
    /// tree's root id.
    ///
    /// Any local read or store write failure aborts the upload. Files already
    /// written stay in the staging namespace; they are unreferenced and
    /// harmless.
    pub async fn upload(&self, local_root: &Path) -> SyncResult<UploadReport> {
        let meta = tokio::fs::metadata(local_root)
            .await
            .map_err(|e| SyncError::local(local_root, e))?;
        if !meta.is_dir() {
            return Err(SyncError::NotADirectory(local_root.to_path_buf()));
        }

        let staging = self.claim_staging().await?;

        let root_dir = local_root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || walk_regular_files(&root_dir))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))??;
        tracing::debug!(staging = %staging, files = files.len(), "staging upload");

        let file_count = files.len();
        let mut sizes = Vec::with_capacity(file_count);
        let mut pool = TransferPool::new(self.config.max_concurrency);
        for file in files {
            if self.cancel.is_cancelled() {
                tracing::warn!(staging = %staging, "upload cancelled");
                pool.drain().await;
                return Err(SyncError::Cancelled);
            }
            pool.collect_ready(&mut sizes)?;
            let target = staged_path(&staging, &file)?;
            let store = Arc::clone(&self.store);
            pool.spawn(upload_file(store, file.absolute, target)).await?;
        }
        pool.finish(&mut sizes).await?;

        let bytes: u64 = sizes.iter().sum();
        let root = if file_count == 0 {
            None
        } else {
            let id = self
                .store
                .stat(&staging)
                .await
                .map_err(|e| SyncError::store("stat", &staging, e))?;
            Some(id)
        };

        tracing::info!(
            staging = %staging,
            files = file_count,
            bytes,
            root = ?root,
            "upload complete"
        );
        Ok(UploadReport {
            root,
            staging,
            files: file_count,
            bytes,
        })
    }

    /// Create a staging directory whose name was not already in use.
    ///
    /// `mkdir` succeeds on existing directories, so each candidate is
    /// stat'ed first and a taken name is replaced by a fresh one.
    async fn claim_staging(&self) -> SyncResult<StorePath> {
        for _ in 0..STAGING_ATTEMPTS {
            let candidate = StorePath::root()
                .join(&staging_name(self.config.staging_name_len))
                .map_err(|e| SyncError::store("mkdir", "/", e))?;
            match self.store.stat(&candidate).await {
                Ok(_) => {
                    tracing::debug!(staging = %candidate, "staging name taken, retrying");
                    continue;
                }
                Err(StoreError::PathNotFound(_)) => {}
                Err(e) => return Err(SyncError::store("stat", &candidate, e)),
            }
            self.store
                .mkdir(&candidate)
                .await
                .map_err(|e| SyncError::store("mkdir", &candidate, e))?;
            return Ok(candidate);
        }
        Err(SyncError::StagingExhausted(STAGING_ATTEMPTS))
    }
}

async fn upload_file(
    store: Arc<dyn ContentStore>,
    source: PathBuf,
    target: StorePath,
) -> SyncResult<u64> {
    let data = tokio::fs::read(&source)
        .await
        .map_err(|e| SyncError::local(&source, e))?;
    let len = data.len() as u64;
    store
        .write(&target, Bytes::from(data), WriteOptions::default())
        .await
        .map_err(|e| SyncError::store("write", &target, e))?;
    tracing::debug!(path = %target, bytes = len, "uploaded file");
    Ok(len)
}

fn staged_path(staging: &StorePath, file: &LocalFile) -> SyncResult<StorePath> {
    let mut path = staging.clone();
    for segment in file.relative.split('/') {
        path.push(segment)
            .map_err(|e| SyncError::store("write", &file.relative, e))?;
    }
    Ok(path)
}

/// Random lowercase alphanumeric directory name.
fn staging_name(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len.max(1))
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
