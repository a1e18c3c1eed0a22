use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::error::{SyncError, SyncResult};

/// Bounded set of in-flight transfer tasks.
///
/// `spawn` waits for a permit, so at most `limit` tasks run at once.
/// Dropping the pool aborts whatever is still running.
pub(crate) struct TransferPool<T> {
    tasks: JoinSet<SyncResult<T>>,
    permits: Arc<Semaphore>,
}

impl<T: Send + 'static> TransferPool<T> {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    pub(crate) async fn spawn<F>(&mut self, task: F) -> SyncResult<()>
    where
        F: Future<Output = SyncResult<T>> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?;
        self.tasks.spawn(async move {
            let _permit = permit;
            task.await
        });
        Ok(())
    }

    /// Move already finished results into `out`, failing on the first error.
    pub(crate) fn collect_ready(&mut self, out: &mut Vec<T>) -> SyncResult<()> {
        while let Some(joined) = self.tasks.try_join_next() {
            out.push(flatten(joined)?);
        }
        Ok(())
    }

    /// Wait for every task. On the first failure the rest are aborted.
    pub(crate) async fn finish(mut self, out: &mut Vec<T>) -> SyncResult<()> {
        while let Some(joined) = self.tasks.join_next().await {
            match flatten(joined) {
                Ok(value) => out.push(value),
                Err(err) => {
                    self.tasks.shutdown().await;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Let in-flight tasks settle without collecting their results.
    pub(crate) async fn drain(mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

fn flatten<T>(joined: Result<SyncResult<T>, JoinError>) -> SyncResult<T> {
    joined.map_err(|e| SyncError::Task(e.to_string()))?
}
