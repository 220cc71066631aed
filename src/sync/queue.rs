//! Offline operation queue persisted in the sync-state record.

use std::mem;

use tracing::{info, warn};

use super::SyncScheduler;
use crate::app::Result;
use crate::domain::{QueuedOperation, SyncOperation};
use crate::store::{Store, StoreExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub replayed: usize,
    pub failed: usize,
}

impl<S: Store> SyncScheduler<S> {
    /// Append an operation to be replayed once the network is back.
    pub async fn queue_operation(&self, operation: SyncOperation) -> Result<()> {
        let mut state = self.store.sync_state().await?;
        info!(kind = operation.kind(), "Queued offline operation");
        state.pending_operations.push(QueuedOperation::new(operation));
        self.store.put(&state).await?;
        Ok(())
    }

    pub async fn pending_operations(&self) -> Result<Vec<QueuedOperation>> {
        Ok(self.store.sync_state().await?.pending_operations)
    }

    /// Replay queued operations in order. The persisted queue is emptied
    /// before replay starts; operations that fail are logged and dropped.
    pub async fn process_queued_operations(&self) -> Result<QueueReport> {
        let mut state = self.store.sync_state().await?;
        let pending = mem::take(&mut state.pending_operations);
        if pending.is_empty() {
            return Ok(QueueReport::default());
        }
        self.store.put(&state).await?;

        info!(count = pending.len(), "Replaying offline operations");
        let mut report = QueueReport::default();
        for queued in &pending {
            match self.replay(&queued.operation).await {
                Ok(()) => report.replayed += 1,
                Err(e) => {
                    warn!(
                        kind = queued.operation.kind(),
                        queued_at = %queued.queued_at,
                        error = %e,
                        "Queued operation failed"
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn replay(&self, operation: &SyncOperation) -> Result<()> {
        match operation {
            SyncOperation::AddFeed { url, category_id } => {
                self.subscribe(url, category_id.as_deref()).await?;
            }
            SyncOperation::DeleteFeed { feed_id } => {
                self.unsubscribe(feed_id).await?;
            }
            SyncOperation::UpdateFeed { feed_id, update } => {
                self.update_feed(feed_id, update).await?;
            }
            SyncOperation::RefreshFeed { feed_id } => {
                self.refresh_feed_by_id(feed_id).await?;
            }
        }
        Ok(())
    }
}
