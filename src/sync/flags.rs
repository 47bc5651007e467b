use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::remote::{Remote, RemoteError};
use crate::store::{StateTag, Store, StoreError};

use super::{RunGuard, CHUNK_SIZE};

/// Outcome of one flag-sync pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlagSyncStats {
    /// Batches POSTed to the remote.
    pub batches: usize,
    /// Pending rows acknowledged and deleted.
    pub acked: usize,
    /// Batches that failed and stay queued for the next pass.
    pub failed_batches: usize,
}

/// Drains locally queued read/kept-unread/starred mutations to the remote.
///
/// The queue is durable: rows are deleted only after the batch carrying them
/// returned success, so a crash or a failed request re-sends on the next
/// pass (at-least-once delivery).
pub struct FlagSynchronizer {
    remote: Arc<Remote>,
    store: Store,
    running: AtomicBool,
}

impl FlagSynchronizer {
    pub fn new(remote: Arc<Remote>, store: Store) -> Self {
        Self {
            remote,
            store,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one flag-sync pass. Always reaches a terminal result: individual
    /// batch failures are logged and counted, never propagated.
    pub async fn sync(&self) -> Result<FlagSyncStats, StoreError> {
        let mut stats = FlagSyncStats::default();
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("flags are already being synchronized");
            return Ok(stats);
        };

        // Collect work per (flag, direction) combination up front.
        let mut work = Vec::new();
        for flag in StateTag::ALL {
            for remove in [false, true] {
                let rows = self.store.pending_flags(flag, remove).await?;
                if !rows.is_empty() {
                    work.push((flag, remove, rows));
                }
            }
        }
        if work.is_empty() {
            tracing::debug!("there were no flags to synchronize");
            return Ok(stats);
        }

        let token = match self.remote.edit_token().await {
            Ok(token) => token,
            Err(e) => {
                // Without an edit token no batch can go out; everything
                // stays queued.
                tracing::error!(error = %e, "could not obtain edit token");
                stats.failed_batches = work
                    .iter()
                    .map(|(_, _, rows)| rows.len().div_ceil(CHUNK_SIZE))
                    .sum();
                return Ok(stats);
            }
        };

        for (flag, remove, rows) in work {
            for chunk in rows.chunks(CHUNK_SIZE) {
                stats.batches += 1;
                let item_ids: Vec<i64> = chunk.iter().map(|row| row.item_id).collect();
                match self
                    .remote
                    .edit_tag(flag.tag(), remove, &item_ids, &token)
                    .await
                {
                    Ok(()) => {
                        let row_ids: Vec<i64> = chunk.iter().map(|row| row.id).collect();
                        self.store.delete_flags(&row_ids).await?;
                        stats.acked += chunk.len();
                    }
                    Err(RemoteError::Auth) => {
                        // Token already invalidated by the client; the next
                        // pass fetches a fresh one and retries.
                        tracing::warn!(flag = flag.tag(), remove, "edit token rejected");
                        stats.failed_batches += 1;
                    }
                    Err(e) => {
                        tracing::error!(flag = flag.tag(), remove, error = %e, "flag batch failed");
                        stats.failed_batches += 1;
                    }
                }
            }
        }

        tracing::debug!(
            batches = stats.batches,
            acked = stats.acked,
            failed = stats.failed_batches,
            "flag synchronization completed"
        );
        Ok(stats)
    }
}
