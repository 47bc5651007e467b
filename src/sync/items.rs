use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::remote::Remote;
use crate::store::{ContentStore, Store, StoreError};

use super::normalize::normalize;
use super::{RunGuard, CHUNK_SIZE};

/// Content chunk requests kept in flight at once.
const MAX_CONCURRENT_CHUNKS: usize = 4;

/// Outcome of one item-sync pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ItemSyncStats {
    /// Items whose content and metadata were refreshed.
    pub fetched: usize,
    /// Content chunks that failed; their items stay dirty.
    pub failed_chunks: usize,
    /// Tombstoned items removed by garbage collection.
    pub collected: usize,
    /// Non-starred items evicted to honor the cache cap.
    pub evicted: usize,
}

/// Fetches full content and metadata for every dirty item, persists it, and
/// runs the garbage collector.
pub struct ItemSynchronizer {
    remote: Arc<Remote>,
    store: Store,
    content: ContentStore,
    /// Local bound on non-starred cached items (`cache_items` setting).
    item_cap: i64,
    running: AtomicBool,
}

impl ItemSynchronizer {
    pub fn new(remote: Arc<Remote>, store: Store, content: ContentStore, item_cap: i64) -> Self {
        Self {
            remote,
            store,
            content,
            item_cap,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one item-sync pass: content refetch for dirty ids, then garbage
    /// collection and cap enforcement. GC runs even when every chunk failed
    /// or nothing was dirty.
    pub async fn sync(&self) -> Result<ItemSyncStats, StoreError> {
        let mut stats = ItemSyncStats::default();
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("items are already being synchronized");
            return Ok(stats);
        };

        let dirty = self.store.dirty_ids().await?;
        if dirty.is_empty() {
            tracing::debug!("no items need synchronization");
        } else {
            tracing::debug!(count = dirty.len(), "fetching item contents");
            // Chunk fetches run concurrently; persistence happens after the
            // fetch stream drains, so commit still follows the last chunk.
            let results: Vec<_> = stream::iter(dirty.chunks(CHUNK_SIZE))
                .map(|chunk| {
                    let remote = Arc::clone(&self.remote);
                    async move { remote.stream_contents(chunk).await }
                })
                .buffer_unordered(MAX_CONCURRENT_CHUNKS)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(raw_items) => {
                        let mut updates = Vec::with_capacity(raw_items.len());
                        for raw in &raw_items {
                            match normalize(raw) {
                                Some(item) => {
                                    self.content.write(item.update.id, &item.body).await?;
                                    updates.push(item.update);
                                }
                                None => {
                                    tracing::warn!(id = %raw.id, "skipping item with undecodable id");
                                }
                            }
                        }
                        stats.fetched += updates.len();
                        // Bodies are on disk; clearing to_sync last keeps the
                        // dirty marker honest if the write above had failed.
                        self.store.apply_item_updates(&updates).await?;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "item chunk request failed");
                        stats.failed_chunks += 1;
                    }
                }
            }
        }

        let collected = self.store.collect_garbage().await?;
        self.content.remove_many(&collected).await;
        stats.collected = collected.len();

        let evicted = self.store.evict_over_cap(self.item_cap).await?;
        self.content.remove_many(&evicted).await;
        stats.evicted = evicted.len();

        tracing::debug!(
            fetched = stats.fetched,
            failed_chunks = stats.failed_chunks,
            collected = stats.collected,
            evicted = stats.evicted,
            "item synchronization completed"
        );
        Ok(stats)
    }
}
