use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::remote::Remote;
use crate::store::{ContentStore, Store, StoreError};

use super::flags::{FlagSyncStats, FlagSynchronizer};
use super::ids::IdSynchronizer;
use super::items::{ItemSyncStats, ItemSynchronizer};
use super::subscriptions::SubscriptionSynchronizer;
use super::RunGuard;

/// Combined outcome of one full items-pipeline pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub flags: FlagSyncStats,
    /// Whether the id universe was actually refreshed this pass.
    pub ids_refreshed: bool,
    pub items: ItemSyncStats,
}

/// Owns the four synchronizers and sequences the items pipeline.
///
/// Constructed once at startup with its collaborators injected; there is no
/// global state anywhere in the engine.
pub struct Syncer {
    flags: FlagSynchronizer,
    ids: IdSynchronizer,
    items: ItemSynchronizer,
    subscriptions: SubscriptionSynchronizer,
    pipeline_running: AtomicBool,
}

impl Syncer {
    pub fn new(
        remote: Arc<Remote>,
        store: Store,
        content: ContentStore,
        cache_items: u32,
    ) -> Self {
        Self {
            flags: FlagSynchronizer::new(Arc::clone(&remote), store.clone()),
            ids: IdSynchronizer::new(Arc::clone(&remote), store.clone(), cache_items),
            items: ItemSynchronizer::new(
                Arc::clone(&remote),
                store.clone(),
                content,
                i64::from(cache_items),
            ),
            subscriptions: SubscriptionSynchronizer::new(remote, store),
            pipeline_running: AtomicBool::new(false),
        }
    }

    /// Runs the full items pipeline: flags, then ids, then items, strictly
    /// in that order. Flags must drain first — an id refresh tombstones
    /// everything, and a flag ack arriving after a deletion would be lost.
    ///
    /// Returns `Ok(None)` when a pipeline pass is already in flight.
    pub async fn sync_all(&self) -> Result<Option<SyncReport>, StoreError> {
        let Some(_guard) = RunGuard::acquire(&self.pipeline_running) else {
            tracing::warn!("sync pipeline already running");
            return Ok(None);
        };
        tracing::info!("starting sync pass");

        let flags = self.flags.sync().await?;
        let ids_refreshed = self.ids.sync().await?;
        let items = self.items.sync().await?;

        let report = SyncReport {
            flags,
            ids_refreshed,
            items,
        };
        tracing::info!(
            acked_flags = report.flags.acked,
            ids_refreshed = report.ids_refreshed,
            fetched_items = report.items.fetched,
            "sync pass finished"
        );
        Ok(Some(report))
    }

    /// Refreshes the subscription snapshot. Independent of the items
    /// pipeline and safe to run concurrently with it.
    pub async fn sync_subscriptions(&self) -> Result<bool, StoreError> {
        self.subscriptions.sync().await
    }

    /// Access to the subscription mutations (subscribe, label edit).
    pub fn subscriptions(&self) -> &SubscriptionSynchronizer {
        &self.subscriptions
    }
}
