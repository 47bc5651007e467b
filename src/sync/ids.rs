use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::remote::{IdStream, Remote};
use crate::store::{Store, StoreError};

use super::RunGuard;

/// Reconciles the cached id universe against the three canonical remote
/// listings (reading list, unread, starred).
///
/// The pass tombstones every cached item, then revives exactly the ids the
/// listings still report, marking items dirty when remote advertises a newer
/// freshness timestamp. The whole reconciliation commits as one transaction,
/// so no partial tombstone state is ever observable.
pub struct IdSynchronizer {
    remote: Arc<Remote>,
    store: Store,
    /// Server-side cap for each id listing (`cache_items` setting).
    item_limit: u32,
    running: AtomicBool,
}

impl IdSynchronizer {
    pub fn new(remote: Arc<Remote>, store: Store, item_limit: u32) -> Self {
        Self {
            remote,
            store,
            item_limit,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one id-sync pass.
    ///
    /// Returns `Ok(false)` without touching the cache when a pass is already
    /// in flight or when any of the three listings failed — the previous
    /// snapshot stays valid and the next pass re-drives. Store failures are
    /// genuine errors.
    pub async fn sync(&self) -> Result<bool, StoreError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("ids are already being synchronized");
            return Ok(false);
        };

        // All three listings in flight at once; the barrier is the join.
        let fetched = tokio::try_join!(
            self.remote
                .stream_item_ids(IdStream::ReadingList, self.item_limit),
            self.remote.stream_item_ids(IdStream::Unread, self.item_limit),
            self.remote
                .stream_item_ids(IdStream::Starred, self.item_limit),
        );
        let (reading_list, unread, starred) = match fetched {
            Ok(lists) => lists,
            Err(e) => {
                tracing::error!(error = %e, "id synchronization failed");
                return Ok(false);
            }
        };

        // Union of every reported id, keeping the newest freshness marker
        // seen for it across the listings.
        let mut refs: BTreeMap<i64, i64> = BTreeMap::new();
        for item_ref in reading_list.iter().chain(&unread).chain(&starred) {
            let marker = item_ref.timestamp_usec.unwrap_or(0);
            refs.entry(item_ref.id)
                .and_modify(|current| *current = (*current).max(marker))
                .or_insert(marker);
        }

        // Unread is defined as an intersection with the reading list; the
        // listing occasionally reports strays outside it and those must not
        // surface as unread.
        let reading_set: HashSet<i64> = reading_list.iter().map(|r| r.id).collect();
        let unread_ids: Vec<i64> = unread
            .iter()
            .map(|r| r.id)
            .filter(|id| reading_set.contains(id))
            .collect();
        let starred_ids: Vec<i64> = starred.iter().map(|r| r.id).collect();

        let refs: Vec<(i64, i64)> = refs.into_iter().collect();
        self.store
            .reconcile_ids(&refs, &unread_ids, &starred_ids)
            .await?;

        tracing::debug!(
            known = refs.len(),
            unread = unread_ids.len(),
            starred = starred_ids.len(),
            "id synchronization completed"
        );
        Ok(true)
    }
}
