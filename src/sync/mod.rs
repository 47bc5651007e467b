//! The synchronization engine.
//!
//! Four cooperating synchronizers reconcile the remote reader service
//! against the local cache:
//!
//! - [`FlagSynchronizer`] drains locally queued read/star mutations,
//! - [`IdSynchronizer`] refreshes the id universe and the tombstone/dirty bits,
//! - [`ItemSynchronizer`] refetches content for dirty items and collects garbage,
//! - [`SubscriptionSynchronizer`] replaces the subscription/label snapshot.
//!
//! [`Syncer`] sequences the first three strictly (flags before ids before
//! items); the subscription pass is independent. Every pass runs to a
//! terminal result no matter how many individual requests failed — failures
//! leave dirty/pending markers in place and the next pass re-drives them.

mod flags;
mod ids;
mod items;
mod normalize;
mod orchestrator;
mod subscriptions;

pub use flags::{FlagSyncStats, FlagSynchronizer};
pub use ids::IdSynchronizer;
pub use items::{ItemSyncStats, ItemSynchronizer};
pub use normalize::{normalize, short_id, NormalizedItem, SUMMARY_BUDGET, UNKNOWN_AUTHOR, UNTITLED};
pub use orchestrator::{SyncReport, Syncer};
pub use subscriptions::SubscriptionSynchronizer;

use std::sync::atomic::{AtomicBool, Ordering};

/// Batch size for id lists POSTed to the remote. Requests above 512 ids are
/// rejected outright and anything between 250 and 512 silently returns
/// exactly 250 items, so 250 is a hard contract, not a tuning knob.
pub(crate) const CHUNK_SIZE: usize = 250;

/// Single-flight guard shared by the synchronizers: acquiring flips the flag,
/// dropping releases it. A second pass started while one is in flight is
/// refused rather than queued.
pub(crate) struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
