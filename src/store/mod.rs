//! The durable local cache the synchronizers reconcile against.
//!
//! [`Store`] is the relational half (SQLite via sqlx): item rows with their
//! sync control bits, the subscription/label snapshot, and the pending-flag
//! queue. [`ContentStore`] holds item bodies out-of-row, one blob per item.
//! Table ownership is strict: items belong to the id/item synchronizers,
//! subscriptions and labels to the subscription synchronizer, and flags are
//! written by user actions and drained by the flag synchronizer.

mod content;
mod flags;
mod items;
mod schema;
mod subscriptions;
mod types;

pub use content::ContentStore;
pub use schema::Store;
pub use types::{
    Category, Item, ItemUpdate, Label, PendingFlag, StateTag, StoreError, Subscription,
    SubscriptionRecord,
};
