use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::remote::{RawSubscription, Remote};
use crate::store::{Store, StoreError, SubscriptionRecord};

use super::RunGuard;

/// Full-replace synchronization of the subscription/label snapshot, plus the
/// remote subscription mutations (subscribe, label edit).
pub struct SubscriptionSynchronizer {
    remote: Arc<Remote>,
    store: Store,
    running: AtomicBool,
}

impl SubscriptionSynchronizer {
    pub fn new(remote: Arc<Remote>, store: Store) -> Self {
        Self {
            remote,
            store,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one subscription pass. Returns `Ok(false)` when a pass is in
    /// flight or the fetch failed; the previous snapshot stays untouched in
    /// both cases.
    pub async fn sync(&self) -> Result<bool, StoreError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("subscriptions are already being synchronized");
            return Ok(false);
        };

        let raw = match self.remote.subscription_list().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "subscription synchronization failed");
                return Ok(false);
            }
        };

        let records: Vec<SubscriptionRecord> = raw.iter().map(to_record).collect();
        self.store.replace_subscriptions(&records).await?;
        tracing::debug!(count = records.len(), "subscription synchronization completed");
        Ok(true)
    }

    /// Subscribes to a feed url on the remote. Returns whether the server
    /// reports a stream was created; the new subscription shows up in the
    /// snapshot on the next pass.
    pub async fn subscribe(&self, feed_url: &str) -> bool {
        let token = match self.remote.edit_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(error = %e, "could not obtain edit token");
                return false;
            }
        };
        match self.remote.quickadd(feed_url, &token).await {
            Ok(created) => created,
            Err(e) => {
                tracing::error!(url = feed_url, error = %e, "subscribe request failed");
                false
            }
        }
    }

    /// Adds or removes a label on a subscription remotely.
    pub async fn set_label(&self, subscription_id: &str, label_id: &str, add: bool) -> bool {
        let token = match self.remote.edit_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(error = %e, "could not obtain edit token");
                return false;
            }
        };
        match self
            .remote
            .subscription_edit(subscription_id, label_id, add, &token)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(subscription = subscription_id, error = %e, "label edit failed");
                false
            }
        }
    }
}

fn to_record(raw: &RawSubscription) -> SubscriptionRecord {
    SubscriptionRecord {
        id: raw.id.clone(),
        url: raw.html_url.clone(),
        title: raw.title.clone(),
        labels: raw
            .categories
            .iter()
            .map(|category| (category.short_id().to_string(), category.label.clone()))
            .collect(),
    }
}
