use std::collections::BTreeMap;

use super::schema::Store;
use super::types::{Label, StoreError, Subscription, SubscriptionRecord};

impl Store {
    // ========================================================================
    // Subscription snapshot
    // ========================================================================

    /// Replaces the entire subscription/label snapshot in one transaction.
    ///
    /// There is no incremental merge: the remote list is small and cheap to
    /// resend in full, so delete-all + reinsert keeps the logic trivial. A
    /// failed fetch never reaches this method, leaving the previous snapshot
    /// intact.
    pub async fn replace_subscriptions(
        &self,
        records: &[SubscriptionRecord],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM subscriptions")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM labels").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM labels_fk")
            .execute(&mut *tx)
            .await?;

        // Distinct labels across all subscriptions.
        let mut labels: BTreeMap<&str, &str> = BTreeMap::new();
        for record in records {
            for (label_id, name) in &record.labels {
                labels.insert(label_id, name);
            }
        }

        for record in records {
            sqlx::query("INSERT INTO subscriptions(id, url, title) VALUES(?, ?, ?)")
                .bind(&record.id)
                .bind(&record.url)
                .bind(&record.title)
                .execute(&mut *tx)
                .await?;
        }

        for (label_id, name) in labels {
            sqlx::query("INSERT OR IGNORE INTO labels(id, name) VALUES(?, ?)")
                .bind(label_id)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        for record in records {
            for (label_id, _) in &record.labels {
                sqlx::query("INSERT INTO labels_fk(item_id, label_id) VALUES(?, ?)")
                    .bind(&record.id)
                    .bind(label_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// All subscriptions, sorted by title.
    pub async fn subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        let subs = sqlx::query_as::<_, Subscription>(
            "SELECT id, url, title FROM subscriptions ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subs)
    }

    /// All labels, sorted by name.
    pub async fn labels(&self) -> Result<Vec<Label>, StoreError> {
        let labels = sqlx::query_as::<_, Label>("SELECT id, name FROM labels ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(labels)
    }

    /// Label ids attached to one subscription.
    pub async fn labels_for_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT label_id FROM labels_fk WHERE item_id=? ORDER BY label_id")
                .bind(subscription_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
