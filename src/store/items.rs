use sqlx::QueryBuilder;

use super::schema::Store;
use super::types::{Category, Item, ItemUpdate, StoreError};

/// Chunk size for `IN (...)` bind lists, kept well under SQLite's 999
/// parameter limit.
const BIND_CHUNK: usize = 500;

impl Store {
    // ========================================================================
    // Id reconciliation
    // ========================================================================

    /// Applies one id-sync pass in a single transaction.
    ///
    /// `refs` is the union of every id reported by the three listings with
    /// the newest freshness marker seen for it; `unread` and `starred` are
    /// the final flag sets (the caller has already intersected unread with
    /// the reading list). The sequence is: tombstone everything, revive and
    /// dirty-mark what remote still reports, reflag. Nothing is visible
    /// outside the transaction until commit, so a reader never observes a
    /// half-tombstoned cache.
    pub async fn reconcile_ids(
        &self,
        refs: &[(i64, i64)],
        unread: &[i64],
        starred: &[i64],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Tombstone everything and drop all flag bits; whatever remote still
        // reports gets revived below.
        sqlx::query("UPDATE items SET to_delete=1, unread=0, starred=0, to_sync=0")
            .execute(&mut *tx)
            .await?;

        for chunk in refs.chunks(BIND_CHUNK) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO items(id) ");
            builder.push_values(chunk, |mut b, (id, _)| {
                b.push_bind(id);
            });
            builder.build().execute(&mut *tx).await?;

            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("UPDATE items SET to_delete=0 WHERE id IN (");
            let mut separated = builder.separated(", ");
            for (id, _) in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            builder.build().execute(&mut *tx).await?;
        }

        // An item goes dirty only when remote reports a strictly newer
        // freshness marker than the one cached; unchanged items skip the
        // content refetch entirely.
        for (id, update_time) in refs {
            sqlx::query(
                "UPDATE items SET to_sync=1, update_time=? WHERE id=? AND update_time < ?",
            )
            .bind(update_time)
            .bind(id)
            .bind(update_time)
            .execute(&mut *tx)
            .await?;
        }

        for (column, ids) in [("unread", unread), ("starred", starred)] {
            for chunk in ids.chunks(BIND_CHUNK) {
                let mut builder: QueryBuilder<sqlx::Sqlite> =
                    QueryBuilder::new(format!("UPDATE items SET {column}=1 WHERE id IN ("));
                let mut separated = builder.separated(", ");
                for id in chunk {
                    separated.push_bind(id);
                }
                separated.push_unseparated(")");
                builder.build().execute(&mut *tx).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Ids whose content and metadata need a refetch.
    pub async fn dirty_ids(&self) -> Result<Vec<i64>, StoreError> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM items WHERE to_sync=1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // ========================================================================
    // Metadata persistence
    // ========================================================================

    /// Upserts normalized metadata and clears the dirty bit, all in one
    /// transaction. `unread`, `starred`, `to_delete` and `update_time` are
    /// left untouched — those belong to the id reconciliation.
    pub async fn apply_item_updates(&self, updates: &[ItemUpdate]) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for update in updates {
            sqlx::query(
                r#"
                INSERT INTO items (id, title, author, summary, href, subscription, time, to_sync)
                VALUES (?, ?, ?, ?, ?, ?, ?, 0)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    author = excluded.author,
                    summary = excluded.summary,
                    href = excluded.href,
                    subscription = excluded.subscription,
                    time = excluded.time,
                    to_sync = 0
            "#,
            )
            .bind(update.id)
            .bind(&update.title)
            .bind(&update.author)
            .bind(&update.summary)
            .bind(&update.href)
            .bind(&update.subscription)
            .bind(update.time)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Garbage collection
    // ========================================================================

    /// Removes every tombstoned, non-starred item and returns the removed
    /// ids so the caller can drop their content blobs. Starred items survive
    /// tombstoning — starring pins an item against eviction.
    pub async fn collect_garbage(&self) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM items WHERE to_delete=1 AND starred=0")
                .fetch_all(&mut *tx)
                .await?;
        sqlx::query("DELETE FROM items WHERE to_delete=1 AND starred=0")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Bounds the cache to `cap` non-starred items, evicting oldest-first.
    /// Returns the evicted ids for blob removal.
    pub async fn evict_over_cap(&self, cap: i64) -> Result<Vec<i64>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM items
            WHERE starred=0
            ORDER BY time DESC
            LIMIT -1 OFFSET ?
        "#,
        )
        .bind(cap)
        .fetch_all(&mut *tx)
        .await?;

        for chunk in rows.chunks(BIND_CHUNK) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("DELETE FROM items WHERE id IN (");
            let mut separated = builder.separated(", ");
            for (id,) in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn unread_count(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(id) FROM items WHERE unread=1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn item(&self, id: i64) -> Result<Option<Item>, StoreError> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, title, author, summary, href, subscription, time, unread, starred
            FROM items WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Items in a category, newest first.
    pub async fn items_by_category(&self, category: Category) -> Result<Vec<Item>, StoreError> {
        let filter = match category {
            Category::All => "",
            Category::Unread => "WHERE unread=1",
            Category::Starred => "WHERE starred=1",
        };
        let items = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT id, title, author, summary, href, subscription, time, unread, starred
            FROM items {filter} ORDER BY time DESC
        "#,
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Items belonging to one subscription, newest first.
    pub async fn items_by_subscription(&self, stream_id: &str) -> Result<Vec<Item>, StoreError> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, title, author, summary, href, subscription, time, unread, starred
            FROM items WHERE subscription = ? ORDER BY time DESC
        "#,
        )
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Items belonging to any subscription carrying the given label.
    pub async fn items_by_label(&self, label_id: &str) -> Result<Vec<Item>, StoreError> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT items.id, items.title, items.author, items.summary, items.href,
                   items.subscription, items.time, items.unread, items.starred
            FROM labels_fk
            INNER JOIN items ON items.subscription = labels_fk.item_id
            WHERE labels_fk.label_id = ?
            ORDER BY items.time DESC
        "#,
        )
        .bind(label_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}
