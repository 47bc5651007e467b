use sqlx::{QueryBuilder, Sqlite, Transaction};

use super::schema::Store;
use super::types::{PendingFlag, StateTag, StoreError};

const BIND_CHUNK: usize = 500;

impl Store {
    // ========================================================================
    // Pending flag queue
    // ========================================================================

    /// Queues a state mutation for delivery to remote.
    ///
    /// At most one pending row exists per `(item_id, flag)`: a newer
    /// mutation overwrites the queued `remove` value, so star-then-unstar
    /// before a sync collapses to a single row carrying the latest intent.
    pub async fn queue_flag(
        &self,
        item_id: i64,
        flag: StateTag,
        remove: bool,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        queue_flag_tx(&mut tx, item_id, flag, remove).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Pending rows for one `(flag, remove)` combination, oldest first.
    pub async fn pending_flags(
        &self,
        flag: StateTag,
        remove: bool,
    ) -> Result<Vec<PendingFlag>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, i64, String, bool)>(
            "SELECT id, item_id, flag, remove FROM flags WHERE flag=? AND remove=? ORDER BY id",
        )
        .bind(flag.tag())
        .bind(remove)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, item_id, flag, remove)| PendingFlag {
                id,
                item_id,
                flag,
                remove,
            })
            .collect())
    }

    /// Deletes acknowledged pending rows. Called only after the remote batch
    /// they were part of returned success.
    pub async fn delete_flags(&self, row_ids: &[i64]) -> Result<(), StoreError> {
        for chunk in row_ids.chunks(BIND_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM flags WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            builder.build().execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn pending_flag_count(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(id) FROM flags")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    // ========================================================================
    // User actions
    // ========================================================================

    /// Marks an item read locally and queues the mutation for remote.
    pub async fn mark_read(&self, item_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE items SET unread=0 WHERE id=?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        queue_flag_tx(&mut tx, item_id, StateTag::Read, false).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Marks an item unread again. Remote needs both edits: the read tag
    /// removed and kept-unread added, otherwise the item drops out of the
    /// unread listing on its side.
    pub async fn mark_unread(&self, item_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE items SET unread=1 WHERE id=?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        queue_flag_tx(&mut tx, item_id, StateTag::Read, true).await?;
        queue_flag_tx(&mut tx, item_id, StateTag::KeptUnread, false).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Stars or unstars an item locally and queues the mutation.
    pub async fn set_starred(&self, item_id: i64, starred: bool) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE items SET starred=? WHERE id=?")
            .bind(starred)
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        queue_flag_tx(&mut tx, item_id, StateTag::Starred, !starred).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn queue_flag_tx(
    tx: &mut Transaction<'_, Sqlite>,
    item_id: i64,
    flag: StateTag,
    remove: bool,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO flags (item_id, flag, remove)
        VALUES (?, ?, ?)
        ON CONFLICT(item_id, flag) DO UPDATE SET remove = excluded.remove
    "#,
    )
    .bind(item_id)
    .bind(flag.tag())
    .bind(remove)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
