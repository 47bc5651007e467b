use std::path::PathBuf;

use super::types::StoreError;

/// Out-of-row storage for item bodies.
///
/// One file per item, named by the decimal short id. Bodies are large HTML
/// payloads; keeping them off the relational rows keeps item listings cheap.
#[derive(Debug, Clone)]
pub struct ContentStore {
    dir: PathBuf,
}

impl ContentStore {
    /// Creates the blob directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, item_id: i64) -> PathBuf {
        self.dir.join(item_id.to_string())
    }

    /// Writes an item body, replacing any previous one. An empty body is
    /// written too — a refetch that produced nothing must not leave the old
    /// payload behind.
    pub async fn write(&self, item_id: i64, body: &str) -> Result<(), StoreError> {
        tokio::fs::write(self.path(item_id), body).await?;
        Ok(())
    }

    /// Reads an item body; `None` if it was never fetched or already
    /// collected.
    pub async fn read(&self, item_id: i64) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path(item_id)).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes one body; missing files are fine (the row may predate its
    /// content fetch).
    pub async fn remove(&self, item_id: i64) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path(item_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes a batch of bodies, logging rather than failing on individual
    /// errors — garbage collection must not abort halfway through.
    pub async fn remove_many(&self, item_ids: &[i64]) {
        for &id in item_ids {
            if let Err(e) = self.remove(id).await {
                tracing::warn!(item_id = id, error = %e, "failed to remove content blob");
            }
        }
    }
}
