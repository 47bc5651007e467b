use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Cache store errors with user-facing messages.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another process has the cache database locked.
    #[error("The cache database is locked by another process. Close it and try again.")]
    Locked,

    /// Migration failed
    #[error("Cache migration failed: {0}")]
    Migration(String),

    /// Content blob I/O failed
    #[error("Content store error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let message = err.to_string().to_lowercase();
        if message.contains("database is locked")
            || message.contains("database table is locked")
            || message.contains("sqlite_busy")
            || message.contains("sqlite_locked")
            || message.contains("unable to open database file")
        {
            return StoreError::Locked;
        }
        StoreError::Database(err)
    }
}

// ============================================================================
// State tags
// ============================================================================

/// The remote state-tag vocabulary pending flag mutations are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateTag {
    Read,
    KeptUnread,
    Starred,
}

impl StateTag {
    pub const ALL: [StateTag; 3] = [StateTag::Read, StateTag::KeptUnread, StateTag::Starred];

    /// Full remote tag, stored verbatim in the flags table.
    pub fn tag(self) -> &'static str {
        match self {
            StateTag::Read => "user/-/state/com.google/read",
            StateTag::KeptUnread => "user/-/state/com.google/kept-unread",
            StateTag::Starred => "user/-/state/com.google/starred",
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// UI-facing view of a cached item. The sync control bits (`to_sync`,
/// `to_delete`, `update_time`) are deliberately absent.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub href: Option<String>,
    pub subscription: Option<String>,
    /// Microseconds since epoch.
    pub time: i64,
    pub unread: bool,
    pub starred: bool,
}

/// Normalized metadata written back by the item synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUpdate {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub summary: String,
    pub href: String,
    pub subscription: String,
    /// Microseconds since epoch.
    pub time: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub id: String,
    /// Site html url; also the favicon key. Some subscriptions lack one.
    pub url: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Snapshot row handed to the subscription full-replace.
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    pub id: String,
    pub url: Option<String>,
    pub title: String,
    /// `(label_id, label_name)` memberships.
    pub labels: Vec<(String, String)>,
}

/// One not-yet-acknowledged local state mutation.
#[derive(Debug, Clone)]
pub struct PendingFlag {
    /// Row id; the synchronizer deletes acked rows by this.
    pub id: i64,
    pub item_id: i64,
    pub flag: String,
    pub remove: bool,
}

/// Item listing filter exposed to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    All,
    Unread,
    Starred,
}
