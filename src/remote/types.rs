use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

// ============================================================================
// Id listings (stream/items/ids)
// ============================================================================

/// The three id streams the reader API exposes.
///
/// `Unread` is served as "reading list minus read state"; the server applies
/// the exclusion filter, the client still re-intersects with the reading list
/// on reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStream {
    ReadingList,
    Unread,
    Starred,
}

impl IdStream {
    pub const ALL: [IdStream; 3] = [IdStream::ReadingList, IdStream::Unread, IdStream::Starred];

    /// Query filter pairs for `stream/items/ids`.
    pub fn query(self) -> &'static [(&'static str, &'static str)] {
        match self {
            IdStream::ReadingList => &[("s", "user/-/state/com.google/reading-list")],
            IdStream::Unread => &[
                ("s", "user/-/state/com.google/reading-list"),
                ("xt", "user/-/state/com.google/read"),
            ],
            IdStream::Starred => &[("s", "user/-/state/com.google/starred")],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IdStream::ReadingList => "reading-list",
            IdStream::Unread => "unread",
            IdStream::Starred => "starred",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamIdsResponse {
    #[serde(rename = "itemRefs", default)]
    pub item_refs: Vec<ItemRef>,
}

/// One entry of an id listing: the short id plus the remote freshness marker.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemRef {
    #[serde(deserialize_with = "de_i64")]
    pub id: i64,
    #[serde(rename = "timestampUsec", default, deserialize_with = "de_opt_i64")]
    pub timestamp_usec: Option<i64>,
}

// ============================================================================
// Item contents (stream/items/contents)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StreamContentsResponse {
    #[serde(default)]
    pub items: Vec<RawItem>,
}

/// An item exactly as the remote reports it. Every field beyond `id` and
/// `origin` has been observed missing in the wild; normalization supplies
/// the defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    /// Long opaque id, e.g. `tag:google.com,2005:reader/item/00000000148b9369`.
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Server-reported update time, seconds since epoch.
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub updated: Option<i64>,
    /// Crawl time, microseconds since epoch.
    #[serde(rename = "timestampUsec", default, deserialize_with = "de_opt_i64")]
    pub timestamp_usec: Option<i64>,
    #[serde(default)]
    pub alternate: Vec<Link>,
    #[serde(default)]
    pub summary: Option<ContentBlock>,
    #[serde(default)]
    pub content: Option<ContentBlock>,
    pub origin: Origin,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Origin {
    #[serde(rename = "streamId")]
    pub stream_id: String,
    #[serde(rename = "htmlUrl", default)]
    pub html_url: Option<String>,
}

// ============================================================================
// Subscriptions (subscription/list, subscription/quickadd)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubscriptionListResponse {
    #[serde(default)]
    pub subscriptions: Vec<RawSubscription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSubscription {
    /// Stream id, e.g. `feed/http://example.com/rss`.
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Site url; doubles as the favicon key. Some subscriptions lack it.
    #[serde(rename = "htmlUrl", default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub categories: Vec<RawCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCategory {
    /// Full label id, e.g. `user/12345/label/Linux`.
    pub id: String,
    pub label: String,
}

impl RawCategory {
    /// Strips the user prefix: `user/12345/label/Linux` → `label/Linux`.
    pub fn short_id(&self) -> &str {
        self.id.splitn(3, '/').last().unwrap_or(&self.id)
    }
}

#[derive(Debug, Deserialize)]
pub struct QuickAddResponse {
    #[serde(rename = "streamId", default)]
    pub stream_id: Option<String>,
}

// ============================================================================
// Lenient i64 decoding
// ============================================================================

// The reader API is inconsistent about numeric fields: ids and timestamps
// arrive as JSON strings on some endpoints and as numbers on others.
fn de_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct I64Visitor;

    impl Visitor<'_> for I64Visitor {
        type Value = i64;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("an integer or a decimal string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            Ok(v as i64)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            Ok(v as i64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            v.parse().map_err(de::Error::custom)
        }
    }

    deserializer.deserialize_any(I64Visitor)
}

fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "de_i64")] i64);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}
