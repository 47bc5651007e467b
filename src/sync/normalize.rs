use crate::remote::RawItem;
use crate::store::ItemUpdate;
use crate::util::{html_to_text, truncate_chars};

/// Placeholder title for items the remote reports without one.
pub const UNTITLED: &str = "Untitled";
/// Placeholder author. Plenty of feeds omit the author entirely.
pub const UNKNOWN_AUTHOR: &str = "Stranger";
/// Character budget for the list-view summary, ellipsis included.
pub const SUMMARY_BUDGET: usize = 140;

/// A raw remote item reduced to what the cache stores: the metadata row and
/// the out-of-row HTML body.
#[derive(Debug, Clone)]
pub struct NormalizedItem {
    pub update: ItemUpdate,
    pub body: String,
}

/// Derives the canonical short id from a remote item id.
///
/// Long ids end in a 16-hex-digit suffix
/// (`tag:google.com,2005:reader/item/00000000148b9369`); the suffix decodes
/// base-16 into a signed 64-bit integer, two's complement, so suffixes with
/// the top bit set come out negative. Ids without a `/` are already short
/// and parse as plain decimal.
pub fn short_id(item_id: &str) -> Option<i64> {
    match item_id.rsplit_once('/') {
        None => item_id.parse().ok(),
        Some((_, suffix)) => u64::from_str_radix(suffix, 16).ok().map(|v| v as i64),
    }
}

/// Normalizes one raw item, degrading gracefully on every optional field.
///
/// Returns `None` only when the remote id cannot be decoded — such an item
/// has no place in the cache at all.
pub fn normalize(raw: &RawItem) -> Option<NormalizedItem> {
    let id = short_id(&raw.id)?;

    let body = raw
        .summary
        .as_ref()
        .map(|block| block.content.clone())
        .or_else(|| raw.content.as_ref().map(|block| block.content.clone()))
        .unwrap_or_default();

    // An empty refetch must clear any stale summary, hence the explicit
    // empty string rather than skipping the field.
    let summary = if body.is_empty() {
        String::new()
    } else {
        truncate_chars(&html_to_text(&body), SUMMARY_BUDGET).into_owned()
    };

    let title = match &raw.title {
        // Feeds put markup in titles; strip and unescape it.
        Some(title) => html_to_text(title),
        None => UNTITLED.to_string(),
    };

    let author = match &raw.author {
        Some(author) => html_to_text(author),
        None => UNKNOWN_AUTHOR.to_string(),
    };

    let href = raw
        .alternate
        .first()
        .map(|link| link.href.clone())
        .or_else(|| raw.origin.html_url.clone())
        .unwrap_or_default();

    Some(NormalizedItem {
        update: ItemUpdate {
            id,
            title,
            author,
            summary,
            href,
            subscription: raw.origin.stream_id.clone(),
            time: item_time(raw.timestamp_usec, raw.updated),
        },
        body,
    })
}

/// Resolves the item timestamp in microseconds.
///
/// The crawl timestamp is finer-grained but reflects when the crawler saw
/// the item, which can postdate the real update under clock skew — so the
/// earlier of the two candidates wins.
fn item_time(crawl_usec: Option<i64>, updated_sec: Option<i64>) -> i64 {
    let updated_usec = updated_sec.map(|s| s.saturating_mul(1_000_000));
    match (crawl_usec, updated_usec) {
        (Some(crawl), Some(updated)) => crawl.min(updated),
        (Some(crawl), None) => crawl,
        (None, Some(updated)) => updated,
        (None, None) => 0,
    }
}
