//! End-to-end tests of the sync pipeline against a mocked reader API.
//!
//! Each test spins up a wiremock server playing the remote service, a
//! file-backed cache in a scratch directory, and drives the real
//! synchronizers through it.

use std::sync::Arc;

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tidings::remote::{Authenticator, Remote};
use tidings::store::{Category, ContentStore, Store};
use tidings::sync::{ItemSynchronizer, Syncer, UNKNOWN_AUTHOR, UNTITLED};

const READING_LIST: &str = "user/-/state/com.google/reading-list";
const READ: &str = "user/-/state/com.google/read";
const STARRED: &str = "user/-/state/com.google/starred";

struct Harness {
    server: MockServer,
    store: Store,
    content: ContentStore,
    remote: Arc<Remote>,
    syncer: Syncer,
    _tmp: tempfile::TempDir,
}

async fn harness(cache_items: u32) -> Harness {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();

    let db_path = tmp.path().join("cache.db");
    let store = Store::open(db_path.to_str().unwrap()).await.unwrap();
    let content = ContentStore::open(tmp.path().join("content")).unwrap();

    let base = Url::parse(&format!("{}/reader/api/0/", server.uri())).unwrap();
    let remote = Arc::new(
        Remote::new(base, Authenticator::new(SecretString::from("login-token"))).unwrap(),
    );
    let syncer = Syncer::new(
        Arc::clone(&remote),
        store.clone(),
        content.clone(),
        cache_items,
    );

    Harness {
        server,
        store,
        content,
        remote,
        syncer,
        _tmp: tmp,
    }
}

fn ids_body(refs: &[(i64, i64)]) -> serde_json::Value {
    serde_json::json!({
        "itemRefs": refs
            .iter()
            .map(|(id, ts)| serde_json::json!({
                "id": id.to_string(),
                "timestampUsec": ts.to_string(),
            }))
            .collect::<Vec<_>>()
    })
}

fn long_id(short: i64) -> String {
    format!("tag:google.com,2005:reader/item/{:016x}", short as u64)
}

fn item_body(short: i64, title: Option<&str>, summary_html: &str) -> serde_json::Value {
    let mut item = serde_json::json!({
        "id": long_id(short),
        "timestampUsec": (1_650_000_000_000_000i64 + short).to_string(),
        "alternate": [{"href": format!("https://example.com/post/{short}")}],
        "summary": {"content": summary_html},
        "origin": {
            "streamId": "feed/https://example.com/rss",
            "htmlUrl": "https://example.com",
        },
    });
    if let Some(title) = title {
        item["title"] = serde_json::Value::from(title);
    }
    item
}

/// Mounts the three id listings.
async fn mount_ids(
    server: &MockServer,
    reading_list: &[(i64, i64)],
    unread: &[(i64, i64)],
    starred: &[(i64, i64)],
) {
    Mock::given(method("GET"))
        .and(path("/reader/api/0/stream/items/ids"))
        .and(query_param("s", READING_LIST))
        .and(query_param_is_missing("xt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ids_body(reading_list)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reader/api/0/stream/items/ids"))
        .and(query_param("s", READING_LIST))
        .and(query_param("xt", READ))
        .respond_with(ResponseTemplate::new(200).set_body_json(ids_body(unread)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reader/api/0/stream/items/ids"))
        .and(query_param("s", STARRED))
        .respond_with(ResponseTemplate::new(200).set_body_json(ids_body(starred)))
        .mount(server)
        .await;
}

async fn mount_contents(server: &MockServer, items: Vec<serde_json::Value>) {
    Mock::given(method("POST"))
        .and(path("/reader/api/0/stream/items/contents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": items
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_pipeline_reconciles_and_fetches() {
    let h = harness(500).await;
    // Unread reports a stray id (9) outside the reading list.
    mount_ids(
        &h.server,
        &[(1, 100), (2, 100), (3, 300)],
        &[(2, 100), (3, 300), (9, 900)],
        &[(3, 300)],
    )
    .await;
    mount_contents(
        &h.server,
        vec![
            item_body(1, Some("First"), "<p>first body</p>"),
            item_body(2, Some("Second"), "<p>second body</p>"),
            item_body(3, Some("Third"), "<p>third body</p>"),
            item_body(9, Some("Stray"), "<p>stray body</p>"),
        ],
    )
    .await;

    let report = h.syncer.sync_all().await.unwrap().unwrap();
    assert!(report.ids_refreshed);
    assert_eq!(report.items.fetched, 4);
    assert_eq!(report.items.failed_chunks, 0);

    // Unread is exactly the intersection with the reading list: {2, 3}.
    let mut unread: Vec<i64> = h
        .store
        .items_by_category(Category::Unread)
        .await
        .unwrap()
        .iter()
        .map(|item| item.id)
        .collect();
    unread.sort();
    assert_eq!(unread, vec![2, 3]);

    let starred: Vec<i64> = h
        .store
        .items_by_category(Category::Starred)
        .await
        .unwrap()
        .iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(starred, vec![3]);

    // Metadata landed and the dirty bits cleared.
    let item = h.store.item(2).await.unwrap().unwrap();
    assert_eq!(item.title.as_deref(), Some("Second"));
    assert_eq!(item.summary.as_deref(), Some("second body"));
    assert_eq!(item.href.as_deref(), Some("https://example.com/post/2"));

    // Bodies live in the blob store.
    assert_eq!(
        h.content.read(1).await.unwrap().as_deref(),
        Some("<p>first body</p>")
    );
}

#[tokio::test]
async fn test_second_pass_is_idempotent_and_skips_refetch() {
    let h = harness(500).await;
    mount_ids(&h.server, &[(1, 100), (2, 200)], &[(1, 100)], &[]).await;
    // The contents endpoint must be hit exactly once: the second pass sees
    // unchanged freshness markers and has nothing dirty.
    Mock::given(method("POST"))
        .and(path("/reader/api/0/stream/items/contents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                item_body(1, Some("One"), "<p>one</p>"),
                item_body(2, Some("Two"), "<p>two</p>"),
            ]
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.syncer.sync_all().await.unwrap().unwrap();
    let unread_first = h.store.unread_count().await.unwrap();

    let report = h.syncer.sync_all().await.unwrap().unwrap();
    assert!(report.ids_refreshed);
    assert_eq!(report.items.fetched, 0);
    assert_eq!(h.store.unread_count().await.unwrap(), unread_first);
    assert_eq!(
        h.store.items_by_category(Category::All).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_failed_id_listing_leaves_cache_untouched() {
    let h = harness(500).await;
    mount_ids(&h.server, &[(1, 100)], &[(1, 100)], &[]).await;
    mount_contents(&h.server, vec![item_body(1, Some("One"), "<p>one</p>")]).await;
    h.syncer.sync_all().await.unwrap().unwrap();
    assert_eq!(h.store.unread_count().await.unwrap(), 1);

    // Remote starts failing: the pass completes but reconciles nothing.
    h.server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;

    let report = h.syncer.sync_all().await.unwrap().unwrap();
    assert!(!report.ids_refreshed);
    assert_eq!(h.store.unread_count().await.unwrap(), 1);
    assert!(h.store.item(1).await.unwrap().is_some());
}

#[tokio::test]
async fn test_items_dropped_by_remote_are_collected() {
    let h = harness(500).await;
    mount_ids(&h.server, &[(1, 100), (2, 100)], &[], &[(2, 100)]).await;
    mount_contents(
        &h.server,
        vec![
            item_body(1, Some("One"), "<p>one</p>"),
            item_body(2, Some("Two"), "<p>two</p>"),
        ],
    )
    .await;
    h.syncer.sync_all().await.unwrap().unwrap();
    assert!(h.content.read(1).await.unwrap().is_some());

    // Next pass: remote only reports the starred item.
    h.server.reset().await;
    mount_ids(&h.server, &[], &[], &[(2, 100)]).await;
    mount_contents(&h.server, vec![]).await;

    let report = h.syncer.sync_all().await.unwrap().unwrap();
    assert_eq!(report.items.collected, 1);
    assert!(h.store.item(1).await.unwrap().is_none());
    assert!(h.store.item(2).await.unwrap().is_some());
    // The collected item's blob went with it.
    assert!(h.content.read(1).await.unwrap().is_none());
    assert!(h.content.read(2).await.unwrap().is_some());
}

#[tokio::test]
async fn test_chunk_boundary_exactly_two_requests_for_251_ids() {
    let h = harness(500).await;
    // 251 dirty ids seeded straight into the store; the item synchronizer
    // must split them 250 + 1.
    let refs: Vec<(i64, i64)> = (1..=251).map(|id| (id, 100)).collect();
    h.store.reconcile_ids(&refs, &[], &[]).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/reader/api/0/stream/items/contents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": []
        })))
        .expect(2)
        .mount(&h.server)
        .await;

    let items = ItemSynchronizer::new(
        Arc::clone(&h.remote),
        h.store.clone(),
        h.content.clone(),
        500,
    );
    let stats = items.sync().await.unwrap();
    assert_eq!(stats.failed_chunks, 0);
    // Mock expectation (exactly 2 requests) is verified on drop.
}

#[tokio::test]
async fn test_failed_chunk_keeps_items_dirty_for_next_pass() {
    let h = harness(500).await;
    h.store
        .reconcile_ids(&[(1, 100), (2, 100)], &[], &[])
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/reader/api/0/stream/items/contents"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let items = ItemSynchronizer::new(
        Arc::clone(&h.remote),
        h.store.clone(),
        h.content.clone(),
        500,
    );
    let stats = items.sync().await.unwrap();
    assert_eq!(stats.failed_chunks, 1);
    assert_eq!(stats.fetched, 0);
    // Still dirty: the next pass re-drives the fetch.
    assert_eq!(h.store.dirty_ids().await.unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_normalization_defaults_flow_into_cache() {
    let h = harness(500).await;
    mount_ids(&h.server, &[(5, 100)], &[], &[]).await;
    mount_contents(&h.server, vec![item_body(5, None, "<p>Hello</p>")]).await;

    h.syncer.sync_all().await.unwrap().unwrap();

    let item = h.store.item(5).await.unwrap().unwrap();
    assert_eq!(item.title.as_deref(), Some(UNTITLED));
    assert_eq!(item.author.as_deref(), Some(UNKNOWN_AUTHOR));
    assert_eq!(item.summary.as_deref(), Some("Hello"));
}

#[tokio::test]
async fn test_cache_cap_bounds_non_starred_items() {
    let h = harness(2).await;
    // Four items, newest last; item 4 is starred and exempt from the cap.
    mount_ids(
        &h.server,
        &[(1, 100), (2, 100), (3, 100), (4, 100)],
        &[],
        &[(4, 100)],
    )
    .await;
    mount_contents(
        &h.server,
        (1..=4)
            .map(|id| item_body(id, Some(&format!("Item {id}")), "<p>body</p>"))
            .collect(),
    )
    .await;

    let report = h.syncer.sync_all().await.unwrap().unwrap();
    assert_eq!(report.items.evicted, 1);

    let all = h.store.items_by_category(Category::All).await.unwrap();
    let non_starred = all.iter().filter(|item| !item.starred).count();
    assert!(non_starred <= 2);
    // Oldest non-starred item went first.
    assert!(h.store.item(1).await.unwrap().is_none());
    assert!(h.store.item(4).await.unwrap().is_some());
}

#[tokio::test]
async fn test_subscription_snapshot_full_replace() {
    let h = harness(500).await;
    Mock::given(method("GET"))
        .and(path("/reader/api/0/subscription/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "subscriptions": [
                {
                    "id": "feed/https://a.example/rss",
                    "title": "Alpha",
                    "htmlUrl": "https://a.example",
                    "categories": [{"id": "user/1/label/Tech", "label": "Tech"}]
                },
                {
                    "id": "feed/https://b.example/rss",
                    "title": "Beta",
                    "categories": []
                }
            ]
        })))
        .mount(&h.server)
        .await;

    assert!(h.syncer.sync_subscriptions().await.unwrap());

    let subs = h.store.subscriptions().await.unwrap();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].title, "Alpha");
    assert!(subs[1].url.is_none());
    assert_eq!(
        h.store
            .labels_for_subscription("feed/https://a.example/rss")
            .await
            .unwrap(),
        vec!["label/Tech"]
    );

    // A failing refresh keeps the previous snapshot.
    h.server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    assert!(!h.syncer.sync_subscriptions().await.unwrap());
    assert_eq!(h.store.subscriptions().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_subscribe_and_label_edit() {
    let h = harness(500).await;
    Mock::given(method("GET"))
        .and(path("/reader/api/0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("edit-tok"))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/reader/api/0/subscription/quickadd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "streamId": "feed/https://new.example/rss"
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/reader/api/0/subscription/edit"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&h.server)
        .await;

    let subs = h.syncer.subscriptions();
    assert!(subs.subscribe("https://new.example/rss").await);
    assert!(
        subs.set_label("feed/https://new.example/rss", "label/Tech", true)
            .await
    );

    // The server refusing the add (no stream created) reads as failure.
    h.server.reset().await;
    Mock::given(method("GET"))
        .and(path("/reader/api/0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("edit-tok"))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/reader/api/0/subscription/quickadd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&h.server)
        .await;
    assert!(!h.syncer.subscriptions().subscribe("not-a-feed").await);
}
