//! Tests for the offline mutation path: user actions queue durable pending
//! flags, the flag synchronizer drains them in batches, and failures keep
//! the queue intact for the next pass.

use std::sync::Arc;

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tidings::remote::{Authenticator, Remote};
use tidings::store::{StateTag, Store};
use tidings::sync::FlagSynchronizer;

struct Harness {
    server: MockServer,
    store: Store,
    flags: FlagSynchronizer,
    _tmp: tempfile::TempDir,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("cache.db");
    let store = Store::open(db_path.to_str().unwrap()).await.unwrap();

    let base = Url::parse(&format!("{}/reader/api/0/", server.uri())).unwrap();
    let remote = Arc::new(
        Remote::new(base, Authenticator::new(SecretString::from("login-token"))).unwrap(),
    );
    let flags = FlagSynchronizer::new(remote, store.clone());

    Harness {
        server,
        store,
        flags,
        _tmp: tmp,
    }
}

async fn seed_items(store: &Store, count: i64) {
    let refs: Vec<(i64, i64)> = (1..=count).map(|id| (id, 100)).collect();
    store.reconcile_ids(&refs, &[], &[]).await.unwrap();
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/reader/api/0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("edit-tok"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_acked_batch_deletes_pending_rows() {
    let h = harness().await;
    seed_items(&h.store, 2).await;
    h.store.mark_read(1).await.unwrap();
    h.store.mark_read(2).await.unwrap();

    mount_token(&h.server).await;
    Mock::given(method("POST"))
        .and(path("/reader/api/0/edit-tag"))
        .and(body_string_contains("T=edit-tok"))
        .and(body_string_contains("a=user%2F-%2Fstate%2Fcom.google%2Fread"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&h.server)
        .await;

    let stats = h.flags.sync().await.unwrap();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.acked, 2);
    assert_eq!(stats.failed_batches, 0);
    assert_eq!(h.store.pending_flag_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_251_pending_flags_go_out_in_two_batches() {
    let h = harness().await;
    seed_items(&h.store, 251).await;
    for id in 1..=251 {
        h.store.mark_read(id).await.unwrap();
    }

    mount_token(&h.server).await;
    Mock::given(method("POST"))
        .and(path("/reader/api/0/edit-tag"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(2)
        .mount(&h.server)
        .await;

    let stats = h.flags.sync().await.unwrap();
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.acked, 251);
    assert_eq!(h.store.pending_flag_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_batch_stays_queued() {
    let h = harness().await;
    seed_items(&h.store, 1).await;
    h.store.set_starred(1, true).await.unwrap();

    mount_token(&h.server).await;
    Mock::given(method("POST"))
        .and(path("/reader/api/0/edit-tag"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let stats = h.flags.sync().await.unwrap();
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(stats.acked, 0);
    // Not acknowledged, not deleted: re-sent on the next pass.
    assert_eq!(h.store.pending_flag_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_forbidden_batch_invalidates_edit_token() {
    let h = harness().await;
    seed_items(&h.store, 1).await;
    h.store.mark_read(1).await.unwrap();

    // Two passes, each fetching a token: the 403 on the first pass must
    // invalidate the cached token so the second pass fetches a fresh one.
    Mock::given(method("GET"))
        .and(path("/reader/api/0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("edit-tok"))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/reader/api/0/edit-tag"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&h.server)
        .await;

    let stats = h.flags.sync().await.unwrap();
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(h.store.pending_flag_count().await.unwrap(), 1);

    let stats = h.flags.sync().await.unwrap();
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(h.store.pending_flag_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_star_then_unstar_sends_single_remove() {
    let h = harness().await;
    seed_items(&h.store, 1).await;
    h.store.set_starred(1, true).await.unwrap();
    h.store.set_starred(1, false).await.unwrap();

    mount_token(&h.server).await;
    // Exactly one batch goes out, and it is a remove ("r=...starred").
    Mock::given(method("POST"))
        .and(path("/reader/api/0/edit-tag"))
        .and(body_string_contains("r=user%2F-%2Fstate%2Fcom.google%2Fstarred"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&h.server)
        .await;

    let stats = h.flags.sync().await.unwrap();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.acked, 1);
}

#[tokio::test]
async fn test_nothing_pending_makes_no_requests() {
    let h = harness().await;
    seed_items(&h.store, 1).await;

    // No token fetch, no edit-tag: the server expects zero requests.
    let stats = h.flags.sync().await.unwrap();
    assert_eq!(stats.batches, 0);
    assert_eq!(stats.acked, 0);
    assert_eq!(stats.failed_batches, 0);
    assert!(h.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_unread_round_trip() {
    let h = harness().await;
    h.store.reconcile_ids(&[(1, 100)], &[1], &[]).await.unwrap();
    h.store.mark_read(1).await.unwrap();
    h.store.mark_unread(1).await.unwrap();

    assert_eq!(h.store.unread_count().await.unwrap(), 1);
    // Coalesced to: read-remove plus kept-unread-add.
    assert_eq!(
        h.store
            .pending_flags(StateTag::Read, true)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        h.store
            .pending_flags(StateTag::KeptUnread, false)
            .await
            .unwrap()
            .len(),
        1
    );

    mount_token(&h.server).await;
    Mock::given(method("POST"))
        .and(path("/reader/api/0/edit-tag"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(2)
        .mount(&h.server)
        .await;

    let stats = h.flags.sync().await.unwrap();
    assert_eq!(stats.batches, 2);
    assert_eq!(h.store.pending_flag_count().await.unwrap(), 0);
}
