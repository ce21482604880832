use std::time::Duration;

use haven_server::build_router;
use haven_test_utils::*;
use serde_json::json;

#[tokio::test]
async fn subscriber_receives_event_after_create_record() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "fire.test.pds.local", TEST_HOST).await;
    let state = create_test_app_state(test_store.store, Vec::new());
    let router = build_router(state.clone());

    let (_id, mut rx) = state.firehose.register(None).await;

    let (status, _) = send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        Some(&actor.access_jwt),
        Some(json!({
            "repo": actor.did,
            "collection": "app.bsky.feed.post",
            "record": { "$type": "app.bsky.feed.post", "text": "firehose test", "createdAt": "2025-01-01T00:00:00Z" }
        })),
    )
    .await;
    assert_eq!(status, 200);

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("subscriber should receive an event before the timeout")
        .expect("dispatcher channel should not close");
    assert_eq!(event.repo, actor.did);
    assert_eq!(event.pds_host, TEST_HOST);
    assert!(!event.commit.is_empty());
    assert_eq!(event.ops.len(), 1);
}

#[tokio::test]
async fn subscriber_with_host_filter_ignores_other_hosts() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "filtered.test.pds.local", TEST_HOST).await;
    let state = create_test_app_state(test_store.store, Vec::new());
    let router = build_router(state.clone());

    let (_id, mut rx) = state.firehose.register(Some("someone-elses-host.example".to_string())).await;

    send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        Some(&actor.access_jwt),
        Some(json!({
            "repo": actor.did,
            "collection": "app.bsky.feed.post",
            "record": { "$type": "app.bsky.feed.post", "text": "not for you", "createdAt": "2025-01-01T00:00:00Z" }
        })),
    )
    .await;

    let result = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(result.is_err(), "subscriber filtered to another host should not see this event");
}

#[tokio::test]
async fn deregistered_subscriber_stops_receiving() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "degone.test.pds.local", TEST_HOST).await;
    let state = create_test_app_state(test_store.store, Vec::new());
    let router = build_router(state.clone());

    let (id, mut rx) = state.firehose.register(None).await;
    state.firehose.deregister(id).await;

    send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        Some(&actor.access_jwt),
        Some(json!({
            "repo": actor.did,
            "collection": "app.bsky.feed.post",
            "record": { "$type": "app.bsky.feed.post", "text": "after deregister", "createdAt": "2025-01-01T00:00:00Z" }
        })),
    )
    .await;

    let result = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(result.is_err(), "deregistered subscriber should not be woken");
}

#[tokio::test]
async fn multiple_subscribers_each_get_their_own_copy() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "multi.test.pds.local", TEST_HOST).await;
    let state = create_test_app_state(test_store.store, Vec::new());
    let router = build_router(state.clone());

    let (_id_a, mut rx_a) = state.firehose.register(None).await;
    let (_id_b, mut rx_b) = state.firehose.register(None).await;

    send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        Some(&actor.access_jwt),
        Some(json!({
            "repo": actor.did,
            "collection": "app.bsky.feed.post",
            "record": { "$type": "app.bsky.feed.post", "text": "fan out", "createdAt": "2025-01-01T00:00:00Z" }
        })),
    )
    .await;

    let event_a = tokio::time::timeout(Duration::from_secs(5), rx_a.recv()).await.unwrap().unwrap();
    let event_b = tokio::time::timeout(Duration::from_secs(5), rx_b.recv()).await.unwrap().unwrap();
    assert_eq!(event_a.seq, event_b.seq);
    assert_eq!(event_a.repo, actor.did);
}
