use haven_test_utils::*;
use serde_json::json;

fn create_record_body(did: &str) -> serde_json::Value {
    json!({
        "repo": did,
        "collection": "app.bsky.feed.post",
        "record": {
            "$type": "app.bsky.feed.post",
            "text": "auth test",
            "createdAt": "2025-01-01T00:00:00Z",
        }
    })
}

#[tokio::test]
async fn missing_auth_header_401() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        None,
        Some(create_record_body("did:plc:unused")),
    )
    .await;
    assert_xrpc_error(status, &body, 401, "AuthenticationRequired");
}

#[tokio::test]
async fn malformed_bearer_401() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        Some("totally-not-a-jwt"),
        Some(create_record_body("did:plc:unused")),
    )
    .await;
    assert_xrpc_error(status, &body, 401, "AuthenticationRequired");
}

#[tokio::test]
async fn expired_token_401() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": "did:plc:expired",
        "iat": now - 7200,
        "exp": now - 3600,
    });
    let key = jsonwebtoken::EncodingKey::from_secret(TEST_ACCESS_SECRET.as_bytes());
    let token = jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &key).unwrap();

    let (status, body) = send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        Some(&token),
        Some(create_record_body("did:plc:expired")),
    )
    .await;
    assert_xrpc_error(status, &body, 401, "AuthenticationRequired");
}

#[tokio::test]
async fn valid_token_authenticates_as_its_subject() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "auth.test.pds.local", TEST_HOST).await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        Some(&actor.access_jwt),
        Some(create_record_body(&actor.did)),
    )
    .await;
    assert_xrpc_ok(status, &body);
}

#[tokio::test]
async fn valid_token_for_a_different_repo_is_forbidden_not_unauthorized() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "owner.test.pds.local", TEST_HOST).await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(
        &router,
        "POST",
        "/xrpc/com.atproto.repo.createRecord",
        TEST_HOST,
        Some(&actor.access_jwt),
        Some(create_record_body("did:plc:someone-else")),
    )
    .await;
    assert_xrpc_error(status, &body, 403, "AuthorizationError");
}
