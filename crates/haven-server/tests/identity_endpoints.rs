use haven_test_utils::*;

#[tokio::test]
async fn resolve_handle_returns_did() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "resolve.test.pds.local", TEST_HOST).await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(
        &router,
        "GET",
        "/xrpc/com.atproto.identity.resolveHandle?handle=resolve.test.pds.local",
        TEST_HOST,
        None,
        None,
    )
    .await;
    assert_xrpc_ok(status, &body);
    assert_eq!(body["did"], actor.did);
}

#[tokio::test]
async fn resolve_handle_is_case_insensitive() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "mixedcase.test.pds.local", TEST_HOST).await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(
        &router,
        "GET",
        "/xrpc/com.atproto.identity.resolveHandle?handle=MixedCase.Test.PDS.Local",
        TEST_HOST,
        None,
        None,
    )
    .await;
    assert_xrpc_ok(status, &body);
    assert_eq!(body["did"], actor.did);
}

#[tokio::test]
async fn resolve_handle_unknown_is_404() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(
        &router,
        "GET",
        "/xrpc/com.atproto.identity.resolveHandle?handle=nobody.test.pds.local",
        TEST_HOST,
        None,
        None,
    )
    .await;
    assert_xrpc_error(status, &body, 404, "HandleNotFound");
}
