use haven_test_utils::{TEST_HOST, assert_xrpc_ok, create_test_router, create_test_store, send_request};

#[tokio::test]
async fn health_returns_200() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(&router, "GET", "/xrpc/_health", TEST_HOST, None, None).await;
    assert_xrpc_ok(status, &body);
    assert_eq!(body["version"], "0.1.0");
}
