use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use tower::ServiceExt;

use haven_test_utils::*;

async fn get_raw(router: &axum::Router, uri: &str, host: &str) -> (u16, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .header("host", host)
        .body(Body::empty())
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn did_document_names_the_host_service_did() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(&router, "GET", "/.well-known/did.json", TEST_HOST, None, None).await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], format!("did:web:{TEST_HOST}"));
    assert_eq!(body["service"][0]["type"], "AtprotoPersonalDataServer");
}

#[tokio::test]
async fn atproto_did_for_exact_host_returns_service_did() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, text) = get_raw(&router, "/.well-known/atproto-did", TEST_HOST).await;
    assert_eq!(status, 200);
    assert_eq!(text, format!("did:web:{TEST_HOST}"));
}

#[tokio::test]
async fn atproto_did_for_actor_subdomain_returns_actor_did() {
    let test_store = create_test_store().await;
    let actor = provision_actor(&test_store.store, "subdomain.test.pds.local", TEST_HOST).await;
    let router = create_test_router(test_store.store);

    let (status, text) = get_raw(&router, "/.well-known/atproto-did", "subdomain.test.pds.local").await;
    assert_eq!(status, 200);
    assert_eq!(text, actor.did);
}

#[tokio::test]
async fn atproto_did_for_unknown_handle_is_no_content() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, text) = get_raw(&router, "/.well-known/atproto-did", "nobody.test.pds.local").await;
    assert_eq!(status, 204);
    assert!(text.is_empty());
}

#[tokio::test]
async fn oauth_protected_resource_metadata() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(&router, "GET", "/.well-known/oauth-protected-resource", TEST_HOST, None, None).await;
    assert_eq!(status, 200);
    assert_eq!(body["resource"], format!("https://{TEST_HOST}"));
    assert_eq!(body["scopes_supported"][0], "atproto");
}

#[tokio::test]
async fn oauth_authorization_server_metadata() {
    let test_store = create_test_store().await;
    let router = create_test_router(test_store.store);

    let (status, body) = send_request(&router, "GET", "/.well-known/oauth-authorization-server", TEST_HOST, None, None).await;
    assert_eq!(status, 200);
    assert_eq!(body["issuer"], format!("https://{TEST_HOST}"));
    assert!(body["grant_types_supported"].as_array().unwrap().contains(&serde_json::json!("authorization_code")));
}
