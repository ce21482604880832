use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use haven_core::config::{AppConfig, AppviewConfig, HostConfig, JwtConfig, StoreConfig};
use haven_core::keys::{actor_did_key, actor_email_key, actor_handle_key, repo_head_key};
use haven_core::store::{Store, StoreTx};
use haven_core::{AccountStatus, Actor, RepoHead};
use haven_crypto::{SigningKey, create_access_token, create_did_plc_operation, hash_password};
use haven_server::{AppState, AppviewProxy, FirehoseHandle, build_router};
use haven_store_sqlite::SqliteStore;

pub const TEST_HOST: &str = "test.pds.local";
pub const TEST_USER_DOMAIN: &str = "test.pds.local";
pub const TEST_ACCESS_SECRET: &str = "test-access-secret-at-least-32-chars-long";
pub const TEST_PASSWORD: &str = "hunter2-test-password";

/// Builds a one-host `AppConfig` matching [`TEST_HOST`], with `user_domains`
/// covering handle subdomains of that host (e.g. `alice.test.pds.local`).
pub fn create_test_config(appview_backends: Vec<String>) -> AppConfig {
    let mut hosts = HashMap::new();
    hosts.insert(
        TEST_HOST.to_string(),
        HostConfig {
            service_did: format!("did:web:{TEST_HOST}"),
            jwt_signing_key: "unused-in-tests".to_string(),
            user_domains: vec![TEST_USER_DOMAIN.to_string()],
            contact_email: Some("support@test.pds.local".to_string()),
            privacy_policy: None,
            terms_of_service: None,
        },
    );
    AppConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        hosts,
        store: StoreConfig { url: String::new() },
        appview: AppviewConfig {
            backends: appview_backends,
        },
        jwt: JwtConfig {
            access_secret: TEST_ACCESS_SECRET.to_string(),
        },
    }
}

pub fn create_test_app_state(store: SqliteStore, appview_backends: Vec<String>) -> AppState<SqliteStore> {
    let firehose = FirehoseHandle::spawn(store.clone());
    let appview = AppviewProxy::new(appview_backends.clone());
    appview.spawn_health_checks();
    AppState::new(store, Arc::new(create_test_config(appview_backends)), firehose, appview)
}

pub fn create_test_router(store: SqliteStore) -> Router {
    build_router(create_test_app_state(store, Vec::new()))
}

pub fn create_test_router_with_appview(store: SqliteStore, appview_backends: Vec<String>) -> Router {
    build_router(create_test_app_state(store, appview_backends))
}

pub struct ProvisionedActor {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
}

/// Provisions an actor directly against the store: a genesis repo, an
/// `actors/did`/`actors/handle`/`actors/email` index entry, and a matching
/// access JWT. There is no `createAccount` endpoint in this core (see
/// DESIGN.md), so tests stand up actors the way the Store's source of
/// truth expects rather than through HTTP.
pub async fn provision_actor(store: &SqliteStore, handle: &str, host: &str) -> ProvisionedActor {
    let signing_key = SigningKey::generate_p256().expect("generate p256 signing key");
    let rotation_keys = vec![signing_key.did_key()];
    let pds_endpoint = format!("https://{host}");
    let (did, _genesis_op) =
        create_did_plc_operation(&signing_key, rotation_keys.clone(), handle, &pds_endpoint)
            .expect("create did:plc genesis operation");

    let email = format!("{}@example.com", handle.split('.').next().unwrap_or("user"));
    let actor = Actor {
        did: did.clone(),
        handle: handle.to_string(),
        email: email.clone(),
        password_hash: hash_password(TEST_PASSWORD).expect("hash test password"),
        signing_key: ("p256".to_string(), signing_key.to_bytes()),
        rotation_keys,
        active: true,
        status: AccountStatus::Active,
        host: host.to_string(),
        created_at: chrono::Utc::now(),
    };
    let actor_bytes = serde_json::to_vec(&actor).expect("encode actor record");

    let mut tx = store.begin_tx().await.expect("begin provisioning tx");
    tx.set(&actor_did_key(&did), &actor_bytes)
        .await
        .expect("write actor record");
    tx.set(&actor_handle_key(handle), did.as_bytes())
        .await
        .expect("write handle index");
    tx.set(&actor_email_key(&email), did.as_bytes())
        .await
        .expect("write email index");

    let (root, rev, _blocks) = haven_repo::create_repo(&mut tx, &did, &signing_key)
        .await
        .expect("create genesis repo");
    let head = RepoHead { root, rev };
    let head_bytes = serde_json::to_vec(&head).expect("encode repo head");
    tx.set(&repo_head_key(&did), &head_bytes)
        .await
        .expect("write repo head");

    tx.commit().await.expect("commit provisioning tx");

    let access_jwt =
        create_access_token(&did, TEST_ACCESS_SECRET).expect("mint test access token");

    ProvisionedActor {
        did,
        handle: handle.to_string(),
        access_jwt,
    }
}

/// Sends a request through the router with the given `Host` header, an
/// optional bearer token, and an optional JSON body. Returns
/// `(status, body_json)`.
pub async fn send_request(
    router: &Router,
    method: &str,
    uri: &str,
    host: &str,
    auth_token: Option<&str>,
    body: Option<Value>,
) -> (u16, Value) {
    let mut builder = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("host", host);

    if let Some(token) = auth_token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }

    let req_body = match body {
        Some(b) => Body::from(serde_json::to_vec(&b).unwrap()),
        None => Body::empty(),
    };

    let req = builder.body(req_body).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json)
}
