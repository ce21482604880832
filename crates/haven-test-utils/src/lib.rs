pub mod assertions;
pub mod server;
pub mod stores;

pub use assertions::{assert_xrpc_error, assert_xrpc_ok};
pub use server::{
    TEST_ACCESS_SECRET, TEST_HOST, TEST_PASSWORD, TEST_USER_DOMAIN, create_test_app_state,
    create_test_config, create_test_router, create_test_router_with_appview, provision_actor,
    send_request,
};
pub use stores::{TestStore, create_test_store};

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::Store;

    #[tokio::test]
    async fn fresh_store_has_no_actors() {
        let test_store = create_test_store().await;
        let rows = test_store
            .store
            .scan(b"actors/did/", None, 10, false)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn provisioned_actor_is_retrievable() {
        let test_store = create_test_store().await;
        let actor = provision_actor(&test_store.store, "alice.test.pds.local", TEST_HOST).await;
        assert!(actor.did.starts_with("did:plc:"));
        assert!(!actor.access_jwt.is_empty());
    }
}
