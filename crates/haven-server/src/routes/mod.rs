pub mod health;
pub mod identity;
pub mod repo;
pub mod sync;
pub mod well_known;

use haven_core::Store;

use crate::state::AppState;

pub fn build_router<S: Store>(state: AppState<S>) -> axum::Router {
    axum::Router::new()
        // Health
        .route("/xrpc/_health", axum::routing::get(health::health_check))
        // Repo endpoints
        .route(
            "/xrpc/com.atproto.repo.createRecord",
            axum::routing::post(repo::create_record::<S>),
        )
        .route(
            "/xrpc/com.atproto.repo.getRecord",
            axum::routing::get(repo::get_record::<S>),
        )
        .route(
            "/xrpc/com.atproto.repo.putRecord",
            axum::routing::post(repo::put_record::<S>),
        )
        .route(
            "/xrpc/com.atproto.repo.deleteRecord",
            axum::routing::post(repo::delete_record::<S>),
        )
        // Sync endpoints
        .route(
            "/xrpc/com.atproto.sync.listRepos",
            axum::routing::get(sync::list_repos::<S>),
        )
        // Firehose WebSocket
        .route(
            "/xrpc/com.atproto.sync.subscribeRepos",
            axum::routing::get(crate::firehose::stream::subscribe_repos::<S>),
        )
        // Identity endpoints
        .route(
            "/xrpc/com.atproto.identity.resolveHandle",
            axum::routing::get(identity::resolve_handle::<S>),
        )
        // Well-known
        .route("/.well-known/did.json", axum::routing::get(well_known::did_document))
        .route(
            "/.well-known/atproto-did",
            axum::routing::get(well_known::atproto_did::<S>),
        )
        .route(
            "/.well-known/oauth-protected-resource",
            axum::routing::get(well_known::oauth_protected_resource),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            axum::routing::get(well_known::oauth_authorization_server),
        )
        // Fallback: proxy unknown XRPC methods to the configured appview.
        .fallback(crate::proxy::pipethrough::pipethrough_fallback::<S>)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::host_router::resolve_host::<S>,
        ))
        // CORS: allow any origin for XRPC (AT Protocol expects this).
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
                .expose_headers(tower_http::cors::Any),
        )
        // Request body size limit: 10 MiB default.
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            10 * 1024 * 1024,
        ))
        .with_state(state)
}
