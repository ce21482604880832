use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use haven_core::Store;
use haven_core::keys::actor_handle_key;

use crate::host_router::ResolvedHost;
use crate::state::AppState;

/// GET /.well-known/did.json — this host's own DID document.
pub async fn did_document(Extension(host): Extension<ResolvedHost>) -> impl IntoResponse {
    Json(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": host.config.service_did,
        "service": [{
            "id": "#atproto_pds",
            "type": "AtprotoPersonalDataServer",
            "serviceEndpoint": format!("https://{}", host.name),
        }],
    }))
}

/// GET /.well-known/atproto-did
///
/// Plain-text response: the host's own service DID if the request named
/// the host directly; otherwise the request host is a handle under one of
/// the host's user domains, so resolve it to the owning actor's DID.
/// 204 if neither resolves.
pub async fn atproto_did<S: Store>(
    State(state): State<AppState<S>>,
    Extension(host): Extension<ResolvedHost>,
) -> Response {
    if host.is_exact_match() {
        return (
            StatusCode::OK,
            [("content-type", "text/plain")],
            host.config.service_did.clone(),
        )
            .into_response();
    }

    match state.store.get(&actor_handle_key(&host.hostname)).await {
        Ok(Some(did_bytes)) => (
            StatusCode::OK,
            [("content-type", "text/plain")],
            String::from_utf8_lossy(&did_bytes).into_owned(),
        )
            .into_response(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /.well-known/oauth-protected-resource
///
/// Static resource-server metadata. Token *issuance* lives outside this
/// core (see Non-goals); this only advertises where a client should look.
pub async fn oauth_protected_resource(Extension(host): Extension<ResolvedHost>) -> impl IntoResponse {
    let resource = format!("https://{}", host.name);
    Json(json!({
        "resource": resource,
        "authorization_servers": [resource],
        "scopes_supported": ["atproto"],
        "bearer_methods_supported": ["header"],
    }))
}

/// GET /.well-known/oauth-authorization-server
pub async fn oauth_authorization_server(Extension(host): Extension<ResolvedHost>) -> impl IntoResponse {
    let issuer = format!("https://{}", host.name);
    Json(json!({
        "issuer": issuer,
        "scopes_supported": ["atproto"],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "token_endpoint_auth_methods_supported": ["none", "private_key_jwt"],
        "dpop_signing_alg_values_supported": ["ES256"],
    }))
}
