use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use haven_core::Store;
use haven_core::keys::actor_handle_key;

use crate::error::XrpcError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveHandleQuery {
    pub handle: String,
}

/// GET /xrpc/com.atproto.identity.resolveHandle
///
/// Resolves a handle hosted by this process to its DID. External handle
/// resolution (DNS TXT, HTTPS well-known on a third-party domain) is
/// outside this core's scope — a handle this store doesn't index is a
/// `NotFound`, not a fallback lookup.
pub async fn resolve_handle<S: Store>(
    State(state): State<AppState<S>>,
    Query(params): Query<ResolveHandleQuery>,
) -> Result<Json<Value>, XrpcError> {
    let did_bytes = state
        .store
        .get(&actor_handle_key(&params.handle))
        .await?
        .ok_or_else(|| {
            XrpcError::new(
                axum::http::StatusCode::NOT_FOUND,
                "HandleNotFound",
                format!("handle not found: {}", params.handle),
            )
        })?;

    Ok(Json(json!({ "did": String::from_utf8_lossy(&did_bytes) })))
}
