use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use haven_core::keys::{actor_did_key, repo_head_key};
use haven_core::{AccountStatus, Actor, PdsError, RepoHead, Store};

use crate::error::XrpcError;
use crate::state::AppState;

const ACTORS_PREFIX: &[u8] = b"actors/did/";
const DEFAULT_LIMIT: i64 = 500;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListReposQuery {
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

/// A DID is `did:<method>:<method-specific-id>`; this is just enough of the
/// grammar to reject an obviously-malformed cursor without pulling in a
/// full DID-syntax validator, which is out of scope for this core.
fn looks_like_did(value: &str) -> bool {
    let mut parts = value.splitn(3, ':');
    matches!((parts.next(), parts.next(), parts.next()), (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty())
}

/// GET /xrpc/com.atproto.sync.listRepos
///
/// `limit` outside `[1, 500]` is an error if it's unparsable or below 1;
/// above 500 it's silently clamped rather than rejected. `cursor` is an
/// opaque "last DID seen" value validated only for DID shape — an
/// arbitrary-but-well-formed or stale one simply scans from that point in
/// key order, it is never checked against the actor index.
pub async fn list_repos<S: Store>(
    State(state): State<AppState<S>>,
    Query(params): Query<ListReposQuery>,
) -> Result<Json<Value>, XrpcError> {
    let limit = match &params.limit {
        None => DEFAULT_LIMIT,
        Some(raw) => {
            let parsed: i64 = raw
                .parse()
                .map_err(|_| XrpcError::new(StatusCode::BAD_REQUEST, "InvalidRequest", format!("limit is not a number: {raw}")))?;
            if parsed < 1 {
                return Err(XrpcError::new(
                    StatusCode::BAD_REQUEST,
                    "InvalidRequest",
                    format!("limit must be at least 1, got {parsed}"),
                ));
            }
            parsed.min(MAX_LIMIT)
        }
    };

    if let Some(cursor) = &params.cursor {
        if !looks_like_did(cursor) {
            return Err(XrpcError::new(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                format!("cursor is not a DID: {cursor}"),
            ));
        }
    }

    let start_after = params.cursor.as_deref().map(actor_did_key);
    let rows = state
        .store
        .scan(ACTORS_PREFIX, start_after.as_deref(), limit as usize, false)
        .await?;

    let mut repos = Vec::with_capacity(rows.len());
    let mut last_did = None;
    for (_, value) in &rows {
        let actor: Actor = serde_json::from_slice(value)
            .map_err(|e| PdsError::Internal(format!("corrupt actor record: {e}")))?;
        last_did = Some(actor.did.clone());

        let head: Option<RepoHead> = match state.store.get(&repo_head_key(&actor.did)).await? {
            Some(bytes) => Some(
                serde_json::from_slice(&bytes)
                    .map_err(|e| PdsError::Internal(format!("corrupt repo head for {}: {e}", actor.did)))?,
            ),
            None => None,
        };
        let Some(head) = head else { continue };

        let cid = haven_repo::cid_from_bytes(&head.root)
            .map_err(|e| PdsError::Internal(format!("corrupt repo root for {}: {e}", actor.did)))?;

        let active = actor.status == AccountStatus::Active;
        let mut repo = json!({
            "did": actor.did,
            "head": cid.to_string(),
            "rev": head.rev,
            "active": active,
        });
        if !active {
            repo["status"] = json!(actor.status.as_str());
        }
        repos.push(repo);
    }

    let mut response = json!({ "repos": repos });
    if rows.len() as i64 >= limit {
        if let Some(cursor) = last_did {
            response["cursor"] = json!(cursor);
        }
    }

    Ok(Json(response))
}
