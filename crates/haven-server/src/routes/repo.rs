use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use haven_core::keys::repo_head_key;
use haven_core::{PdsError, RepoHead, Store};

use crate::actors::load_actor;
use crate::auth::AuthenticatedActor;
use crate::error::XrpcError;
use crate::state::AppState;

fn cid_to_string(cid_bytes: &[u8]) -> Result<String, XrpcError> {
    let cid = haven_repo::cid_from_bytes(cid_bytes)
        .map_err(|e| XrpcError::from(PdsError::Internal(format!("decoding CID: {e}"))))?;
    Ok(cid.to_string())
}

fn repo_mismatch(repo: &str, actor: &AuthenticatedActor) -> Option<XrpcError> {
    if repo != actor.did {
        Some(XrpcError::new(
            StatusCode::FORBIDDEN,
            "AuthorizationError",
            "token did not match repo DID",
        ))
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub repo: String,
    pub collection: String,
    pub rkey: Option<String>,
    pub record: Value,
}

pub async fn create_record<S: Store>(
    State(state): State<AppState<S>>,
    actor: AuthenticatedActor,
    Json(body): Json<CreateRecordRequest>,
) -> Result<Json<Value>, XrpcError> {
    if let Some(err) = repo_mismatch(&body.repo, &actor) {
        return Err(err);
    }

    let stored_actor = load_actor(&state.store, &actor.did).await?;
    let tid_gen = state.tid_generator(&actor.did).await;

    let result = haven_repo::create_record(
        &state.store,
        &stored_actor.host,
        &actor.did,
        &body.collection,
        body.rkey.as_deref(),
        body.record,
        &tid_gen,
    )
    .await?;

    Ok(Json(json!({
        "uri": result.uri,
        "cid": cid_to_string(&result.cid)?,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PutRecordRequest {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
    pub record: Value,
}

pub async fn put_record<S: Store>(
    State(state): State<AppState<S>>,
    actor: AuthenticatedActor,
    Json(body): Json<PutRecordRequest>,
) -> Result<Json<Value>, XrpcError> {
    if let Some(err) = repo_mismatch(&body.repo, &actor) {
        return Err(err);
    }

    let stored_actor = load_actor(&state.store, &actor.did).await?;
    let tid_gen = state.tid_generator(&actor.did).await;

    let result = haven_repo::put_record(
        &state.store,
        &stored_actor.host,
        &actor.did,
        &body.collection,
        &body.rkey,
        body.record,
        &tid_gen,
    )
    .await?;

    Ok(Json(json!({
        "uri": result.uri,
        "cid": cid_to_string(&result.cid)?,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRecordRequest {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
}

pub async fn delete_record<S: Store>(
    State(state): State<AppState<S>>,
    actor: AuthenticatedActor,
    Json(body): Json<DeleteRecordRequest>,
) -> Result<StatusCode, XrpcError> {
    if let Some(err) = repo_mismatch(&body.repo, &actor) {
        return Err(err);
    }

    let stored_actor = load_actor(&state.store, &actor.did).await?;
    let tid_gen = state.tid_generator(&actor.did).await;

    haven_repo::delete_record(
        &state.store,
        &stored_actor.host,
        &actor.did,
        &body.collection,
        &body.rkey,
        &tid_gen,
    )
    .await?;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct GetRecordQuery {
    pub repo: String,
    pub collection: String,
    pub rkey: String,
    /// When set, the caller expects the record at this exact CID; a stored
    /// record with a different CID is treated the same as a missing one.
    pub cid: Option<String>,
}

pub async fn get_record<S: Store>(
    State(state): State<AppState<S>>,
    Query(params): Query<GetRecordQuery>,
) -> Result<Json<Value>, XrpcError> {
    let head_bytes = state
        .store
        .get(&repo_head_key(&params.repo))
        .await?
        .ok_or_else(|| {
            XrpcError::new(
                StatusCode::NOT_FOUND,
                "RepoNotFound",
                format!("repository not initialized for {}", params.repo),
            )
        })?;
    let head: RepoHead = serde_json::from_slice(&head_bytes)
        .map_err(|e| XrpcError::from(PdsError::Internal(format!("corrupt repo head: {e}"))))?;

    let record = haven_repo::get_record(
        &state.store,
        &params.repo,
        &params.collection,
        &params.rkey,
        &head.root,
    )
    .await?
    .ok_or_else(|| {
        XrpcError::new(
            StatusCode::NOT_FOUND,
            "RecordNotFound",
            format!(
                "record not found: at://{}/{}/{}",
                params.repo, params.collection, params.rkey
            ),
        )
    })?;

    if let Some(expected_cid) = &params.cid {
        if &cid_to_string(&record.cid)? != expected_cid {
            return Err(XrpcError::new(
                StatusCode::NOT_FOUND,
                "RecordNotFound",
                format!(
                    "record at://{}/{}/{} does not match cid {expected_cid}",
                    params.repo, params.collection, params.rkey
                ),
            ));
        }
    }

    Ok(Json(json!({
        "uri": record.uri,
        "cid": cid_to_string(&record.cid)?,
        "value": record.value,
    })))
}
