use atrium_repo::Cid;
use chrono::Utc;
use haven_core::keys::{EVENTS_LATEST_KEY, actor_did_key, event_log_key, record_key, repo_head_key};
use haven_core::store::{Store, StoreTx};
use haven_core::{Actor, PdsError, PdsResult, Record, RepoEvent, RepoEventType, RepoHead, RepoOp, RepoOpAction};
use haven_crypto::{SigningKey, TidGenerator};

use crate::blockstore_adapter::cid_from_bytes;
use crate::car;
use crate::operations;

const MAX_ATTEMPTS: u32 = 5;
const MAX_RECORD_SIZE: usize = 1024 * 1024;
const MAX_COMPONENT_LEN: usize = 512;

pub struct RecordWriteResult {
    pub uri: String,
    pub cid: Vec<u8>,
    pub rev: String,
}

/// NSID grammar (simplified to what `collection` needs): at least two
/// `.`-separated segments, each a non-empty run of ASCII alphanumerics and
/// hyphens, no leading digit on the final segment.
fn validate_nsid(collection: &str) -> PdsResult<()> {
    if collection.is_empty() || collection.len() > MAX_COMPONENT_LEN {
        return Err(PdsError::BadRequest(format!(
            "collection must be 1-{MAX_COMPONENT_LEN} characters"
        )));
    }
    let segments: Vec<&str> = collection.split('.').collect();
    let valid_segment = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if segments.len() < 2 || !segments.iter().all(|s| valid_segment(s)) {
        return Err(PdsError::BadRequest(format!(
            "collection must be a well-formed NSID, got: {collection}"
        )));
    }
    if segments.last().is_some_and(|s| s.chars().next().is_some_and(|c| c.is_ascii_digit())) {
        return Err(PdsError::BadRequest(format!(
            "collection's final NSID segment must not start with a digit, got: {collection}"
        )));
    }
    Ok(())
}

/// rkey grammar: 1-512 URL-safe characters, no slashes or whitespace.
fn validate_rkey(rkey: &str) -> PdsResult<()> {
    if rkey.is_empty() || rkey.len() > MAX_COMPONENT_LEN {
        return Err(PdsError::BadRequest(format!(
            "rkey must be 1-{MAX_COMPONENT_LEN} characters"
        )));
    }
    if !rkey
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '~' | '-'))
    {
        return Err(PdsError::BadRequest(format!(
            "rkey must match [A-Za-z0-9._:~-]+, got: {rkey}"
        )));
    }
    Ok(())
}

fn validate_record_size(record: &serde_json::Value) -> PdsResult<()> {
    let cbor = serde_ipld_dagcbor::to_vec(record)
        .map_err(|e| PdsError::BadRequest(format!("invalid record: {e}")))?;
    if cbor.len() > MAX_RECORD_SIZE {
        return Err(PdsError::BadRequest(format!(
            "record exceeds {MAX_RECORD_SIZE} byte limit"
        )));
    }
    Ok(())
}

async fn jittered_backoff(attempt: u32) {
    let base_ms = 20u64 * (1u64 << attempt.min(5));
    let jitter_ms = rand::random::<u64>() % 30;
    tokio::time::sleep(std::time::Duration::from_millis(base_ms + jitter_ms)).await;
}

async fn load_actor<Tx: StoreTx>(tx: &mut Tx, did: &str) -> PdsResult<Actor> {
    let bytes = tx
        .get(&actor_did_key(did))
        .await?
        .ok_or_else(|| PdsError::NotFound(format!("actor {did} not found")))?;
    serde_json::from_slice(&bytes).map_err(|e| PdsError::storage(format!("corrupt actor record: {e}")))
}

async fn load_head<Tx: StoreTx>(tx: &mut Tx, did: &str) -> PdsResult<RepoHead> {
    let bytes = tx
        .get(&repo_head_key(did))
        .await?
        .ok_or_else(|| PdsError::NotFound(format!("repo for {did} not found")))?;
    serde_json::from_slice(&bytes).map_err(|e| PdsError::storage(format!("corrupt repo head: {e}")))
}

/// Writes the commit's new head, allocates its sequence number, and appends
/// the matching `RepoEvent` — all inside the same transaction as the MST
/// mutation that produced `blocks`, so a crash between them is impossible.
async fn finalize_commit<Tx: StoreTx>(
    tx: &mut Tx,
    pds_host: &str,
    did: &str,
    since: &str,
    new_root: &[u8],
    new_rev: &str,
    blocks: &[(Cid, Vec<u8>)],
    op: RepoOp,
) -> PdsResult<()> {
    let head = RepoHead {
        root: new_root.to_vec(),
        rev: new_rev.to_string(),
    };
    let head_bytes =
        serde_json::to_vec(&head).map_err(|e| PdsError::storage(format!("encoding repo head: {e}")))?;
    tx.set(&repo_head_key(did), &head_bytes).await?;

    let seq = tx.allocate_seq().await?;

    let root_cid = cid_from_bytes(new_root).map_err(PdsError::storage)?;
    let car_bytes = car::build_car(root_cid, blocks).await?;

    let event = RepoEvent {
        seq,
        pds_host: pds_host.to_string(),
        event_type: RepoEventType::Commit,
        repo: did.to_string(),
        rev: new_rev.to_string(),
        since: since.to_string(),
        commit: new_root.to_vec(),
        blocks: car_bytes,
        ops: vec![op],
        time: Utc::now(),
        too_big: false,
        handle: None,
        active: None,
        status: None,
    };
    let event_bytes = serde_ipld_dagcbor::to_vec(&event)
        .map_err(|e| PdsError::storage(format!("encoding repo event: {e}")))?;
    tx.set(&event_log_key(seq), &event_bytes).await?;
    tx.set(EVENTS_LATEST_KEY, &seq.to_be_bytes()).await?;

    Ok(())
}

/// Stores the flat record index entry read back by `getRecord`. The MST and
/// its blocks remain the source of truth for verification.
async fn write_record_index<Tx: StoreTx>(
    tx: &mut Tx,
    did: &str,
    collection: &str,
    rkey: &str,
    uri: &str,
    cid: &[u8],
    record: &serde_json::Value,
) -> PdsResult<()> {
    let value_cbor = serde_ipld_dagcbor::to_vec(record)
        .map_err(|e| PdsError::storage(format!("encoding record: {e}")))?;
    let entry = Record {
        uri: uri.to_string(),
        did: did.to_string(),
        collection: collection.to_string(),
        rkey: rkey.to_string(),
        cid: cid.to_vec(),
        value_cbor,
        created_at: Utc::now(),
    };
    let bytes =
        serde_json::to_vec(&entry).map_err(|e| PdsError::storage(format!("encoding record index: {e}")))?;
    tx.set(&record_key(did, collection, rkey), &bytes).await?;
    Ok(())
}

/// Creates a new record. Fails with `Conflict` if one already exists at
/// `rkey` — callers wanting upsert semantics use [`put_record`].
pub async fn create_record<S: Store>(
    store: &S,
    pds_host: &str,
    did: &str,
    collection: &str,
    rkey: Option<&str>,
    record: serde_json::Value,
    tid_gen: &TidGenerator,
) -> PdsResult<RecordWriteResult> {
    validate_nsid(collection)?;
    if let Some(r) = rkey {
        validate_rkey(r)?;
    }
    validate_record_size(&record)?;

    for attempt in 0..MAX_ATTEMPTS {
        let mut tx = store.begin_tx().await?;
        match try_create_record(&mut tx, pds_host, did, collection, rkey, &record, tid_gen).await {
            Ok(result) => match tx.commit().await {
                Ok(()) => return Ok(result),
                Err(e) if e.is_conflict() && attempt + 1 < MAX_ATTEMPTS => {
                    jittered_backoff(attempt).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if e.is_conflict() && attempt + 1 < MAX_ATTEMPTS => {
                let _ = tx.rollback().await;
                jittered_backoff(attempt).await;
            }
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        }
    }
    Err(PdsError::Conflict(format!(
        "failed to write record after {MAX_ATTEMPTS} attempts"
    )))
}

async fn try_create_record<Tx: StoreTx>(
    tx: &mut Tx,
    pds_host: &str,
    did: &str,
    collection: &str,
    rkey: Option<&str>,
    record: &serde_json::Value,
    tid_gen: &TidGenerator,
) -> PdsResult<RecordWriteResult> {
    let actor = load_actor(tx, did).await?;
    let signing_key = SigningKey::from_bytes(&actor.signing_key.0, &actor.signing_key.1)?;
    let head = load_head(tx, did).await?;

    let rkey_str = rkey.map(str::to_string).unwrap_or_else(|| tid_gen.next_tid());
    let rev = tid_gen.next_tid();

    let output = operations::create_record(
        tx,
        did,
        &signing_key,
        collection,
        &rkey_str,
        record,
        &rev,
        &head.root,
    )
    .await?;

    write_record_index(tx, did, collection, &rkey_str, &output.uri, &output.cid, record).await?;

    let op = RepoOp {
        action: RepoOpAction::Create,
        path: format!("{collection}/{rkey_str}"),
        cid: Some(output.cid.clone()),
    };
    finalize_commit(
        tx,
        pds_host,
        did,
        &head.rev,
        &output.new_root,
        &output.new_rev,
        &output.blocks,
        op,
    )
    .await?;

    Ok(RecordWriteResult {
        uri: output.uri,
        cid: output.cid,
        rev: output.new_rev,
    })
}

/// Creates the record if absent, updates it in place otherwise.
pub async fn put_record<S: Store>(
    store: &S,
    pds_host: &str,
    did: &str,
    collection: &str,
    rkey: &str,
    record: serde_json::Value,
    tid_gen: &TidGenerator,
) -> PdsResult<RecordWriteResult> {
    validate_nsid(collection)?;
    validate_rkey(rkey)?;
    validate_record_size(&record)?;

    for attempt in 0..MAX_ATTEMPTS {
        let mut tx = store.begin_tx().await?;
        match try_put_record(&mut tx, pds_host, did, collection, rkey, &record, tid_gen).await {
            Ok(result) => match tx.commit().await {
                Ok(()) => return Ok(result),
                Err(e) if e.is_conflict() && attempt + 1 < MAX_ATTEMPTS => {
                    jittered_backoff(attempt).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if e.is_conflict() && attempt + 1 < MAX_ATTEMPTS => {
                let _ = tx.rollback().await;
                jittered_backoff(attempt).await;
            }
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        }
    }
    Err(PdsError::Conflict(format!(
        "failed to write record after {MAX_ATTEMPTS} attempts"
    )))
}

async fn try_put_record<Tx: StoreTx>(
    tx: &mut Tx,
    pds_host: &str,
    did: &str,
    collection: &str,
    rkey: &str,
    record: &serde_json::Value,
    tid_gen: &TidGenerator,
) -> PdsResult<RecordWriteResult> {
    let actor = load_actor(tx, did).await?;
    let signing_key = SigningKey::from_bytes(&actor.signing_key.0, &actor.signing_key.1)?;
    let head = load_head(tx, did).await?;

    let existing = tx.get(&record_key(did, collection, rkey)).await?;
    let rev = tid_gen.next_tid();

    let output =
        operations::put_record(tx, did, &signing_key, collection, rkey, record, &rev, &head.root).await?;

    write_record_index(tx, did, collection, rkey, &output.uri, &output.cid, record).await?;

    let op = RepoOp {
        action: if existing.is_some() {
            RepoOpAction::Update
        } else {
            RepoOpAction::Create
        },
        path: format!("{collection}/{rkey}"),
        cid: Some(output.cid.clone()),
    };
    finalize_commit(
        tx,
        pds_host,
        did,
        &head.rev,
        &output.new_root,
        &output.new_rev,
        &output.blocks,
        op,
    )
    .await?;

    Ok(RecordWriteResult {
        uri: output.uri,
        cid: output.cid,
        rev: output.new_rev,
    })
}

/// Deletes a record. A missing record is a 404 with no event emitted —
/// there is nothing to commit.
pub async fn delete_record<S: Store>(
    store: &S,
    pds_host: &str,
    did: &str,
    collection: &str,
    rkey: &str,
    tid_gen: &TidGenerator,
) -> PdsResult<()> {
    validate_nsid(collection)?;
    validate_rkey(rkey)?;

    for attempt in 0..MAX_ATTEMPTS {
        let mut tx = store.begin_tx().await?;
        match try_delete_record(&mut tx, pds_host, did, collection, rkey, tid_gen).await {
            Ok(()) => match tx.commit().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_conflict() && attempt + 1 < MAX_ATTEMPTS => {
                    jittered_backoff(attempt).await;
                }
                Err(e) => return Err(e),
            },
            Err(e) if e.is_conflict() && attempt + 1 < MAX_ATTEMPTS => {
                let _ = tx.rollback().await;
                jittered_backoff(attempt).await;
            }
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        }
    }
    Err(PdsError::Conflict(format!(
        "failed to delete record after {MAX_ATTEMPTS} attempts"
    )))
}

async fn try_delete_record<Tx: StoreTx>(
    tx: &mut Tx,
    pds_host: &str,
    did: &str,
    collection: &str,
    rkey: &str,
    tid_gen: &TidGenerator,
) -> PdsResult<()> {
    let record_entry_key = record_key(did, collection, rkey);
    if tx.get(&record_entry_key).await?.is_none() {
        return Err(PdsError::NotFound(format!(
            "record {collection}/{rkey} not found"
        )));
    }

    let actor = load_actor(tx, did).await?;
    let signing_key = SigningKey::from_bytes(&actor.signing_key.0, &actor.signing_key.1)?;
    let head = load_head(tx, did).await?;

    let rev = tid_gen.next_tid();
    let (new_root, new_rev, blocks) =
        operations::delete_record(tx, did, &signing_key, collection, rkey, &rev, &head.root).await?;

    tx.clear(&record_entry_key).await?;

    let op = RepoOp {
        action: RepoOpAction::Delete,
        path: format!("{collection}/{rkey}"),
        cid: None,
    };
    finalize_commit(tx, pds_host, did, &head.rev, &new_root, &new_rev, &blocks, op).await?;

    Ok(())
}
