use atrium_api::types::string::{Did, Tid};
use atrium_repo::blockstore::AsyncBlockStoreRead;
use atrium_repo::{Cid, Repository};
use haven_core::store::{Store, StoreTx};
use haven_core::{PdsError, PdsResult};
use haven_crypto::SigningKey;

use crate::blockstore_adapter::{ReadBlockAdapter, TxBlockAdapter, cid_from_bytes, cid_to_bytes};

/// Result of a single MST mutation: the affected record's identity plus
/// every block the mutation wrote, ready to become a commit event's CAR
/// payload.
pub struct RecordWriteOutput {
    pub uri: String,
    pub cid: Vec<u8>,
    pub new_root: Vec<u8>,
    pub new_rev: String,
    pub blocks: Vec<(Cid, Vec<u8>)>,
}

pub struct RecordOutput {
    pub uri: String,
    pub cid: Vec<u8>,
    pub value: serde_json::Value,
}

fn tid(rev: &str) -> PdsResult<Tid> {
    Tid::new(rev.to_string()).map_err(|e| PdsError::Internal(format!("invalid TID: {e}")))
}

/// Creates a brand new, empty repository for `did` and signs its genesis
/// commit. Returns `(root_cid_bytes, rev)`.
pub async fn create_repo<Tx: StoreTx>(
    tx: &mut Tx,
    did: &str,
    signing_key: &SigningKey,
) -> PdsResult<(Vec<u8>, String, Vec<(Cid, Vec<u8>)>)> {
    let mut adapter = TxBlockAdapter::new(tx, did.to_string());

    let atrium_did =
        Did::new(did.to_string()).map_err(|e| PdsError::BadRequest(format!("invalid DID: {e}")))?;

    let builder = Repository::create(&mut adapter, atrium_did)
        .await
        .map_err(|e| PdsError::storage(format!("failed to create repo: {e}")))?;

    let commit_bytes = builder.bytes();
    let sig = signing_key.sign(&commit_bytes)?;

    let repo = builder
        .finalize(sig)
        .await
        .map_err(|e| PdsError::storage(format!("failed to finalize repo: {e}")))?;

    let root_cid = repo.root();
    let rev = repo.commit().rev().to_string();

    Ok((cid_to_bytes(&root_cid), rev, adapter.written))
}

/// Adds a new record at `collection/rkey`. Fails with `Conflict` if a
/// record already exists there — callers that want upsert semantics use
/// [`put_record`] instead.
pub async fn create_record<Tx: StoreTx>(
    tx: &mut Tx,
    did: &str,
    signing_key: &SigningKey,
    collection: &str,
    rkey: &str,
    record: &serde_json::Value,
    rev: &str,
    current_root: &[u8],
) -> PdsResult<RecordWriteOutput> {
    let mut adapter = TxBlockAdapter::new(tx, did.to_string());
    let root_cid =
        cid_from_bytes(current_root).map_err(|e| PdsError::storage(format!("invalid root CID: {e}")))?;

    let mut repo = Repository::open(&mut adapter, root_cid)
        .await
        .map_err(|e| PdsError::storage(format!("failed to open repo: {e}")))?;

    let mst_key = format!("{collection}/{rkey}");
    let (mut commit_builder, record_cid) = repo
        .add_raw(&mst_key, record)
        .await
        .map_err(|e| PdsError::Conflict(format!("failed to add record: {e}")))?;

    commit_builder.rev(tid(rev)?);
    commit_builder.prev(root_cid);

    let commit_bytes = commit_builder.bytes();
    let sig = signing_key.sign(&commit_bytes)?;
    let new_root_cid = commit_builder
        .finalize(sig)
        .await
        .map_err(|e| PdsError::storage(format!("failed to finalize commit: {e}")))?;

    Ok(RecordWriteOutput {
        uri: format!("at://{did}/{collection}/{rkey}"),
        cid: cid_to_bytes(&record_cid),
        new_root: cid_to_bytes(&new_root_cid),
        new_rev: rev.to_string(),
        blocks: adapter.written,
    })
}

/// Creates the record if absent, otherwise updates it in place.
pub async fn put_record<Tx: StoreTx>(
    tx: &mut Tx,
    did: &str,
    signing_key: &SigningKey,
    collection: &str,
    rkey: &str,
    record: &serde_json::Value,
    rev: &str,
    current_root: &[u8],
) -> PdsResult<RecordWriteOutput> {
    let mut adapter = TxBlockAdapter::new(tx, did.to_string());
    let root_cid =
        cid_from_bytes(current_root).map_err(|e| PdsError::storage(format!("invalid root CID: {e}")))?;

    let mut repo = Repository::open(&mut adapter, root_cid)
        .await
        .map_err(|e| PdsError::storage(format!("failed to open repo: {e}")))?;

    let mst_key = format!("{collection}/{rkey}");
    let existing = {
        let mut tree = repo.tree();
        tree.get(&mst_key)
            .await
            .map_err(|e| PdsError::storage(format!("failed to check existing record: {e}")))?
    };

    let (mut commit_builder, record_cid) = if existing.is_some() {
        repo.update_raw(&mst_key, record)
            .await
            .map_err(|e| PdsError::storage(format!("failed to update record: {e}")))?
    } else {
        repo.add_raw(&mst_key, record)
            .await
            .map_err(|e| PdsError::storage(format!("failed to add record: {e}")))?
    };

    commit_builder.rev(tid(rev)?);
    commit_builder.prev(root_cid);

    let commit_bytes = commit_builder.bytes();
    let sig = signing_key.sign(&commit_bytes)?;
    let new_root_cid = commit_builder
        .finalize(sig)
        .await
        .map_err(|e| PdsError::storage(format!("failed to finalize commit: {e}")))?;

    Ok(RecordWriteOutput {
        uri: format!("at://{did}/{collection}/{rkey}"),
        cid: cid_to_bytes(&record_cid),
        new_root: cid_to_bytes(&new_root_cid),
        new_rev: rev.to_string(),
        blocks: adapter.written,
    })
}

/// Removes a record. Returns `(new_root, new_rev, blocks)`.
pub async fn delete_record<Tx: StoreTx>(
    tx: &mut Tx,
    did: &str,
    signing_key: &SigningKey,
    collection: &str,
    rkey: &str,
    rev: &str,
    current_root: &[u8],
) -> PdsResult<(Vec<u8>, String, Vec<(Cid, Vec<u8>)>)> {
    let mut adapter = TxBlockAdapter::new(tx, did.to_string());
    let root_cid =
        cid_from_bytes(current_root).map_err(|e| PdsError::storage(format!("invalid root CID: {e}")))?;

    let mut repo = Repository::open(&mut adapter, root_cid)
        .await
        .map_err(|e| PdsError::storage(format!("failed to open repo: {e}")))?;

    let mst_key = format!("{collection}/{rkey}");
    let mut commit_builder = repo
        .delete_raw(&mst_key)
        .await
        .map_err(|e| PdsError::NotFound(format!("record not found: {e}")))?;

    commit_builder.rev(tid(rev)?);
    commit_builder.prev(root_cid);

    let commit_bytes = commit_builder.bytes();
    let sig = signing_key.sign(&commit_bytes)?;
    let new_root_cid = commit_builder
        .finalize(sig)
        .await
        .map_err(|e| PdsError::storage(format!("failed to finalize commit: {e}")))?;

    Ok((cid_to_bytes(&new_root_cid), rev.to_string(), adapter.written))
}

/// Reads a single record by its repo path. Returns `None` if it doesn't
/// exist. Unlike the write operations this needs no transaction — a single
/// consistent snapshot read is enough.
pub async fn get_record<S: Store>(
    store: &S,
    did: &str,
    collection: &str,
    rkey: &str,
    current_root: &[u8],
) -> PdsResult<Option<RecordOutput>> {
    let mut adapter = ReadBlockAdapter::new(store, did.to_string());
    let root_cid =
        cid_from_bytes(current_root).map_err(|e| PdsError::storage(format!("invalid root CID: {e}")))?;

    let maybe_cid = {
        let mut repo = Repository::open(&mut adapter, root_cid)
            .await
            .map_err(|e| PdsError::storage(format!("failed to open repo: {e}")))?;
        let mst_key = format!("{collection}/{rkey}");
        let mut tree = repo.tree();
        tree.get(&mst_key)
            .await
            .map_err(|e| PdsError::storage(format!("failed to get record from MST: {e}")))?
    };

    match maybe_cid {
        Some(record_cid) => {
            let block_data = adapter
                .read_block(record_cid)
                .await
                .map_err(|e| PdsError::storage(format!("failed to read record block: {e}")))?;
            let value: serde_json::Value = serde_ipld_dagcbor::from_reader(&block_data[..])
                .map_err(|e| PdsError::storage(format!("failed to decode record: {e}")))?;
            Ok(Some(RecordOutput {
                uri: format!("at://{did}/{collection}/{rkey}"),
                cid: cid_to_bytes(&record_cid),
                value,
            }))
        }
        None => Ok(None),
    }
}
