//! Key layout shared by every `Store` implementation. Keeping the encoding
//! in one place means a `scan` prefix and the key that produced a row are
//! always built the same way.

pub fn actor_did_key(did: &str) -> Vec<u8> {
    format!("actors/did/{did}").into_bytes()
}

/// Handles are lowercased once here so `actors/handle/<handle>` never needs
/// a case-insensitive comparison at lookup time.
pub fn actor_handle_key(handle: &str) -> Vec<u8> {
    format!("actors/handle/{}", handle.to_lowercase()).into_bytes()
}

pub fn actor_email_key(email: &str) -> Vec<u8> {
    format!("actors/email/{}", email.to_lowercase()).into_bytes()
}

pub fn record_key(did: &str, collection: &str, rkey: &str) -> Vec<u8> {
    format!("records/{did}/{collection}/{rkey}").into_bytes()
}

/// Prefix covering every record in `collection` for `did`. Pass an empty
/// `collection` to cover the whole repo.
pub fn record_prefix(did: &str, collection: &str) -> Vec<u8> {
    if collection.is_empty() {
        format!("records/{did}/").into_bytes()
    } else {
        format!("records/{did}/{collection}/").into_bytes()
    }
}

pub const EVENTS_LOG_PREFIX: &[u8] = b"events/log/";
pub const EVENTS_LATEST_KEY: &[u8] = b"events/latest";

/// Event log keys sort numerically because the sequence number is encoded
/// as 8-byte big-endian, not decimal text.
pub fn event_log_key(seq: u64) -> Vec<u8> {
    let mut key = EVENTS_LOG_PREFIX.to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

pub fn repo_head_key(did: &str) -> Vec<u8> {
    format!("repo/head/{did}").into_bytes()
}

pub fn tid_counter_key(did: &str) -> Vec<u8> {
    format!("tid/{did}").into_bytes()
}

/// Blocks backing the MST, records, and commits are addressed by CID under
/// a per-actor prefix. This is an implementation detail layered on top of
/// the fixed key namespace, not part of it.
pub fn block_key(did: &str, cid_bytes: &[u8]) -> Vec<u8> {
    let mut key = format!("blocks/{did}/").into_bytes();
    key.extend_from_slice(cid_bytes);
    key
}

pub fn block_prefix(did: &str) -> Vec<u8> {
    format!("blocks/{did}/").into_bytes()
}
