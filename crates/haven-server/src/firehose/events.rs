//! Wire framing for `subscribeRepos`: a small DAG-CBOR header followed by a
//! DAG-CBOR body, both concatenated into one WebSocket binary frame. There
//! is one body shape (`RepoEvent`) for every event kind; the header's `t`
//! tag is what a reader dispatches on, not a distinct Rust type per kind
//! (see the design note on polymorphism over event kinds).

use serde::{Deserialize, Serialize};

use haven_core::{PdsError, PdsResult, RepoEvent, RepoEventType};

#[derive(Debug, Serialize, Deserialize)]
struct FrameHeader {
    /// 1 = message frame, -1 = error frame.
    op: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    t: Option<String>,
}

fn tag_for(event_type: RepoEventType) -> &'static str {
    match event_type {
        RepoEventType::Commit => "#commit",
        RepoEventType::Identity => "#identity",
        RepoEventType::Account => "#account",
    }
}

/// Encodes a `RepoEvent` into a binary WebSocket frame.
pub fn encode_event(event: &RepoEvent) -> PdsResult<Vec<u8>> {
    let header = FrameHeader {
        op: 1,
        t: Some(tag_for(event.event_type).to_string()),
    };
    let mut frame = serde_ipld_dagcbor::to_vec(&header)
        .map_err(|e| PdsError::Internal(format!("encoding frame header: {e}")))?;
    let body = serde_ipld_dagcbor::to_vec(event)
        .map_err(|e| PdsError::Internal(format!("encoding frame body: {e}")))?;
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decodes a frame produced by [`encode_event`]. CBOR is self-delimiting,
/// so the header and body can be read off the same cursor sequentially
/// without knowing the header's length up front.
pub fn decode_event(bytes: &[u8]) -> PdsResult<RepoEvent> {
    let mut cursor = std::io::Cursor::new(bytes);
    let _header: FrameHeader = serde_ipld_dagcbor::from_reader(&mut cursor)
        .map_err(|e| PdsError::Internal(format!("decoding frame header: {e}")))?;
    serde_ipld_dagcbor::from_reader(&mut cursor)
        .map_err(|e| PdsError::Internal(format!("decoding frame body: {e}")))
}

#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Encodes an `op: -1` error frame, sent when a subscriber can't be served
/// (e.g. a cursor ahead of the log).
pub fn encode_error_frame(frame: &ErrorFrame) -> PdsResult<Vec<u8>> {
    let header = FrameHeader { op: -1, t: None };
    let mut bytes = serde_ipld_dagcbor::to_vec(&header)
        .map_err(|e| PdsError::Internal(format!("encoding error frame header: {e}")))?;
    let body = serde_ipld_dagcbor::to_vec(frame)
        .map_err(|e| PdsError::Internal(format!("encoding error frame body: {e}")))?;
    bytes.extend_from_slice(&body);
    Ok(bytes)
}
