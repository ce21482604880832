use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Deactivated,
    Takendown,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Deactivated => "deactivated",
            AccountStatus::Takendown => "takendown",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Deleted => "deleted",
        }
    }
}

/// A repository owner. Stored at `actors/did/<DID>`, indexed by
/// `actors/handle/<handle>` and `actors/email/<email>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub did: String,
    pub handle: String,
    pub email: String,
    pub password_hash: String,
    /// `(key_type, raw scalar bytes)`, key_type is `"p256"` or `"k256"`.
    pub signing_key: (String, Vec<u8>),
    pub rotation_keys: Vec<String>,
    pub active: bool,
    pub status: AccountStatus,
    pub host: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One entry in an actor's repository, mirrored at `records/<DID>/<NSID>/<rkey>`.
///
/// The MST and its blocks are the source of truth for verification; this is
/// the flat index used to answer `getRecord` without walking the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub uri: String,
    pub did: String,
    pub collection: String,
    pub rkey: String,
    pub cid: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub value_cbor: Vec<u8>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// An operation within a commit event: `create`, `update`, or `delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoOp {
    pub action: RepoOpAction,
    /// `<collection>/<rkey>`.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none", with = "serde_bytes_option")]
    pub cid: Option<Vec<u8>>,
}

/// `serde_bytes` has no built-in `Option<Vec<u8>>` support; this mirrors its
/// byte-string encoding so a CID ends up as a CBOR byte string, not an array
/// of integers.
mod serde_bytes_option {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serde_bytes::serialize(bytes, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let bytes: Option<serde_bytes::ByteBuf> = serde::Deserialize::deserialize(d)?;
        Ok(bytes.map(|b| b.into_vec()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoOpAction {
    Create,
    Update,
    Delete,
}

/// A tagged event kind; default is `Commit` per the design note on
/// polymorphism over event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoEventType {
    Commit,
    Identity,
    Account,
}

impl Default for RepoEventType {
    fn default() -> Self {
        RepoEventType::Commit
    }
}

/// Value stored at `repo/head/<DID>`: the repo's current MST root and the
/// rev of the commit that produced it. Kept as one value so a reader never
/// observes a root/rev pair that didn't commit together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoHead {
    pub root: Vec<u8>,
    pub rev: String,
}

/// One entry in the append-only global event log, stored at
/// `events/log/<seq-be64>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoEvent {
    pub seq: u64,
    pub pds_host: String,
    #[serde(default)]
    pub event_type: RepoEventType,
    pub repo: String,
    pub rev: String,
    /// Previous `rev`, empty for the first commit.
    #[serde(default)]
    pub since: String,
    #[serde(with = "serde_bytes")]
    pub commit: Vec<u8>,
    /// CAR-encoded bytes of the blocks needed to verify this commit.
    #[serde(with = "serde_bytes")]
    pub blocks: Vec<u8>,
    pub ops: Vec<RepoOp>,
    pub time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub too_big: bool,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}
