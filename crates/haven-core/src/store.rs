use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::PdsResult;

/// A cancelable wait for a key to change. Dropping the future returned by
/// [`Watch::changed`] cancels the wait; nothing is leaked or double-fired.
#[derive(Clone)]
pub struct Watch(Arc<Notify>);

impl Watch {
    pub fn new(notify: Arc<Notify>) -> Self {
        Watch(notify)
    }

    pub async fn changed(&self) {
        self.0.notified().await
    }
}

/// The storage interface the rest of the core is built against. One process
/// holds one concrete `Store`; every other module is generic over it rather
/// than reaching for a concrete database type directly.
///
/// Keys and values are opaque byte strings; the layout living on top of them
/// (`actors/did/<DID>`, `records/<DID>/<NSID>/<rkey>`, `events/log/<seq>`,
/// ...) is defined in `crate::keys`.
#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx + Send;

    async fn get(&self, key: &[u8]) -> PdsResult<Option<Vec<u8>>>;
    async fn set(&self, key: &[u8], value: &[u8]) -> PdsResult<()>;
    async fn clear(&self, key: &[u8]) -> PdsResult<()>;
    async fn clear_range(&self, start: &[u8], end: &[u8]) -> PdsResult<()>;

    /// Lexicographic range scan over keys with the given `prefix`. When
    /// `start_after` is set, results begin strictly after that key (or
    /// strictly before it, if `reverse`).
    async fn scan(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
        reverse: bool,
    ) -> PdsResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Resolves once `key` is next written or cleared. Callers race this
    /// against a poll-interval timer rather than trust it exclusively.
    async fn watch(&self, key: &[u8]) -> PdsResult<Watch>;

    /// Starts a snapshot-isolated transaction. Every write inside it is
    /// invisible to other readers until `commit` returns.
    async fn begin_tx(&self) -> PdsResult<Self::Tx>;
}

/// A single transaction against a [`Store`]. Consumed by `commit` or
/// `rollback`; there is no implicit rollback-on-drop contract to rely on,
/// callers must call one or the other explicitly.
#[async_trait]
pub trait StoreTx: Send {
    async fn get(&mut self, key: &[u8]) -> PdsResult<Option<Vec<u8>>>;
    async fn set(&mut self, key: &[u8], value: &[u8]) -> PdsResult<()>;
    async fn clear(&mut self, key: &[u8]) -> PdsResult<()>;
    async fn clear_range(&mut self, start: &[u8], end: &[u8]) -> PdsResult<()>;

    async fn scan(
        &mut self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
        reverse: bool,
    ) -> PdsResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Allocates the next value of the monotonic, gapless global sequence
    /// counter. Only ever called alongside an `events/log/<seq>` write in
    /// the same transaction, so an aborted transaction never leaves a gap.
    async fn allocate_seq(&mut self) -> PdsResult<u64>;

    async fn commit(self) -> PdsResult<()>;
    async fn rollback(self) -> PdsResult<()>;
}
