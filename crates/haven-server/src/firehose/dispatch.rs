//! The Firehose Engine: a single background task per process that watches
//! the append-only event log and fans new events out to every registered
//! subscriber's bounded queue.
//!
//! This replaces the teacher's `tokio::sync::broadcast`-based sequencer —
//! broadcast conflates liveness fan-out with durability (a lagged receiver
//! just loses messages), whereas a subscriber here gets an explicit
//! dropped-event count and is expected to reconnect with a cursor rather
//! than silently skip ahead.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};

use haven_core::keys::{EVENTS_LATEST_KEY, EVENTS_LOG_PREFIX, event_log_key};
use haven_core::{RepoEvent, Store};

const SUBSCRIBER_CAPACITY: usize = 1000;
const SCAN_BATCH: usize = 100;
const POLL_FALLBACK: Duration = Duration::from_millis(50);

struct Subscriber {
    host_filter: Option<String>,
    tx: mpsc::Sender<RepoEvent>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// Process-singleton dispatcher. Construct with [`FirehoseHandle::spawn`].
pub struct FirehoseHandle {
    subscribers: RwLock<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
    shutdown: tokio::sync::Notify,
}

impl FirehoseHandle {
    pub fn spawn<S: Store>(store: S) -> Arc<Self> {
        let handle = Arc::new(Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shutdown: tokio::sync::Notify::new(),
        });
        let dispatcher = handle.clone();
        tokio::spawn(async move { dispatcher.run(store).await });
        handle
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Registers a new live subscriber and returns its id plus the
    /// receiving half of its queue. `host_filter`, when set, restricts
    /// delivery to events whose `pds_host` matches.
    ///
    /// Callers implementing the Subscriber Session replay race must
    /// register *before* replaying history from the store, so no event
    /// committed mid-replay is lost.
    pub async fn register(&self, host_filter: Option<String>) -> (u64, mpsc::Receiver<RepoEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().await.insert(
            id,
            Subscriber {
                host_filter,
                tx,
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            },
        );
        (id, rx)
    }

    pub async fn deregister(&self, id: u64) {
        self.subscribers.write().await.remove(&id);
    }

    async fn run<S: Store>(&self, store: S) {
        let mut cursor = Self::initial_cursor(&store).await;

        loop {
            let watch = match store.watch(EVENTS_LATEST_KEY).await {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::warn!("firehose: failed to establish watch, polling instead: {e}");
                    None
                }
            };

            tokio::select! {
                _ = async {
                    match watch {
                        Some(w) => w.changed().await,
                        None => tokio::time::sleep(POLL_FALLBACK).await,
                    }
                } => {}
                _ = self.shutdown.notified() => return,
            }

            self.drain_new_events(&store, &mut cursor).await;
        }
    }

    async fn initial_cursor<S: Store>(store: &S) -> Option<Vec<u8>> {
        let latest = store.get(EVENTS_LATEST_KEY).await.ok().flatten()?;
        let seq = u64::from_be_bytes(latest.try_into().ok()?);
        Some(event_log_key(seq))
    }

    async fn drain_new_events<S: Store>(&self, store: &S, cursor: &mut Option<Vec<u8>>) {
        loop {
            let rows = match store
                .scan(EVENTS_LOG_PREFIX, cursor.as_deref(), SCAN_BATCH, false)
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!("firehose: scan failed, will retry on next watch fire: {e}");
                    return;
                }
            };
            if rows.is_empty() {
                return;
            }

            let count = rows.len();
            for (key, value) in &rows {
                match serde_ipld_dagcbor::from_slice::<RepoEvent>(value) {
                    Ok(event) => self.fan_out(&event).await,
                    Err(e) => tracing::warn!("firehose: skipping undecodable event at {key:?}: {e}"),
                }
            }
            *cursor = rows.last().map(|(key, _)| key.clone());
            if count < SCAN_BATCH {
                return;
            }
        }
    }

    async fn fan_out(&self, event: &RepoEvent) {
        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.values() {
            if let Some(filter) = &subscriber.host_filter {
                if filter != &event.pds_host {
                    continue;
                }
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => {
                    subscriber.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "firehose: dropped event seq={} for a slow subscriber; it must reconnect with a cursor",
                        event.seq
                    );
                }
            }
        }
    }
}
