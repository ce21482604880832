//! Subscriber Session for `com.atproto.sync.subscribeRepos`.
//!
//! Registers with the firehose dispatcher before replaying anything, so an
//! event committed while history is being replayed is queued rather than
//! lost. Replay itself bypasses the subscriber's queue (a direct store
//! scan), and once it catches up to "now" any queued live event with
//! `seq <= last_sent` is dropped before the session hands control to the
//! live loop — that's the resolution to the replay/registration race.

use std::time::Duration;

use axum::Extension;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use haven_core::keys::{EVENTS_LOG_PREFIX, event_log_key};
use haven_core::{RepoEvent, Store};

use crate::firehose::events::encode_event;
use crate::host_router::ResolvedHost;
use crate::state::AppState;

const REPLAY_BATCH: usize = 100;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct SubscribeReposQuery {
    pub cursor: Option<u64>,
}

pub async fn subscribe_repos<S: Store>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
    host: Option<Extension<ResolvedHost>>,
    Query(params): Query<SubscribeReposQuery>,
) -> impl IntoResponse {
    let host_filter = host.map(|Extension(h)| h.name);
    ws.on_upgrade(move |socket| handle_session(socket, state, params.cursor, host_filter))
}

async fn handle_session<S: Store>(
    socket: WebSocket,
    state: AppState<S>,
    cursor: Option<u64>,
    host_filter: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Register first: any event committed from here on is queued for us
    // even while we're still replaying history below.
    let (subscriber_id, mut live_rx) = state.firehose.register(host_filter.clone()).await;

    let mut replay_cursor = cursor.map(event_log_key);
    let mut last_sent = cursor.unwrap_or(0);

    loop {
        let rows = match state
            .store
            .scan(EVENTS_LOG_PREFIX, replay_cursor.as_deref(), REPLAY_BATCH, false)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("subscribeRepos: replay scan failed: {e}");
                break;
            }
        };
        if rows.is_empty() {
            break;
        }

        let count = rows.len();
        for (key, value) in &rows {
            replay_cursor = Some(key.clone());
            let event: RepoEvent = match serde_ipld_dagcbor::from_slice(value) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("subscribeRepos: skipping undecodable logged event: {e}");
                    continue;
                }
            };
            if let Some(filter) = &host_filter {
                if filter != &event.pds_host {
                    continue;
                }
            }
            last_sent = event.seq;
            match encode_event(&event) {
                Ok(frame) => {
                    if sender.send(Message::Binary(frame.into())).await.is_err() {
                        state.firehose.deregister(subscriber_id).await;
                        return;
                    }
                }
                Err(e) => tracing::warn!("subscribeRepos: failed to encode replayed event: {e}"),
            }
        }
        if count < REPLAY_BATCH {
            break;
        }
    }

    // The read task's only job is detecting disconnect and liveness: it
    // forwards each Pong so the main loop can reset the 60s pong deadline.
    let (pong_tx, mut pong_rx) = tokio::sync::mpsc::channel(1);
    let read_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Pong(_)) {
                let _ = pong_tx.try_send(());
            }
        }
    });

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // first tick fires immediately
    let mut pong_deadline = tokio::time::Instant::now() + PONG_TIMEOUT;

    loop {
        tokio::select! {
            event = live_rx.recv() => {
                match event {
                    // Already delivered during replay; the dispatcher's
                    // cursor starts at process-launch time so this is only
                    // possible for events committed during our own replay.
                    Some(event) if event.seq <= last_sent => continue,
                    Some(event) => {
                        last_sent = event.seq;
                        match encode_event(&event) {
                            Ok(frame) => {
                                if sender.send(Message::Binary(frame.into())).await.is_err() { break; }
                            }
                            Err(e) => tracing::warn!("subscribeRepos: failed to encode live event: {e}"),
                        }
                    }
                    None => break,
                }
            }
            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() { break; }
            }
            _ = pong_rx.recv() => {
                pong_deadline = tokio::time::Instant::now() + PONG_TIMEOUT;
            }
            _ = tokio::time::sleep_until(pong_deadline) => {
                tracing::warn!("subscribeRepos: pong timeout, closing subscriber {subscriber_id}");
                break;
            }
        }
    }

    read_task.abort();
    state.firehose.deregister(subscriber_id).await;
}
