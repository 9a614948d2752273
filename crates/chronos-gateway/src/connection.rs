use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tracing::{info, trace, warn};
use uuid::Uuid;

use chronos_registry::Registry;
use chronos_types::events::{EventFilter, GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_HEARTBEATS: u8 = 2;

/// Counts heartbeat ticks that passed without a Pong from the client.
#[derive(Debug, Default)]
struct Heartbeat {
    missed: u8,
}

impl Heartbeat {
    /// Record one tick. Returns `false` once the client should be dropped.
    fn tick(&mut self, pong_seen: bool) -> bool {
        if pong_seen {
            self.missed = 0;
        } else {
            self.missed += 1;
        }
        self.missed < MAX_MISSED_HEARTBEATS
    }
}

/// Serve one gateway client: send `Ready`, then stream every committed event
/// that passes the client's current filter until either side goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, registry: Arc<Registry>) {
    let conn_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the log head so nothing committed in between
    // is lost: the client may see an event both in backfill and live, never
    // in neither.
    let mut broadcast_rx = dispatcher.subscribe();

    let last_seq = match tokio::task::spawn_blocking(move || registry.last_event_seq()).await {
        Ok(Ok(seq)) => seq,
        Ok(Err(e)) => {
            warn!("Gateway client {}: could not read event log head: {}", conn_id, e);
            return;
        }
        Err(e) => {
            warn!("Gateway client {}: spawn_blocking join error: {}", conn_id, e);
            return;
        }
    };

    info!(
        "Gateway client {} connected (log head {:?}, {} live)",
        conn_id,
        last_seq,
        dispatcher.subscriber_count()
    );

    if send_event(&mut sender, &GatewayEvent::Ready { last_seq }).await.is_err() {
        return;
    }

    let (filter_tx, filter_rx) = watch::channel(EventFilter::default());

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward live events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut liveness = Heartbeat::default();

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let logged = match result {
                        Ok(logged) => logged,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Gateway client {} lagged by {} events", conn_id, n);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };

                    if !filter_rx.borrow().matches(&logged.event) {
                        continue;
                    }

                    if send_event(&mut sender, &GatewayEvent::Capsule(logged)).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if !liveness.tick(pong_flag_send.swap(false, Ordering::Acquire)) {
                        warn!("Gateway client {} heartbeat timeout, dropping", conn_id);
                        break;
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Subscribe(filter)) => {
                        trace!("Gateway client {} filter: {:?}", conn_id, filter);
                        if filter_tx.send(filter).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(
                            "Gateway client {} bad command: {} -- raw: {}",
                            conn_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Gateway client {} disconnected", conn_id);
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize gateway event: {}", e);
            return Err(());
        }
    };
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
