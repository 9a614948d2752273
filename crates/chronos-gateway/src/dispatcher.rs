use std::sync::Arc;

use tokio::sync::broadcast;

use chronos_registry::EventSink;
use chronos_types::events::LoggedEvent;

/// Capacity of the live event channel. Subscribers that fall further behind
/// than this lose the oldest events and must backfill from `/events`.
const BROADCAST_CAPACITY: usize = 1024;

/// Fans committed registry events out to every connected gateway client.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<LoggedEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to live events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<LoggedEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: LoggedEvent) {
        // No receivers is fine: the event is already in the durable log.
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for Dispatcher {
    fn emit(&self, event: &LoggedEvent) {
        self.broadcast(event.clone());
    }
}
