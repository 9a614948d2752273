use std::sync::{Mutex, PoisonError};

use chronos_types::events::LoggedEvent;

/// Receives every committed registry event, in commit order.
///
/// Called with the registry's write lock held: implementations must not
/// block and must not call back into the registry.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LoggedEvent);
}

/// Keeps every event in memory. Handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LoggedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoggedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &LoggedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
