use serde::{Deserialize, Serialize};

use crate::models::{CapsuleId, Identity, Timestamp};

/// State-change notifications written by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CapsuleEvent {
    /// A capsule was deposited
    CapsuleCreated {
        id: CapsuleId,
        owner: Identity,
        unlock_time: Timestamp,
    },

    /// The owner opened a capsule. Carries the plaintext message.
    CapsuleRevealed {
        id: CapsuleId,
        owner: Identity,
        message: String,
    },
}

impl CapsuleEvent {
    pub fn capsule_id(&self) -> CapsuleId {
        match self {
            Self::CapsuleCreated { id, .. } | Self::CapsuleRevealed { id, .. } => *id,
        }
    }

    pub fn owner(&self) -> &Identity {
        match self {
            Self::CapsuleCreated { owner, .. } | Self::CapsuleRevealed { owner, .. } => owner,
        }
    }

    /// Stable name stored in the event log's `kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CapsuleCreated { .. } => "CapsuleCreated",
            Self::CapsuleRevealed { .. } => "CapsuleRevealed",
        }
    }
}

/// An event as appended to the durable log: `seq` is assigned at commit and
/// strictly increases, `at` is the logical time of the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub seq: u64,
    pub at: Timestamp,
    pub event: CapsuleEvent,
}

/// Filter over the indexed fields of an event. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub owner: Option<Identity>,
    #[serde(default)]
    pub capsule_id: Option<CapsuleId>,
}

impl EventFilter {
    pub fn matches(&self, event: &CapsuleEvent) -> bool {
        self.owner.as_ref().is_none_or(|o| o == event.owner())
            && self.capsule_id.is_none_or(|id| id == event.capsule_id())
    }
}

/// Frames sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Sent once after the socket opens. `last_seq` lets an indexer backfill
    /// from `/events` before consuming the live stream.
    Ready { last_seq: Option<u64> },

    /// A committed registry event
    Capsule(LoggedEvent),
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Replace this connection's filter. The default filter passes everything.
    Subscribe(EventFilter),
}
