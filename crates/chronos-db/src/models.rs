//! Database row types. These map directly to SQLite rows and are kept apart
//! from chronos-types so the schema can change without touching the API.

use anyhow::Result;
use chronos_types::events::{CapsuleEvent, LoggedEvent};
use chronos_types::models::{Capsule, Identity};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
}

pub struct CapsuleRow {
    pub id: u64,
    pub owner: String,
    pub message: String,
    pub unlock_time: u64,
    pub is_revealed: bool,
}

impl From<CapsuleRow> for Capsule {
    fn from(row: CapsuleRow) -> Self {
        Capsule {
            id: row.id,
            owner: Identity::new(row.owner),
            message: row.message,
            unlock_time: row.unlock_time,
            is_revealed: row.is_revealed,
        }
    }
}

pub struct EventRow {
    pub seq: u64,
    pub kind: String,
    pub capsule_id: u64,
    pub owner: String,
    pub at: u64,
    pub payload: String,
}

impl TryFrom<EventRow> for LoggedEvent {
    type Error = anyhow::Error;

    fn try_from(row: EventRow) -> Result<Self> {
        let event: CapsuleEvent = serde_json::from_str(&row.payload)
            .map_err(|e| anyhow::anyhow!("Corrupt payload on event {}: {}", row.seq, e))?;
        Ok(LoggedEvent {
            seq: row.seq,
            at: row.at,
            event,
        })
    }
}
