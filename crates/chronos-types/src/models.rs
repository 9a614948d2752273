use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds since the Unix epoch, as read from the caller's clock.
pub type Timestamp = u64;

/// Dense, 0-based capsule identifier issued by the registry counter.
pub type CapsuleId = u64;

/// Largest accepted capsule message, in bytes.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Opaque principal attributed to the caller of an operation.
///
/// The registry only ever compares identities for equality; what the string
/// holds (an account UUID, an address) is up to the adapter that builds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for Identity {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A time-locked message. Everything but `is_revealed` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule {
    pub id: CapsuleId,
    pub owner: Identity,
    pub message: String,
    pub unlock_time: Timestamp,
    pub is_revealed: bool,
}

impl Capsule {
    /// True once `now` has reached the unlock time and the capsule has not
    /// been revealed yet. Does not look at who is asking.
    pub fn can_be_revealed(&self, now: Timestamp) -> bool {
        now >= self.unlock_time && !self.is_revealed
    }

    pub fn info(&self, now: Timestamp) -> CapsuleInfo {
        CapsuleInfo {
            owner: self.owner.clone(),
            unlock_time: self.unlock_time,
            is_revealed: self.is_revealed,
            can_be_revealed: self.can_be_revealed(now),
        }
    }
}

/// Public view of a capsule. Never carries the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleInfo {
    pub owner: Identity,
    pub unlock_time: Timestamp,
    pub is_revealed: bool,
    pub can_be_revealed: bool,
}
