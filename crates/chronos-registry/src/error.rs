use chronos_types::models::{CapsuleId, MAX_MESSAGE_LEN, Timestamp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapsuleError {
    #[error("unlock time {unlock_time} is not after current time {now}")]
    InvalidUnlockTime { unlock_time: Timestamp, now: Timestamp },

    #[error("message is empty")]
    EmptyMessage,

    #[error("message is {len} bytes, limit is {}", MAX_MESSAGE_LEN)]
    MessageTooLong { len: usize },

    #[error("capsule {0} not found")]
    CapsuleNotFound(CapsuleId),

    #[error("caller does not own capsule {0}")]
    NotOwner(CapsuleId),

    #[error("capsule {id} is locked until {unlock_time}")]
    StillLocked { id: CapsuleId, unlock_time: Timestamp },

    #[error("capsule {0} was already revealed")]
    AlreadyRevealed(CapsuleId),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CapsuleError {
    /// Machine-readable reason, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUnlockTime { .. } => "InvalidUnlockTime",
            Self::EmptyMessage => "EmptyMessage",
            Self::MessageTooLong { .. } => "MessageTooLong",
            Self::CapsuleNotFound(_) => "CapsuleNotFound",
            Self::NotOwner(_) => "NotOwner",
            Self::StillLocked { .. } => "StillLocked",
            Self::AlreadyRevealed(_) => "AlreadyRevealed",
            Self::Storage(_) => "Storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, CapsuleError>;
