use std::sync::Arc;

use chronos_db::Database;
use chronos_db::queries;
use chronos_types::events::{CapsuleEvent, LoggedEvent};
use chronos_types::models::{Capsule, CapsuleId, CapsuleInfo, Identity, MAX_MESSAGE_LEN, Timestamp};
use tracing::{debug, info};

use crate::context::CallContext;
use crate::error::{CapsuleError, Result};
use crate::sink::EventSink;

/// Owns every capsule, the id counter and the owner index.
///
/// Mutations run as one database transaction each, serialized by the
/// database lock; the sink is notified after commit and before the lock is
/// released, so sink order equals commit order.
pub struct Registry {
    db: Arc<Database>,
    sink: Arc<dyn EventSink>,
}

impl Registry {
    pub fn new(db: Arc<Database>, sink: Arc<dyn EventSink>) -> Self {
        Self { db, sink }
    }

    /// Deposit `message` under the caller, locked until `unlock_time`.
    pub fn create_capsule(
        &self,
        ctx: &CallContext,
        message: &str,
        unlock_time: Timestamp,
    ) -> Result<CapsuleId> {
        if unlock_time <= ctx.now {
            return Err(rejected(CapsuleError::InvalidUnlockTime {
                unlock_time,
                now: ctx.now,
            }));
        }
        if message.is_empty() {
            return Err(rejected(CapsuleError::EmptyMessage));
        }
        if message.len() > MAX_MESSAGE_LEN {
            return Err(rejected(CapsuleError::MessageTooLong { len: message.len() }));
        }

        let logged = self.db.with_tx(
            |tx| -> Result<LoggedEvent> {
                let id = queries::next_capsule_id(tx)?;
                queries::insert_capsule(tx, id, ctx.caller.as_str(), message, unlock_time)?;

                let event = CapsuleEvent::CapsuleCreated {
                    id,
                    owner: ctx.caller.clone(),
                    unlock_time,
                };
                let seq = queries::append_event(tx, ctx.now, &event)?;
                Ok(LoggedEvent {
                    seq,
                    at: ctx.now,
                    event,
                })
            },
            |logged| self.sink.emit(logged),
        )?;

        let id = logged.event.capsule_id();
        info!(
            "Capsule {} created by {} (unlocks at {})",
            id, ctx.caller, unlock_time
        );
        Ok(id)
    }

    /// Open a capsule. Only the owner may, only once, and only after the
    /// unlock time. Returns the stored message.
    pub fn reveal_capsule(&self, ctx: &CallContext, id: CapsuleId) -> Result<String> {
        let (message, _) = self
            .db
            .with_tx(
                |tx| -> Result<(String, LoggedEvent)> {
                    let capsule: Capsule = queries::query_capsule(tx, id)?
                        .ok_or(CapsuleError::CapsuleNotFound(id))?
                        .into();

                    if capsule.owner != ctx.caller {
                        return Err(CapsuleError::NotOwner(id));
                    }
                    if ctx.now < capsule.unlock_time {
                        return Err(CapsuleError::StillLocked {
                            id,
                            unlock_time: capsule.unlock_time,
                        });
                    }
                    if capsule.is_revealed {
                        return Err(CapsuleError::AlreadyRevealed(id));
                    }

                    queries::mark_revealed(tx, id)?;

                    let event = CapsuleEvent::CapsuleRevealed {
                        id,
                        owner: capsule.owner,
                        message: capsule.message.clone(),
                    };
                    let seq = queries::append_event(tx, ctx.now, &event)?;
                    Ok((
                        capsule.message,
                        LoggedEvent {
                            seq,
                            at: ctx.now,
                            event,
                        },
                    ))
                },
                |(_, logged)| self.sink.emit(logged),
            )
            .map_err(rejected)?;

        info!("Capsule {} revealed by {}", id, ctx.caller);
        Ok(message)
    }

    /// Public metadata for a capsule as of `now`. Never includes the message.
    pub fn get_capsule_info(&self, now: Timestamp, id: CapsuleId) -> Result<CapsuleInfo> {
        Ok(self.load(id)?.info(now))
    }

    /// Whether the capsule could be revealed at `now`, ignoring who asks.
    pub fn can_reveal_capsule(&self, now: Timestamp, id: CapsuleId) -> Result<bool> {
        Ok(self.load(id)?.can_be_revealed(now))
    }

    /// Ids owned by `owner` in creation order. Empty for unknown identities.
    pub fn get_user_capsules(&self, owner: &Identity) -> Result<Vec<CapsuleId>> {
        Ok(self.db.get_owner_capsules(owner.as_str())?)
    }

    /// Number of capsules ever created, which is also the next id.
    pub fn get_total_capsules(&self) -> Result<u64> {
        Ok(self.db.capsule_count()?)
    }

    /// Replay the event log from just after `after`.
    pub fn events_after(&self, after: u64, limit: u32) -> Result<Vec<LoggedEvent>> {
        let events = self
            .db
            .get_events_after(after, limit)?
            .into_iter()
            .map(LoggedEvent::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(events)
    }

    pub fn last_event_seq(&self) -> Result<Option<u64>> {
        Ok(self.db.last_event_seq()?)
    }

    fn load(&self, id: CapsuleId) -> Result<Capsule> {
        self.db
            .get_capsule(id)?
            .map(Capsule::from)
            .ok_or(CapsuleError::CapsuleNotFound(id))
    }
}

fn rejected(err: CapsuleError) -> CapsuleError {
    if !matches!(err, CapsuleError::Storage(_)) {
        debug!("Rejected: {}", err);
    }
    err
}
