use chronos_types::models::{Identity, Timestamp};

use crate::clock::Clock;

/// Who is calling and what time it is, as seen by the adapter in front of
/// the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Identity,
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: Identity, now: Timestamp) -> Self {
        Self { caller, now }
    }

    /// Stamp `caller` with the current reading of `clock`.
    pub fn at(clock: &dyn Clock, caller: Identity) -> Self {
        Self {
            caller,
            now: clock.now(),
        }
    }
}
