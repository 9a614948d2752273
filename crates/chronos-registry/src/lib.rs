//! The capsule registry: creation, ownership and the one-way locked to
//! revealed transition, with the clock and the event sink passed in from
//! outside.

pub mod clock;
pub mod context;
pub mod error;
pub mod registry;
pub mod sink;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::CallContext;
pub use error::{CapsuleError, Result};
pub use registry::Registry;
pub use sink::{EventSink, MemorySink};
