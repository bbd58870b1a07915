//! Time-bounded primitives shared by the mission and brake state machines.
//!
//! Every safety-relevant decision in the flight-control core is bounded by
//! one of these two types: a [`Timeout`] for backup timers and watchdogs, and
//! an [`InterlockCommand`] for the arm-then-confirm command gate. Both are
//! advanced only by the periodic tick path and expose read accessors so the
//! telemetry snapshot can report their progress.

mod interlock;
mod timeout;

pub use interlock::{InterlockCommand, RelockPolicy};
pub use timeout::Timeout;

/// Milliseconds, the time unit used by every timer in the core.
pub type Millis = u32;
