//! Mission event catalog and the fixed-capacity event log.
//!
//! The core never logs directly. Every observable decision (state entries,
//! transitions, command gate activity, brake state changes, raised faults)
//! becomes a [`MissionEvent`] in an [`EventLog`]; the firmware mirrors new
//! records to defmt and the emulator prints them. Events carry compact
//! numeric codes for transport over diagnostics channels.

use core::fmt;

use heapless::HistoryBuf;

use crate::brakes::{BrakeRefusal, BrakeStateChange};
use crate::faults::FaultFlag;
use crate::mission::{CommandRejection, PodCommand, PodState, Transition, TransitionCause};

mod snapshot;
mod status;

pub use snapshot::{TelemetryRate, TelemetrySink, TelemetrySnapshot, TimerTelemetry};
pub use status::StatusFormatter;

/// Monotonic identifier assigned to each recorded event.
pub type EventId = u32;

/// Events retained by the log before the oldest are overwritten.
pub const EVENT_LOG_CAPACITY: usize = 64;

/// Observable decisions taken by the flight-control core.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MissionEvent {
    StateEntered(PodState),
    Transitioned(Transition),
    CommandRejected(CommandRejection),
    CommandUnlocked(PodCommand),
    CommandAccepted(PodCommand),
    /// Execute attempted without an open interlock.
    CommandLocked(PodCommand),
    BrakeChanged(BrakeStateChange),
    /// One actuator refused a brake demand issued by the sequencer.
    BrakeDemandRefused(BrakeRefusal),
    FaultRaised(FaultFlag),
}

impl MissionEvent {
    const STATE_ENTERED_BASE: u16 = 0x0100;
    const TRANSITION_BASE: u16 = 0x0200;
    const REJECTED_BASE: u16 = 0x0300;
    const UNLOCKED_BASE: u16 = 0x0400;
    const ACCEPTED_BASE: u16 = 0x0410;
    const LOCKED_BASE: u16 = 0x0420;
    const BRAKE_CHANGED_BASE: u16 = 0x0500;
    const BRAKE_REFUSED_BASE: u16 = 0x0600;
    const FAULT_BASE: u16 = 0x0700;

    /// Compact discriminant; the low byte carries the primary subject.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
    pub const fn to_raw(&self) -> u16 {
        match self {
            MissionEvent::StateEntered(state) => Self::STATE_ENTERED_BASE + state.to_raw() as u16,
            MissionEvent::Transitioned(transition) => {
                Self::TRANSITION_BASE + transition.to.to_raw() as u16
            }
            MissionEvent::CommandRejected(rejection) => {
                Self::REJECTED_BASE + rejection.command.as_index() as u16
            }
            MissionEvent::CommandUnlocked(command) => {
                Self::UNLOCKED_BASE + command.as_index() as u16
            }
            MissionEvent::CommandAccepted(command) => {
                Self::ACCEPTED_BASE + command.as_index() as u16
            }
            MissionEvent::CommandLocked(command) => Self::LOCKED_BASE + command.as_index() as u16,
            MissionEvent::BrakeChanged(change) => {
                Self::BRAKE_CHANGED_BASE + change.id.as_index() as u16
            }
            MissionEvent::BrakeDemandRefused(refusal) => {
                Self::BRAKE_REFUSED_BASE + refusal.id.as_index() as u16
            }
            MissionEvent::FaultRaised(flag) => Self::FAULT_BASE + flag.bit() as u16,
        }
    }

    /// Returns `true` for events that deserve a warning-level log line.
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        match self {
            MissionEvent::CommandRejected(_)
            | MissionEvent::CommandLocked(_)
            | MissionEvent::BrakeDemandRefused(_)
            | MissionEvent::FaultRaised(_) => true,
            MissionEvent::BrakeChanged(change) => change.fault.is_some(),
            _ => false,
        }
    }
}

impl fmt::Display for MissionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionEvent::StateEntered(state) => write!(f, "mission entered {state}"),
            MissionEvent::Transitioned(transition) => {
                write!(f, "mission {} -> {} (", transition.from, transition.to)?;
                match transition.cause {
                    TransitionCause::Command(command) => write!(f, "command {command}")?,
                    TransitionCause::Confirmation(confirmation) => {
                        write!(f, "confirmed {confirmation:?}")?;
                    }
                    TransitionCause::BackupTimeout(timer) => {
                        write!(f, "backup timeout {}", timer.label())?;
                    }
                }
                f.write_str(")")
            }
            MissionEvent::CommandRejected(rejection) => write!(
                f,
                "rejecting command {} in state {}: checks failed",
                rejection.command, rejection.state
            ),
            MissionEvent::CommandUnlocked(command) => write!(f, "command {command} unlocked"),
            MissionEvent::CommandAccepted(command) => write!(f, "command {command} accepted"),
            MissionEvent::CommandLocked(command) => {
                write!(f, "command {command} refused: interlock locked")
            }
            MissionEvent::BrakeChanged(change) => {
                write!(f, "brake {} {} -> {}", change.id, change.from, change.to)?;
                if let Some(reason) = change.fault {
                    write!(f, " ({})", reason.label())?;
                }
                Ok(())
            }
            MissionEvent::BrakeDemandRefused(refusal) => {
                write!(f, "brake {} demand refused: {}", refusal.id, refusal.error)
            }
            MissionEvent::FaultRaised(flag) => write!(f, "fault raised {flag}"),
        }
    }
}

/// Record stored in the event log.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub id: EventId,
    /// Process cycle on which the event was recorded.
    pub cycle: u32,
    pub event: MissionEvent,
}

/// Fixed-capacity event history; the oldest records are overwritten.
pub struct EventLog<const CAPACITY: usize = EVENT_LOG_CAPACITY> {
    ring: HistoryBuf<EventRecord, CAPACITY>,
    next_id: EventId,
}

impl<const CAPACITY: usize> EventLog<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_id: 0,
        }
    }

    pub fn record(&mut self, cycle: u32, event: MissionEvent) -> EventId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.ring.write(EventRecord { id, cycle, event });
        id
    }

    /// Identifier the next recorded event will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_id
    }

    pub fn latest(&self) -> Option<&EventRecord> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &EventRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `cursor`, oldest first.
    ///
    /// Consumers keep the cursor returned by [`next_id`](Self::next_id) to
    /// drain only new events; records overwritten in between are skipped.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &EventRecord> + '_ {
        self.oldest_first()
            .filter(move |record| record.id.wrapping_sub(cursor) < u32::MAX / 2)
    }
}

impl<const CAPACITY: usize> Default for EventLog<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> fmt::Debug for EventLog<CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
