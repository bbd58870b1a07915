//! Logging hooks for the flight-control core.
//!
//! The core records every decision in its event log and hands snapshots to a
//! [`TelemetrySink`]. This module mirrors new events to defmt (stdout on the
//! host) and logs a one-line summary of the slow-rate snapshots so bring-up
//! sessions can follow the mission without a diagnostics link.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use pod_core::brakes::BrakeId;
use pod_core::telemetry::{
    EventId, EventLog, EventRecord, TelemetryRate, TelemetrySink, TelemetrySnapshot,
};

/// Slow-rate frames between two summary lines (one second).
pub const SUMMARY_INTERVAL: u32 = 10;

/// Logs records appended to an [`EventLog`] since the previous drain.
#[derive(Debug, Default)]
pub struct EventMirror {
    cursor: EventId,
}

impl EventMirror {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Logs every record not seen yet and returns how many were logged.
    pub fn drain<const CAPACITY: usize>(&mut self, events: &EventLog<CAPACITY>) -> usize {
        let mut logged = 0;
        for record in events.since(self.cursor) {
            emit_event(record);
            logged += 1;
        }
        self.cursor = events.next_id();
        logged
    }
}

/// Sink that counts frames and logs a periodic snapshot summary.
#[derive(Debug, Default)]
pub struct SnapshotLogger {
    fast_frames: u32,
    slow_frames: u32,
    summaries: u32,
}

impl SnapshotLogger {
    pub const fn new() -> Self {
        Self {
            fast_frames: 0,
            slow_frames: 0,
            summaries: 0,
        }
    }

    pub const fn fast_frames(&self) -> u32 {
        self.fast_frames
    }

    pub const fn slow_frames(&self) -> u32 {
        self.slow_frames
    }

    pub const fn summaries(&self) -> u32 {
        self.summaries
    }
}

impl TelemetrySink for SnapshotLogger {
    fn publish(&mut self, rate: TelemetryRate, snapshot: &TelemetrySnapshot) {
        match rate {
            TelemetryRate::Fast10ms => self.fast_frames = self.fast_frames.wrapping_add(1),
            TelemetryRate::Slow100ms => {
                self.slow_frames = self.slow_frames.wrapping_add(1);
                if self.slow_frames % SUMMARY_INTERVAL == 0 {
                    self.summaries = self.summaries.wrapping_add(1);
                    emit_summary(snapshot);
                }
            }
        }
    }
}

#[cfg(target_os = "none")]
fn emit_event(record: &EventRecord) {
    let event = defmt::Display2Format(&record.event);
    if record.event.is_warning() {
        defmt::warn!(
            "telemetry:mission #{} cycle={} code={=u16:#x} {}",
            record.id,
            record.cycle,
            record.event.to_raw(),
            event
        );
    } else {
        defmt::info!(
            "telemetry:mission #{} cycle={} code={=u16:#x} {}",
            record.id,
            record.cycle,
            record.event.to_raw(),
            event
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_event(record: &EventRecord) {
    let level = if record.event.is_warning() { "WARN" } else { "INFO" };
    println!(
        "{level} telemetry:mission #{} cycle={} code={:#06x} {}",
        record.id,
        record.cycle,
        record.event.to_raw(),
        record.event
    );
}

#[cfg(target_os = "none")]
fn emit_summary(snapshot: &TelemetrySnapshot) {
    let left = &snapshot.brakes[BrakeId::Left.as_index()];
    let right = &snapshot.brakes[BrakeId::Right.as_index()];
    defmt::info!(
        "telemetry:snapshot cycle={} state={} faults={=u32:#010x} left={}@{}um right={}@{}um",
        snapshot.cycle,
        snapshot.mission_state.label(),
        snapshot.faults.bits(),
        left.state.label(),
        left.motion.position_um,
        right.state.label(),
        right.motion.position_um
    );
}

#[cfg(not(target_os = "none"))]
fn emit_summary(snapshot: &TelemetrySnapshot) {
    let left = &snapshot.brakes[BrakeId::Left.as_index()];
    let right = &snapshot.brakes[BrakeId::Right.as_index()];
    println!(
        "INFO telemetry:snapshot cycle={} state={} faults={:#010x} left={}@{}um right={}@{}um",
        snapshot.cycle,
        snapshot.mission_state,
        snapshot.faults.bits(),
        left.state.label(),
        left.motion.position_um,
        right.state.label(),
        right.motion.position_um
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_core::brakes::{BrakeFeedback, OpenLoopPlanner};
    use pod_core::control::FlightControl;
    use pod_core::mission::{GuardInputs, PodCommand};
    use pod_core::scheduler::ElapsedTicks;

    #[test]
    fn mirror_logs_each_event_once() {
        let mut control = FlightControl::new();
        let mut mirror = EventMirror::new();

        control.unlock(PodCommand::Idle);
        assert_eq!(mirror.drain(control.events()), 1);
        assert_eq!(mirror.drain(control.events()), 0);

        control.execute(PodCommand::Idle).expect("unlocked");
        control.execute(PodCommand::Idle).expect_err("window consumed");
        assert_eq!(mirror.drain(control.events()), 2);
    }

    #[test]
    fn summaries_follow_the_slow_rate() {
        let mut control = FlightControl::new();
        let mut planner = OpenLoopPlanner::new();
        let mut logger = SnapshotLogger::new();
        let feedback = [BrakeFeedback::EMPTY; 2];

        for _ in 0..25 {
            let report = control.process(
                ElapsedTicks::new(10, 1),
                &GuardInputs::NONE,
                &mut planner,
                &feedback,
            );
            control.publish(&report, &mut logger);
        }

        assert_eq!(logger.fast_frames(), 25);
        assert_eq!(logger.slow_frames(), 25);
        assert_eq!(logger.summaries(), 2);
    }
}
