use crate::brakes::{BRAKE_COUNT, BrakeTelemetry, StepperParams};
use crate::faults::FaultFlags;
use crate::mission::{BackupTimer, PodCommand, PodState};
use crate::range::RangeSample;
use crate::timing::{Millis, Timeout};

/// Progress of one backup timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimerTelemetry {
    pub timer: BackupTimer,
    pub elapsed_ms: Millis,
    pub duration_ms: Millis,
    pub started: bool,
}

impl TimerTelemetry {
    #[must_use]
    pub const fn new(timer: BackupTimer, timeout: &Timeout) -> Self {
        Self {
            timer,
            elapsed_ms: timeout.elapsed(),
            duration_ms: timeout.duration(),
            started: timeout.is_started(),
        }
    }
}

/// Everything the diagnostics link exports about the flight-control core.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TelemetrySnapshot {
    pub cycle: u32,
    pub mission_state: PodState,
    pub command: Option<PodCommand>,
    pub timers: [TimerTelemetry; 4],
    pub brakes: [BrakeTelemetry; BRAKE_COUNT],
    pub faults: FaultFlags,
    pub stepper: StepperParams,
    pub range: Option<RangeSample>,
}

/// Export cadence a snapshot was produced for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryRate {
    Fast10ms,
    Slow100ms,
}

/// Packet-framing collaborator that ships snapshots off the pod.
pub trait TelemetrySink {
    fn publish(&mut self, rate: TelemetryRate, snapshot: &TelemetrySnapshot);
}

/// Host-side sink that keeps every published frame.
#[cfg(feature = "alloc")]
impl TelemetrySink for alloc::vec::Vec<(TelemetryRate, TelemetrySnapshot)> {
    fn publish(&mut self, rate: TelemetryRate, snapshot: &TelemetrySnapshot) {
        self.push((rate, *snapshot));
    }
}
