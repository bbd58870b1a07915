//! Flight-control context driven by the main loop.
//!
//! [`FlightControl`] owns every subsystem of the core and runs them in a fixed
//! order once per main-loop cycle. Time enters only through the
//! [`ElapsedTicks`] drained from the tick counters, and every observable
//! decision is written to the event log.

use crate::brakes::{
    ALL_BRAKES, BRAKE_COUNT, BrakeBank, BrakeChanges, BrakeConfig, BrakeError, BrakeFaultReason,
    BrakeFeedback, BrakeId, BrakeTarget, DevKey, MotionPlanner, RawMoveSelection,
};
use crate::faults::{ALL_FAULT_FLAGS, FaultFlag, FaultFlags, MemoryGuard};
use crate::mission::{
    ALL_BACKUP_TIMERS, CommandGate, GateError, MissionAction, MissionGuards, MissionStateMachine,
    MissionTimerConfig, PodCommand, StepReport,
};
use crate::range::{RangeMonitor, RangeSample};
use crate::scheduler::ElapsedTicks;
use crate::telemetry::{
    EventLog, MissionEvent, TelemetryRate, TelemetrySink, TelemetrySnapshot, TimerTelemetry,
};

/// Outcome of one main-loop cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u32,
    pub ticks: ElapsedTicks,
    pub guard_intact: bool,
    pub step: StepReport,
    pub brake_changes: BrakeChanges,
}

impl CycleReport {
    /// A 10 ms telemetry frame is due when at least one fast tick elapsed.
    #[must_use]
    pub const fn fast_telemetry_due(&self) -> bool {
        self.ticks.fast > 0
    }

    /// A 100 ms telemetry frame is due when at least one slow tick elapsed.
    #[must_use]
    pub const fn slow_telemetry_due(&self) -> bool {
        self.ticks.slow > 0
    }
}

/// Explicitly owned flight-control state.
#[derive(Debug)]
pub struct FlightControl {
    mission: MissionStateMachine,
    gate: CommandGate,
    brakes: BrakeBank,
    faults: FaultFlags,
    guard: MemoryGuard,
    range: RangeMonitor,
    events: EventLog,
    cycle: u32,
}

impl FlightControl {
    /// Context with default timers, brake configuration and command gate.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_config(
            MissionTimerConfig::DEFAULT,
            BrakeConfig::DEFAULT,
            CommandGate::new(),
        )
    }

    #[must_use]
    pub const fn with_config(
        timers: MissionTimerConfig,
        brakes: BrakeConfig,
        gate: CommandGate,
    ) -> Self {
        Self {
            mission: MissionStateMachine::new(timers),
            gate,
            brakes: BrakeBank::new(brakes),
            faults: FaultFlags::new(),
            guard: MemoryGuard::new(),
            range: RangeMonitor::new(),
            events: EventLog::new(),
            cycle: 0,
        }
    }

    #[must_use]
    pub const fn mission(&self) -> &MissionStateMachine {
        &self.mission
    }

    #[must_use]
    pub const fn gate(&self) -> &CommandGate {
        &self.gate
    }

    #[must_use]
    pub const fn brakes(&self) -> &BrakeBank {
        &self.brakes
    }

    #[must_use]
    pub const fn faults(&self) -> FaultFlags {
        self.faults
    }

    #[must_use]
    pub const fn range(&self) -> &RangeMonitor {
        &self.range
    }

    #[must_use]
    pub const fn events(&self) -> &EventLog {
        &self.events
    }

    #[must_use]
    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    #[must_use]
    pub const fn guard(&self) -> &MemoryGuard {
        &self.guard
    }

    /// Overwrites the canary words, as a stray write into the context would.
    ///
    /// Fault-injection hook; the next cycle reports the corruption.
    pub fn overwrite_guard(&mut self, guard: MemoryGuard) {
        self.guard = guard;
    }

    /// Opens the confirmation window for `command`.
    pub fn unlock(&mut self, command: PodCommand) {
        self.gate.unlock(command);
        self.record(MissionEvent::CommandUnlocked(command));
    }

    /// Passes `command` through the gate into the mission command register.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Locked`] when `command` was not unlocked within
    /// its window.
    pub fn execute(&mut self, command: PodCommand) -> Result<(), GateError> {
        let result = self.gate.execute(command, &mut self.mission);
        match result {
            Ok(()) => self.record(MissionEvent::CommandAccepted(command)),
            Err(GateError::Locked(command)) => self.record(MissionEvent::CommandLocked(command)),
        }
        result
    }

    /// Moves both brakes to a deployment percentage.
    ///
    /// # Errors
    ///
    /// See [`BrakeBank::move_percent`].
    pub fn move_brakes_percent(&mut self, percent: f32) -> Result<BrakeTarget, BrakeError> {
        self.brakes.move_percent(percent)
    }

    /// Moves both brakes to an absolute I-beam gap in microns.
    ///
    /// # Errors
    ///
    /// See [`BrakeBank::move_distance_um`].
    pub fn move_brakes_distance_um(&mut self, gap_um: u32) -> Result<BrakeTarget, BrakeError> {
        self.brakes.move_distance_um(gap_um)
    }

    /// Raw microstep move guarded by the development key.
    ///
    /// # Errors
    ///
    /// See [`BrakeBank::move_raw`].
    pub fn move_brakes_raw(
        &mut self,
        selection: RawMoveSelection,
        microsteps: i32,
        key: DevKey,
    ) -> Result<BrakeTarget, BrakeError> {
        let before = self.faults;
        let result = self
            .brakes
            .move_raw(selection, microsteps, key, &mut self.faults);
        self.record_raised_faults(before);
        result
    }

    pub fn enter_brake_test(&mut self, id: BrakeId) {
        self.brakes.enter_test(id);
    }

    /// # Errors
    ///
    /// See [`BrakeBank::exit_test`].
    pub fn exit_brake_test(&mut self, id: BrakeId) -> Result<(), BrakeError> {
        self.brakes.exit_test(id)
    }

    /// # Errors
    ///
    /// See [`BrakeBank::acknowledge_fault`].
    pub fn acknowledge_brake_fault(&mut self, id: BrakeId) -> Result<(), BrakeError> {
        self.brakes.acknowledge_fault(id)
    }

    pub fn force_brake_fault(&mut self, id: BrakeId, reason: BrakeFaultReason) {
        let before = self.faults;
        self.brakes.force_fault(id, reason, &mut self.faults);
        self.record_raised_faults(before);
    }

    /// Stores a decoded range-finder sample.
    pub fn record_range(&mut self, sample: RangeSample) {
        self.range.record(sample);
        self.faults.clear(FaultFlag::RangeSensorStale);
    }

    /// Clears every latched system fault flag.
    pub fn clear_faults(&mut self) {
        self.faults.clear_all();
    }

    /// Runs one main-loop cycle.
    pub fn process<G, P>(
        &mut self,
        ticks: ElapsedTicks,
        guards: &G,
        planner: &mut P,
        feedback: &[BrakeFeedback; BRAKE_COUNT],
    ) -> CycleReport
    where
        G: MissionGuards + ?Sized,
        P: MotionPlanner + ?Sized,
    {
        self.cycle = self.cycle.wrapping_add(1);
        let before = self.faults;

        let guard_intact = self.guard.is_intact();
        if !guard_intact {
            self.faults.raise(FaultFlag::GuardCorruption);
        }

        self.gate.tick(ticks.slow_ms());
        self.brakes.tick(ticks.fast_ms());
        self.range.tick(ticks.slow);
        if self.range.is_stale() {
            self.faults.raise(FaultFlag::RangeSensorStale);
        }

        let step = self.mission.step(ticks.slow_ms(), guards);
        if let Some(state) = step.entered {
            self.record(MissionEvent::StateEntered(state));
        }
        if let Some(rejection) = step.rejected {
            self.record(MissionEvent::CommandRejected(rejection));
        }
        if let Some(transition) = step.transition {
            self.record(MissionEvent::Transitioned(transition));
        }
        for action in &step.actions {
            let refusals = match action {
                MissionAction::DeployBrakes => self.brakes.deploy(),
                MissionAction::RetractBrakes => self.brakes.retract(),
                MissionAction::ArmBackupTimer(_) | MissionAction::StopBackupTimer(_) => continue,
            };
            for refusal in &refusals {
                self.record(MissionEvent::BrakeDemandRefused(*refusal));
            }
        }

        let brake_changes = self.brakes.process(planner, feedback, &mut self.faults);
        for change in &brake_changes {
            self.record(MissionEvent::BrakeChanged(*change));
        }

        self.record_raised_faults(before);

        CycleReport {
            cycle: self.cycle,
            ticks,
            guard_intact,
            step,
            brake_changes,
        }
    }

    /// Copies the exported state of every subsystem.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let timers = self.mission.timers();
        TelemetrySnapshot {
            cycle: self.cycle,
            mission_state: self.mission.state(),
            command: self.mission.command(),
            timers: ALL_BACKUP_TIMERS.map(|timer| TimerTelemetry::new(timer, timers.get(timer))),
            brakes: ALL_BRAKES.map(|id| self.brakes.actuator(id).telemetry()),
            faults: self.faults,
            stepper: self.brakes.config().stepper,
            range: self.range.fresh(),
        }
    }

    /// Hands a snapshot to `sink` for every telemetry rate due this cycle.
    pub fn publish<S>(&self, report: &CycleReport, sink: &mut S)
    where
        S: TelemetrySink + ?Sized,
    {
        if !report.fast_telemetry_due() && !report.slow_telemetry_due() {
            return;
        }

        let snapshot = self.snapshot();
        if report.fast_telemetry_due() {
            sink.publish(TelemetryRate::Fast10ms, &snapshot);
        }
        if report.slow_telemetry_due() {
            sink.publish(TelemetryRate::Slow100ms, &snapshot);
        }
    }

    fn record(&mut self, event: MissionEvent) {
        self.events.record(self.cycle, event);
    }

    fn record_raised_faults(&mut self, before: FaultFlags) {
        for flag in ALL_FAULT_FLAGS {
            if self.faults.contains(flag) && !before.contains(flag) {
                self.record(MissionEvent::FaultRaised(flag));
            }
        }
    }
}

impl Default for FlightControl {
    fn default() -> Self {
        Self::new()
    }
}
