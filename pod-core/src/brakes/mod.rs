//! Brake actuator state machines.
//!
//! Each actuator runs the same machine (`Idle → BeginMove → Moving →
//! MoveStopped → Idle`, plus `Fault` and `Test`), held side by side in a
//! [`BrakeBank`]. Moves are validated against the displacement sensor, the
//! limit switches, and the planner's reported position before anything is
//! handed to the [`MotionPlanner`]. A faulted actuator stays faulted until an
//! operator acknowledges it.

use core::fmt;

use heapless::Vec;

use crate::faults::{FaultFlag, FaultFlags};
use crate::timing::{Millis, Timeout};

mod feedback;
mod geometry;
mod planner;

pub use feedback::{
    BrakeFeedback, BrakeLimits, LimitSwitch, LimitSwitches, MlpCalibration, MlpReading,
    SwitchState,
};
pub use geometry::{BrakeGeometry, BrakeTarget, StepperParams, gap_difference};
pub use planner::{MotionPlanner, MotionSample, OpenLoopPlanner};

/// Number of brake actuators on the pod.
pub const BRAKE_COUNT: usize = 2;

/// Identifies one brake actuator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BrakeId {
    Left,
    Right,
}

/// Both actuators in index order.
pub const ALL_BRAKES: [BrakeId; BRAKE_COUNT] = [BrakeId::Left, BrakeId::Right];

impl BrakeId {
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            BrakeId::Left => 0,
            BrakeId::Right => 1,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BrakeId::Left => "left",
            BrakeId::Right => "right",
        }
    }
}

impl fmt::Display for BrakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State of one actuator's machine.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BrakeState {
    #[default]
    Idle,
    BeginMove,
    Moving,
    MoveStopped,
    Fault,
    Test,
}

impl BrakeState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BrakeState::Idle => "idle",
            BrakeState::BeginMove => "begin-move",
            BrakeState::Moving => "moving",
            BrakeState::MoveStopped => "move-stopped",
            BrakeState::Fault => "fault",
            BrakeState::Test => "test",
        }
    }
}

impl fmt::Display for BrakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why an actuator entered [`BrakeState::Fault`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BrakeFaultReason {
    SensorUnavailable,
    SensorOutOfRange,
    LimitConflict,
    PositionDisagreement,
    MoveTimeout,
    /// Forced from outside the machine (operator or another subsystem).
    External,
}

impl BrakeFaultReason {
    /// System fault flag latched alongside this reason.
    #[must_use]
    pub const fn flag(self) -> FaultFlag {
        match self {
            BrakeFaultReason::SensorUnavailable => FaultFlag::BrakeSensorUnavailable,
            BrakeFaultReason::SensorOutOfRange => FaultFlag::BrakeSensorOutOfRange,
            BrakeFaultReason::LimitConflict => FaultFlag::BrakeLimitConflict,
            BrakeFaultReason::PositionDisagreement => FaultFlag::BrakePositionDisagreement,
            BrakeFaultReason::MoveTimeout => FaultFlag::BrakeMoveTimeout,
            BrakeFaultReason::External => FaultFlag::General,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BrakeFaultReason::SensorUnavailable => "sensor-unavailable",
            BrakeFaultReason::SensorOutOfRange => "sensor-out-of-range",
            BrakeFaultReason::LimitConflict => "limit-conflict",
            BrakeFaultReason::PositionDisagreement => "position-disagreement",
            BrakeFaultReason::MoveTimeout => "move-timeout",
            BrakeFaultReason::External => "external",
        }
    }
}

/// Errors returned synchronously by the movement and maintenance API.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BrakeError {
    /// Requested gap lies outside the mechanical envelope.
    TargetOutOfRange { requested_mm: f32 },
    Faulted(BrakeId),
    TestMode(BrakeId),
    /// Raw move attempted with a development key other than the authorised pair.
    KeyMismatch,
    NotFaulted(BrakeId),
    NotInTest(BrakeId),
}

impl fmt::Display for BrakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrakeError::TargetOutOfRange { requested_mm } => {
                write!(f, "target gap {requested_mm}mm outside brake envelope")
            }
            BrakeError::Faulted(id) => write!(f, "{id} brake is faulted"),
            BrakeError::TestMode(id) => write!(f, "{id} brake is in test mode"),
            BrakeError::KeyMismatch => f.write_str("development key mismatch"),
            BrakeError::NotFaulted(id) => write!(f, "{id} brake is not faulted"),
            BrakeError::NotInTest(id) => write!(f, "{id} brake is not in test mode"),
        }
    }
}

/// Two-word key required by raw actuator moves.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DevKey {
    pub key0: u32,
    pub key1: u32,
}

impl DevKey {
    /// The only key pair that unlocks raw moves.
    pub const AUTHORISED: Self = Self::new(0x0129_3847, 0xABCD_0987);

    #[must_use]
    pub const fn new(key0: u32, key1: u32) -> Self {
        Self { key0, key1 }
    }
}

/// Actuators addressed by a raw move.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RawMoveSelection {
    Left,
    Right,
    Both,
}

impl RawMoveSelection {
    #[must_use]
    pub const fn includes(self, id: BrakeId) -> bool {
        matches!(
            (self, id),
            (RawMoveSelection::Both, _)
                | (RawMoveSelection::Left, BrakeId::Left)
                | (RawMoveSelection::Right, BrakeId::Right)
        )
    }
}

/// Configuration shared by both actuators.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BrakeConfig {
    pub geometry: BrakeGeometry,
    pub stepper: StepperParams,
    pub limits: BrakeLimits,
    pub calibration: MlpCalibration,
}

impl BrakeConfig {
    pub const DEFAULT: Self = Self {
        geometry: BrakeGeometry::DEFAULT,
        stepper: StepperParams::DEFAULT,
        limits: BrakeLimits::DEFAULT,
        calibration: MlpCalibration::DEFAULT,
    };
}

impl Default for BrakeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// State change observed during a bank process cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BrakeStateChange {
    pub id: BrakeId,
    pub from: BrakeState,
    pub to: BrakeState,
    /// Set when `to` is [`BrakeState::Fault`].
    pub fault: Option<BrakeFaultReason>,
}

/// An actuator that refused a demand issued by the mission sequencer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BrakeRefusal {
    pub id: BrakeId,
    pub error: BrakeError,
}

/// Refusals collected while applying one sequencer demand.
pub type BrakeRefusals = Vec<BrakeRefusal, BRAKE_COUNT>;

/// Per-actuator values exported through telemetry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BrakeTelemetry {
    pub id: BrakeId,
    pub state: BrakeState,
    /// `None` until the first move is requested.
    pub target: Option<BrakeTarget>,
    pub last_completed: Option<BrakeTarget>,
    pub switches: LimitSwitches,
    pub mlp: Option<MlpReading>,
    pub motion: MotionSample,
    pub fault: Option<BrakeFaultReason>,
}

/// One brake actuator and its state machine.
#[derive(Copy, Clone, Debug)]
pub struct BrakeActuator {
    id: BrakeId,
    state: BrakeState,
    reported: BrakeState,
    target: Option<BrakeTarget>,
    /// Set while a move requested in [`BrakeState::Test`] is in flight.
    test_move: bool,
    last_completed: Option<BrakeTarget>,
    switches: LimitSwitches,
    mlp: Option<MlpReading>,
    calibration: MlpCalibration,
    motion: MotionSample,
    fault: Option<BrakeFaultReason>,
    watchdog: Timeout,
    halt_pending: bool,
}

impl BrakeActuator {
    #[must_use]
    pub const fn new(id: BrakeId, config: &BrakeConfig) -> Self {
        Self {
            id,
            state: BrakeState::Idle,
            reported: BrakeState::Idle,
            target: None,
            test_move: false,
            last_completed: None,
            switches: LimitSwitches {
                extend: LimitSwitch::new(SwitchState::Unknown),
                retract: LimitSwitch::new(SwitchState::Unknown),
            },
            mlp: None,
            calibration: config.calibration,
            motion: MotionSample {
                position_um: 0,
                velocity_um_s: 0,
                accel_um_ss: 0,
            },
            fault: None,
            watchdog: Timeout::new(config.limits.move_watchdog_ms),
            halt_pending: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> BrakeId {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> BrakeState {
        self.state
    }

    /// Most recently commanded target, if any move was ever requested.
    #[must_use]
    pub const fn target(&self) -> Option<BrakeTarget> {
        self.target
    }

    /// Returns `true` in [`BrakeState::Test`] and while a test move runs.
    #[must_use]
    pub const fn in_test(&self) -> bool {
        matches!(self.state, BrakeState::Test) || self.test_move
    }

    #[must_use]
    pub const fn last_completed(&self) -> Option<BrakeTarget> {
        self.last_completed
    }

    #[must_use]
    pub const fn fault(&self) -> Option<BrakeFaultReason> {
        self.fault
    }

    #[must_use]
    pub const fn watchdog(&self) -> &Timeout {
        &self.watchdog
    }

    #[must_use]
    pub fn telemetry(&self) -> BrakeTelemetry {
        BrakeTelemetry {
            id: self.id,
            state: self.state,
            target: self.target,
            last_completed: self.last_completed,
            switches: self.switches,
            mlp: self.mlp,
            motion: self.motion,
            fault: self.fault,
        }
    }

    fn accepts_move(&self, raw: bool) -> Result<(), BrakeError> {
        if self.state == BrakeState::Fault {
            return Err(BrakeError::Faulted(self.id));
        }
        if !raw && self.in_test() {
            return Err(BrakeError::TestMode(self.id));
        }
        Ok(())
    }

    fn begin_move(&mut self, target: BrakeTarget) {
        if self.state == BrakeState::Test {
            self.test_move = true;
        }
        self.target = Some(target);
        self.state = BrakeState::BeginMove;
    }

    fn enter(&mut self, state: BrakeState) {
        if matches!(self.state, BrakeState::BeginMove | BrakeState::Moving) {
            self.halt_pending = true;
        }
        self.test_move = false;
        if state != BrakeState::Fault {
            self.fault = None;
        }
        self.watchdog.reset();
        self.state = state;
    }

    fn enter_fault(&mut self, reason: BrakeFaultReason, faults: &mut FaultFlags) {
        self.enter(BrakeState::Fault);
        self.fault = Some(reason);
        faults.raise(reason.flag());
    }

    fn tick(&mut self, delta: Millis) {
        self.watchdog.tick(delta);
    }

    /// Checks the position sensing before a move is committed.
    fn validate(&self, config: &BrakeConfig) -> Result<(), BrakeFaultReason> {
        let reading = self.mlp.ok_or(BrakeFaultReason::SensorUnavailable)?;

        let geometry = &config.geometry;
        let tolerance = config.limits.mlp_tolerance_mm;
        let lowest = geometry.min_gap_mm - tolerance;
        let highest = geometry.max_gap_mm + tolerance;
        if reading.gap_mm.is_nan() || reading.gap_mm < lowest || reading.gap_mm > highest {
            return Err(BrakeFaultReason::SensorOutOfRange);
        }

        if self.switches.conflict() {
            return Err(BrakeFaultReason::LimitConflict);
        }

        let planned_gap = geometry.gap_for_screw_um(self.motion.position_um);
        if gap_difference(planned_gap, reading.gap_mm) > config.limits.cross_check_tolerance_mm {
            return Err(BrakeFaultReason::PositionDisagreement);
        }

        Ok(())
    }

    /// Runs one cycle of the machine against fresh feedback.
    fn process<P>(
        &mut self,
        planner: &mut P,
        feedback: &BrakeFeedback,
        config: &BrakeConfig,
        faults: &mut FaultFlags,
    ) where
        P: MotionPlanner + ?Sized,
    {
        self.switches = feedback.switches;
        self.mlp = feedback
            .mlp_sample
            .map(|sample| self.calibration.read(sample));
        self.motion = planner.sample(self.id);

        if self.halt_pending {
            planner.halt(self.id);
            self.halt_pending = false;
        }

        match self.state {
            BrakeState::Idle | BrakeState::Fault | BrakeState::Test => {}
            BrakeState::BeginMove => match (self.validate(config), self.target) {
                (Ok(()), Some(target)) => {
                    planner.start_move(self.id, target.screw_um);
                    self.watchdog.restart();
                    self.state = BrakeState::Moving;
                }
                (Ok(()), None) => self.state = BrakeState::Idle,
                (Err(reason), _) => self.enter_fault(reason, faults),
            },
            BrakeState::Moving => {
                if self.mlp.is_none() {
                    faults.raise(FaultFlag::MlpDropout);
                }

                if self.switches.conflict() {
                    self.enter_fault(BrakeFaultReason::LimitConflict, faults);
                    planner.halt(self.id);
                    self.halt_pending = false;
                } else if self.watchdog.expired() {
                    self.enter_fault(BrakeFaultReason::MoveTimeout, faults);
                    planner.halt(self.id);
                    self.halt_pending = false;
                } else if planner.task_complete(self.id) {
                    self.watchdog.reset();
                    self.state = BrakeState::MoveStopped;
                }
            }
            BrakeState::MoveStopped => {
                self.last_completed = self.target;
                self.state = if self.test_move {
                    BrakeState::Test
                } else {
                    BrakeState::Idle
                };
                self.test_move = false;
            }
        }
    }

    /// Reports the change since the last report, if any.
    fn take_change(&mut self) -> Option<BrakeStateChange> {
        if self.reported == self.state {
            return None;
        }

        let change = BrakeStateChange {
            id: self.id,
            from: self.reported,
            to: self.state,
            fault: if self.state == BrakeState::Fault {
                self.fault
            } else {
                None
            },
        };
        self.reported = self.state;
        Some(change)
    }
}

/// Maximum state changes reported by one bank cycle.
pub const MAX_BRAKE_CHANGES: usize = 2 * BRAKE_COUNT;

/// State changes observed during one bank process cycle.
pub type BrakeChanges = Vec<BrakeStateChange, MAX_BRAKE_CHANGES>;

/// Both brake actuators plus their shared configuration.
#[derive(Clone, Debug)]
pub struct BrakeBank {
    actuators: [BrakeActuator; BRAKE_COUNT],
    config: BrakeConfig,
}

impl BrakeBank {
    #[must_use]
    pub const fn new(config: BrakeConfig) -> Self {
        Self {
            actuators: [
                BrakeActuator::new(BrakeId::Left, &config),
                BrakeActuator::new(BrakeId::Right, &config),
            ],
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &BrakeConfig {
        &self.config
    }

    #[must_use]
    pub const fn actuator(&self, id: BrakeId) -> &BrakeActuator {
        &self.actuators[id.as_index()]
    }

    fn actuator_mut(&mut self, id: BrakeId) -> &mut BrakeActuator {
        &mut self.actuators[id.as_index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &BrakeActuator> {
        self.actuators.iter()
    }

    /// Replaces the displacement-sensor calibration of one actuator.
    pub fn set_calibration(&mut self, id: BrakeId, calibration: MlpCalibration) {
        self.actuator_mut(id).calibration = calibration;
    }

    /// Moves both actuators to a deployment percentage, clamped to `0..=100`.
    ///
    /// # Errors
    ///
    /// Fails without moving either actuator if one is faulted or in test mode.
    pub fn move_percent(&mut self, percent: f32) -> Result<BrakeTarget, BrakeError> {
        let gap_mm = self.config.geometry.gap_for_percent(percent);
        self.move_gap_mm(gap_mm)
    }

    /// Moves both actuators to an absolute I-beam gap in microns.
    ///
    /// # Errors
    ///
    /// Returns [`BrakeError::TargetOutOfRange`] for gaps outside the geometry,
    /// or the refusal of either actuator; nothing moves on error.
    #[allow(clippy::cast_precision_loss)]
    pub fn move_distance_um(&mut self, gap_um: u32) -> Result<BrakeTarget, BrakeError> {
        self.move_gap_mm(gap_um as f32 / 1_000.0)
    }

    fn move_gap_mm(&mut self, gap_mm: f32) -> Result<BrakeTarget, BrakeError> {
        if !self.config.geometry.contains_gap(gap_mm) {
            return Err(BrakeError::TargetOutOfRange {
                requested_mm: gap_mm,
            });
        }

        for actuator in &self.actuators {
            actuator.accepts_move(false)?;
        }

        let target = self.config.geometry.target_for_gap(gap_mm);
        for actuator in &mut self.actuators {
            actuator.begin_move(target);
        }
        Ok(target)
    }

    /// Moves the selected actuators to a raw microstep position.
    ///
    /// Requires the authorised development key. A mismatch leaves every
    /// actuator untouched and latches [`FaultFlag::GuardKeyMismatch`]; a
    /// successful request latches [`FaultFlag::Modified`].
    ///
    /// # Errors
    ///
    /// Returns [`BrakeError::KeyMismatch`] or the refusal of a faulted actuator.
    pub fn move_raw(
        &mut self,
        selection: RawMoveSelection,
        microsteps: i32,
        key: DevKey,
        faults: &mut FaultFlags,
    ) -> Result<BrakeTarget, BrakeError> {
        if key != DevKey::AUTHORISED {
            faults.raise(FaultFlag::GuardKeyMismatch);
            return Err(BrakeError::KeyMismatch);
        }

        for actuator in self.selected(selection) {
            actuator.accepts_move(true)?;
        }

        let screw_um = self.config.stepper.microsteps_to_um(microsteps);
        let target = self.config.geometry.target_for_screw_um(screw_um);
        faults.raise(FaultFlag::Modified);
        for actuator in &mut self.actuators {
            if selection.includes(actuator.id) {
                actuator.begin_move(target);
            }
        }
        Ok(target)
    }

    fn selected(&self, selection: RawMoveSelection) -> impl Iterator<Item = &BrakeActuator> {
        self.actuators
            .iter()
            .filter(move |actuator| selection.includes(actuator.id))
    }

    /// Drives every actuator that accepts moves to the fully deployed gap.
    ///
    /// Unlike operator requests, a faulted or test-mode actuator does not
    /// hold back the other one; each refusal is returned instead.
    pub fn deploy(&mut self) -> BrakeRefusals {
        self.demand(self.config.geometry.deployed())
    }

    /// Drives every actuator that accepts moves to the fully retracted gap.
    pub fn retract(&mut self) -> BrakeRefusals {
        self.demand(self.config.geometry.retracted())
    }

    fn demand(&mut self, target: BrakeTarget) -> BrakeRefusals {
        let mut refusals = BrakeRefusals::new();
        for actuator in &mut self.actuators {
            match actuator.accepts_move(false) {
                Ok(()) => actuator.begin_move(target),
                Err(error) => {
                    let _ = refusals.push(BrakeRefusal {
                        id: actuator.id,
                        error,
                    });
                }
            }
        }
        refusals
    }

    /// Lead-screw positions implied by the displacement sensors.
    ///
    /// Readings are clamped to the envelope. Returns `None` until every
    /// actuator reports a sample.
    #[must_use]
    pub fn sensed_positions_um(
        &self,
        feedback: &[BrakeFeedback; BRAKE_COUNT],
    ) -> Option<[i32; BRAKE_COUNT]> {
        let geometry = &self.config.geometry;
        let mut positions = [0; BRAKE_COUNT];
        for ((position, actuator), sample) in
            positions.iter_mut().zip(&self.actuators).zip(feedback)
        {
            let reading = actuator.calibration.read(sample.mlp_sample?);
            let gap_mm = reading.gap_mm.clamp(geometry.min_gap_mm, geometry.max_gap_mm);
            *position = geometry.target_for_gap(gap_mm).screw_um;
        }
        Some(positions)
    }

    /// Forces an actuator into [`BrakeState::Fault`].
    pub fn force_fault(&mut self, id: BrakeId, reason: BrakeFaultReason, faults: &mut FaultFlags) {
        self.actuator_mut(id).enter_fault(reason, faults);
    }

    /// Leaves [`BrakeState::Fault`] for [`BrakeState::Idle`].
    ///
    /// System fault flags stay latched; clearing them is a separate decision.
    ///
    /// # Errors
    ///
    /// Returns [`BrakeError::NotFaulted`] when the actuator is not faulted.
    pub fn acknowledge_fault(&mut self, id: BrakeId) -> Result<(), BrakeError> {
        let actuator = self.actuator_mut(id);
        if actuator.state != BrakeState::Fault {
            return Err(BrakeError::NotFaulted(id));
        }

        actuator.fault = None;
        actuator.state = BrakeState::Idle;
        Ok(())
    }

    /// Enters the manual-override [`BrakeState::Test`] state.
    pub fn enter_test(&mut self, id: BrakeId) {
        self.actuator_mut(id).enter(BrakeState::Test);
    }

    /// Leaves [`BrakeState::Test`] for [`BrakeState::Idle`].
    ///
    /// A test move still in flight is halted.
    ///
    /// # Errors
    ///
    /// Returns [`BrakeError::NotInTest`] when the actuator is not in test mode.
    pub fn exit_test(&mut self, id: BrakeId) -> Result<(), BrakeError> {
        let actuator = self.actuator_mut(id);
        if !actuator.in_test() {
            return Err(BrakeError::NotInTest(id));
        }

        actuator.enter(BrakeState::Idle);
        Ok(())
    }

    /// Advances every move watchdog.
    pub fn tick(&mut self, delta: Millis) {
        for actuator in &mut self.actuators {
            actuator.tick(delta);
        }
    }

    /// Runs one cycle of both machines and returns the observed changes.
    pub fn process<P>(
        &mut self,
        planner: &mut P,
        feedback: &[BrakeFeedback; BRAKE_COUNT],
        faults: &mut FaultFlags,
    ) -> BrakeChanges
    where
        P: MotionPlanner + ?Sized,
    {
        let mut changes = BrakeChanges::new();
        let config = self.config;

        for (actuator, sample) in self.actuators.iter_mut().zip(feedback) {
            if let Some(change) = actuator.take_change() {
                let _ = changes.push(change);
            }
            actuator.process(planner, sample, &config, faults);
            if let Some(change) = actuator.take_change() {
                let _ = changes.push(change);
            }
        }

        let moving = self
            .actuators
            .iter()
            .any(|actuator| actuator.state == BrakeState::Moving);
        let sensing = feedback.iter().all(|sample| sample.mlp_sample.is_some());
        if sensing || !moving {
            faults.clear(FaultFlag::MlpDropout);
        }

        changes
    }
}

impl Default for BrakeBank {
    fn default() -> Self {
        Self::new(BrakeConfig::DEFAULT)
    }
}
