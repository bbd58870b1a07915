//! Pod mission sequencer.
//!
//! The sequencer arbitrates the pod-wide operating mode from ground-station
//! commands, confirmation predicates supplied by other subsystems, and four
//! backup timers that force progress toward a stop when a confirmation never
//! arrives. Each call to [`MissionStateMachine::step`] is one scheduler cycle:
//! entry actions, time accounting, transition evaluation, then exit actions.

use core::fmt;

use heapless::Vec;

use crate::timing::Millis;

mod gate;
mod timers;
mod transitions;

pub use gate::{CommandGate, GateError, INTERLOCK_WINDOW_MS};
pub use timers::{ALL_BACKUP_TIMERS, BackupTimer, BackupTimers, MissionTimerConfig};
pub use transitions::{
    Confirmation, Evaluation, MAX_ACTIONS, MissionAction, MissionActions, Transition,
    TransitionCause, entry_actions, evaluate, exit_actions,
};

/// Top-level operating phase of the pod.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PodState {
    Init,
    Idle,
    TestMode,
    Drive,
    ArmedWait,
    FlightPrep,
    Ready,
    Accel,
    CoastInterlock,
    Brake,
    Spindown,
}

impl PodState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PodState::Init => "init",
            PodState::Idle => "idle",
            PodState::TestMode => "test-mode",
            PodState::Drive => "drive",
            PodState::ArmedWait => "armed-wait",
            PodState::FlightPrep => "flight-prep",
            PodState::Ready => "ready",
            PodState::Accel => "accel",
            PodState::CoastInterlock => "coast-interlock",
            PodState::Brake => "brake",
            PodState::Spindown => "spindown",
        }
    }

    /// Compact discriminant used by telemetry consumers.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            PodState::Init => 0,
            PodState::Idle => 1,
            PodState::TestMode => 2,
            PodState::Drive => 3,
            PodState::ArmedWait => 4,
            PodState::FlightPrep => 5,
            PodState::Ready => 6,
            PodState::Accel => 7,
            PodState::CoastInterlock => 8,
            PodState::Brake => 9,
            PodState::Spindown => 10,
        }
    }
}

impl fmt::Display for PodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Externally requested mission command.
///
/// No command reaches the flight states directly; those are entered through
/// confirmations or backup timeouts only.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PodCommand {
    Idle,
    TestMode,
    Drive,
    ArmedWait,
    FlightPrep,
    Ready,
}

/// Every command in index order.
pub const ALL_POD_COMMANDS: [PodCommand; 6] = [
    PodCommand::Idle,
    PodCommand::TestMode,
    PodCommand::Drive,
    PodCommand::ArmedWait,
    PodCommand::FlightPrep,
    PodCommand::Ready,
];

impl PodCommand {
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            PodCommand::Idle => 0,
            PodCommand::TestMode => 1,
            PodCommand::Drive => 2,
            PodCommand::ArmedWait => 3,
            PodCommand::FlightPrep => 4,
            PodCommand::Ready => 5,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PodCommand::Idle => "idle",
            PodCommand::TestMode => "test-mode",
            PodCommand::Drive => "drive",
            PodCommand::ArmedWait => "armed-wait",
            PodCommand::FlightPrep => "flight-prep",
            PodCommand::Ready => "ready",
        }
    }

    /// Looks up a command by its console label, ignoring ASCII case.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        ALL_POD_COMMANDS
            .iter()
            .copied()
            .find(|command| command.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for PodCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Confirmation and readiness predicates supplied by other subsystems.
///
/// Implementations must be side-effect free; the sequencer calls each one at
/// most once per cycle and only when the current state needs it.
pub trait MissionGuards {
    fn pod_init_complete(&self) -> bool;
    fn armed_wait_checks_ok(&self) -> bool;
    fn drive_checks_ok(&self) -> bool;
    fn flight_prep_checks_ok(&self) -> bool;
    fn flight_readiness_checks_ok(&self) -> bool;
    fn accel_confirmed(&self) -> bool;
    fn pusher_separation_confirmed(&self) -> bool;
    fn pod_stop_confirmed(&self) -> bool;
    fn spindown_complete_confirmed(&self) -> bool;
}

/// Guard values sampled once by the host and handed to the sequencer.
#[allow(clippy::struct_excessive_bools)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GuardInputs {
    pub pod_init_complete: bool,
    pub armed_wait_checks_ok: bool,
    pub drive_checks_ok: bool,
    pub flight_prep_checks_ok: bool,
    pub flight_readiness_checks_ok: bool,
    pub accel_confirmed: bool,
    pub pusher_separation_confirmed: bool,
    pub pod_stop_confirmed: bool,
    pub spindown_complete_confirmed: bool,
}

impl GuardInputs {
    /// Every predicate false.
    pub const NONE: Self = Self {
        pod_init_complete: false,
        armed_wait_checks_ok: false,
        drive_checks_ok: false,
        flight_prep_checks_ok: false,
        flight_readiness_checks_ok: false,
        accel_confirmed: false,
        pusher_separation_confirmed: false,
        pod_stop_confirmed: false,
        spindown_complete_confirmed: false,
    };
}

impl MissionGuards for GuardInputs {
    fn pod_init_complete(&self) -> bool {
        self.pod_init_complete
    }

    fn armed_wait_checks_ok(&self) -> bool {
        self.armed_wait_checks_ok
    }

    fn drive_checks_ok(&self) -> bool {
        self.drive_checks_ok
    }

    fn flight_prep_checks_ok(&self) -> bool {
        self.flight_prep_checks_ok
    }

    fn flight_readiness_checks_ok(&self) -> bool {
        self.flight_readiness_checks_ok
    }

    fn accel_confirmed(&self) -> bool {
        self.accel_confirmed
    }

    fn pusher_separation_confirmed(&self) -> bool {
        self.pusher_separation_confirmed
    }

    fn pod_stop_confirmed(&self) -> bool {
        self.pod_stop_confirmed
    }

    fn spindown_complete_confirmed(&self) -> bool {
        self.spindown_complete_confirmed
    }
}

/// A command whose readiness checks failed in `state`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandRejection {
    pub command: PodCommand,
    pub state: PodState,
}

/// Actions the owner of the sequencer must apply after a step.
pub type ExternalActions = Vec<MissionAction, { 2 * MAX_ACTIONS }>;

/// Outcome of one sequencer cycle.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StepReport {
    /// State whose entry actions ran this cycle.
    pub entered: Option<PodState>,
    pub transition: Option<Transition>,
    /// Newly observed rejection; repeats of the same rejection are suppressed.
    pub rejected: Option<CommandRejection>,
    /// Actions that reach beyond the sequencer (brake demands).
    pub actions: ExternalActions,
}

/// Owns the mission state, the command register, and the backup timers.
#[derive(Clone, Debug)]
pub struct MissionStateMachine {
    state: PodState,
    entered: Option<PodState>,
    command: Option<PodCommand>,
    timers: BackupTimers,
    last_rejection: Option<CommandRejection>,
}

impl MissionStateMachine {
    /// Creates a sequencer in [`PodState::Init`] with the supplied timer durations.
    #[must_use]
    pub const fn new(config: MissionTimerConfig) -> Self {
        Self {
            state: PodState::Init,
            entered: None,
            command: None,
            timers: BackupTimers::new(config),
            last_rejection: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> PodState {
        self.state
    }

    /// Current contents of the command register.
    #[must_use]
    pub const fn command(&self) -> Option<PodCommand> {
        self.command
    }

    #[must_use]
    pub const fn timers(&self) -> &BackupTimers {
        &self.timers
    }

    /// Overwrites the command register; the previous command is lost.
    pub fn set_command(&mut self, command: PodCommand) {
        self.command = Some(command);
    }

    pub fn clear_command(&mut self) {
        self.command = None;
    }

    /// Runs one scheduler cycle.
    ///
    /// `elapsed` is the time drained from the tick counters since the last
    /// cycle. It is applied after entry actions so a freshly armed backup
    /// timer counts the ticks drained on its entry cycle.
    pub fn step<G>(&mut self, elapsed: Millis, guards: &G) -> StepReport
    where
        G: MissionGuards + ?Sized,
    {
        let mut report = StepReport::default();

        if self.entered != Some(self.state) {
            self.entered = Some(self.state);
            report.entered = Some(self.state);
            let actions = entry_actions(self.state);
            self.apply(&actions, &mut report.actions);
        }

        self.timers.tick(elapsed);

        let evaluation = evaluate(self.state, self.command, &self.timers, guards);
        report.rejected = self.note_rejection(evaluation.rejected);

        if let Some(transition) = evaluation.transition {
            self.state = transition.to;
            report.transition = Some(transition);
            let actions = exit_actions(transition.from);
            self.apply(&actions, &mut report.actions);
        }

        report
    }

    fn note_rejection(&mut self, rejected: Option<PodCommand>) -> Option<CommandRejection> {
        let Some(command) = rejected else {
            self.last_rejection = None;
            return None;
        };

        let rejection = CommandRejection {
            command,
            state: self.state,
        };
        if self.last_rejection == Some(rejection) {
            return None;
        }

        self.last_rejection = Some(rejection);
        Some(rejection)
    }

    fn apply(&mut self, actions: &MissionActions, external: &mut ExternalActions) {
        for action in actions {
            match *action {
                MissionAction::ArmBackupTimer(timer) => self.timers.arm_exclusive(timer),
                MissionAction::StopBackupTimer(timer) => self.timers.stop(timer),
                MissionAction::DeployBrakes | MissionAction::RetractBrakes => {
                    let _ = external.push(*action);
                }
            }
        }
    }
}

impl Default for MissionStateMachine {
    fn default() -> Self {
        Self::new(MissionTimerConfig::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialised() -> (MissionStateMachine, GuardInputs) {
        let mut machine = MissionStateMachine::default();
        let guards = GuardInputs {
            pod_init_complete: true,
            ..GuardInputs::NONE
        };
        machine.step(0, &guards);
        assert_eq!(machine.state(), PodState::Idle);
        (machine, GuardInputs::NONE)
    }

    #[test]
    fn init_waits_for_pod_init_complete() {
        let mut machine = MissionStateMachine::default();
        let report = machine.step(100, &GuardInputs::NONE);

        assert_eq!(report.entered, Some(PodState::Init));
        assert_eq!(machine.state(), PodState::Init);
    }

    #[test]
    fn entry_runs_on_the_cycle_after_the_transition() {
        let (mut machine, guards) = initialised();
        let report = machine.step(0, &guards);
        assert_eq!(report.entered, Some(PodState::Idle));

        let report = machine.step(0, &guards);
        assert_eq!(report.entered, None);
    }

    #[test]
    fn only_one_transition_per_cycle() {
        let (mut machine, mut guards) = initialised();
        guards.armed_wait_checks_ok = true;
        guards.flight_prep_checks_ok = true;
        machine.set_command(PodCommand::ArmedWait);
        machine.step(0, &guards);
        assert_eq!(machine.state(), PodState::ArmedWait);

        machine.set_command(PodCommand::FlightPrep);
        let report = machine.step(0, &guards);
        assert_eq!(machine.state(), PodState::FlightPrep);
        assert_eq!(report.transition.map(|t| t.from), Some(PodState::ArmedWait));
    }

    #[test]
    fn rejected_command_stays_in_register_and_reports_once() {
        let (mut machine, mut guards) = initialised();
        machine.set_command(PodCommand::Drive);

        let first = machine.step(0, &guards);
        assert_eq!(
            first.rejected,
            Some(CommandRejection {
                command: PodCommand::Drive,
                state: PodState::Idle
            })
        );
        let second = machine.step(0, &guards);
        assert_eq!(second.rejected, None);
        assert_eq!(machine.command(), Some(PodCommand::Drive));

        guards.drive_checks_ok = true;
        machine.step(0, &guards);
        assert_eq!(machine.state(), PodState::Drive);
    }

    #[test]
    fn last_command_written_wins() {
        let (mut machine, guards) = initialised();
        machine.set_command(PodCommand::Drive);
        machine.set_command(PodCommand::TestMode);
        machine.step(0, &guards);

        assert_eq!(machine.state(), PodState::TestMode);
    }

    #[test]
    fn ticks_drained_on_entry_cycle_count_toward_backup_timer() {
        let (mut machine, mut guards) = initialised();
        guards.armed_wait_checks_ok = true;
        guards.flight_prep_checks_ok = true;
        guards.flight_readiness_checks_ok = true;
        for command in [PodCommand::ArmedWait, PodCommand::FlightPrep, PodCommand::Ready] {
            machine.set_command(command);
            machine.step(0, &guards);
        }
        assert_eq!(machine.state(), PodState::Ready);

        guards.accel_confirmed = true;
        machine.step(0, &guards);
        assert_eq!(machine.state(), PodState::Accel);

        let report = machine.step(10_000, &GuardInputs::NONE);
        assert_eq!(report.entered, Some(PodState::Accel));
        assert_eq!(machine.state(), PodState::CoastInterlock);
        match report.transition.map(|t| t.cause) {
            Some(TransitionCause::BackupTimeout(BackupTimer::Accel)) => {}
            other => panic!("unexpected cause: {other:?}"),
        }
        assert_eq!(machine.timers().started_count(), 0);
    }
}
