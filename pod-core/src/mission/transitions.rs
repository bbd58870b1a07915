//! Pure transition logic for the mission sequencer.
//!
//! Nothing here mutates machine state: [`evaluate`] returns the chosen
//! transition (if any) and [`entry_actions`] / [`exit_actions`] return the
//! side effects the caller must apply. Table order is priority order.

use heapless::Vec;

use super::timers::{BackupTimer, BackupTimers};
use super::{MissionGuards, PodCommand, PodState};

/// Maximum number of actions emitted by a single entry or exit.
pub const MAX_ACTIONS: usize = 2;

/// Fixed-capacity action list returned by entry and exit handlers.
pub type MissionActions = Vec<MissionAction, MAX_ACTIONS>;

/// Side effects requested by the mission sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MissionAction {
    /// Start this backup timer from zero and stop the others.
    ArmBackupTimer(BackupTimer),
    /// Stop this backup timer.
    StopBackupTimer(BackupTimer),
    /// Drive every brake actuator to the fully deployed gap.
    DeployBrakes,
    /// Drive every brake actuator to the fully retracted gap.
    RetractBrakes,
}

/// Confirmation predicates consulted by the transition table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Confirmation {
    PodInitComplete,
    AccelConfirmed,
    PusherSeparationConfirmed,
    PodStopConfirmed,
    SpindownCompleteConfirmed,
}

/// Why a transition fired.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransitionCause {
    Command(PodCommand),
    Confirmation(Confirmation),
    BackupTimeout(BackupTimer),
}

/// A single fired transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub from: PodState,
    pub to: PodState,
    pub cause: TransitionCause,
}

/// Result of evaluating the transition table for one cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Evaluation {
    pub transition: Option<Transition>,
    /// Command whose checks guard was consulted and returned false.
    pub rejected: Option<PodCommand>,
}

impl Evaluation {
    const fn stay() -> Self {
        Self {
            transition: None,
            rejected: None,
        }
    }

    const fn fire(from: PodState, to: PodState, cause: TransitionCause) -> Self {
        Self {
            transition: Some(Transition { from, to, cause }),
            rejected: None,
        }
    }

    const fn reject(command: PodCommand) -> Self {
        Self {
            transition: None,
            rejected: Some(command),
        }
    }
}

/// Evaluates the transition table for `state`; the first matching row wins.
///
/// Each guard predicate is consulted at most once, and only when the row
/// that needs it is reached.
pub fn evaluate<G>(
    state: PodState,
    command: Option<PodCommand>,
    timers: &BackupTimers,
    guards: &G,
) -> Evaluation
where
    G: MissionGuards + ?Sized,
{
    use PodCommand as Cmd;
    use PodState as S;

    let by_command = |to: PodState, cmd: PodCommand| {
        Evaluation::fire(state, to, TransitionCause::Command(cmd))
    };
    let checked = |to: PodState, cmd: PodCommand, checks_ok: bool| {
        if checks_ok {
            by_command(to, cmd)
        } else {
            Evaluation::reject(cmd)
        }
    };
    let confirmed = |to: PodState, confirmation: Confirmation| {
        Evaluation::fire(state, to, TransitionCause::Confirmation(confirmation))
    };
    let timed_out = |to: PodState, timer: BackupTimer| {
        Evaluation::fire(state, to, TransitionCause::BackupTimeout(timer))
    };

    match (state, command) {
        (S::Init, _) => {
            if guards.pod_init_complete() {
                confirmed(S::Idle, Confirmation::PodInitComplete)
            } else {
                Evaluation::stay()
            }
        }

        (S::Idle, Some(Cmd::TestMode)) => by_command(S::TestMode, Cmd::TestMode),
        (S::Idle, Some(Cmd::ArmedWait)) => {
            checked(S::ArmedWait, Cmd::ArmedWait, guards.armed_wait_checks_ok())
        }
        (S::Idle, Some(Cmd::Drive)) => checked(S::Drive, Cmd::Drive, guards.drive_checks_ok()),

        (S::TestMode | S::Drive | S::ArmedWait, Some(Cmd::Idle)) => by_command(S::Idle, Cmd::Idle),
        (S::ArmedWait, Some(Cmd::FlightPrep)) => checked(
            S::FlightPrep,
            Cmd::FlightPrep,
            guards.flight_prep_checks_ok(),
        ),

        (S::FlightPrep, Some(Cmd::ArmedWait)) => by_command(S::ArmedWait, Cmd::ArmedWait),
        (S::FlightPrep, Some(Cmd::Ready)) => checked(
            S::Ready,
            Cmd::Ready,
            guards.flight_readiness_checks_ok(),
        ),

        (S::Ready, Some(Cmd::FlightPrep)) => by_command(S::FlightPrep, Cmd::FlightPrep),
        (S::Ready, _) => {
            if guards.accel_confirmed() {
                confirmed(S::Accel, Confirmation::AccelConfirmed)
            } else {
                Evaluation::stay()
            }
        }

        (S::Accel, _) => {
            if guards.pusher_separation_confirmed() {
                confirmed(S::CoastInterlock, Confirmation::PusherSeparationConfirmed)
            } else if timers.expired(BackupTimer::Accel) {
                timed_out(S::CoastInterlock, BackupTimer::Accel)
            } else {
                Evaluation::stay()
            }
        }

        (S::CoastInterlock, _) => {
            if timers.expired(BackupTimer::CoastInterlock) {
                timed_out(S::Brake, BackupTimer::CoastInterlock)
            } else {
                Evaluation::stay()
            }
        }

        (S::Brake, _) => {
            if guards.pod_stop_confirmed() {
                confirmed(S::Spindown, Confirmation::PodStopConfirmed)
            } else if timers.expired(BackupTimer::BrakeToSpindown) {
                timed_out(S::Spindown, BackupTimer::BrakeToSpindown)
            } else {
                Evaluation::stay()
            }
        }

        (S::Spindown, _) => {
            if guards.spindown_complete_confirmed() {
                confirmed(S::Idle, Confirmation::SpindownCompleteConfirmed)
            } else if timers.expired(BackupTimer::SpindownToIdle) {
                timed_out(S::Idle, BackupTimer::SpindownToIdle)
            } else {
                Evaluation::stay()
            }
        }

        _ => Evaluation::stay(),
    }
}

/// Actions run once on the first cycle a state is observed.
#[must_use]
pub fn entry_actions(state: PodState) -> MissionActions {
    let mut actions = MissionActions::new();
    if let Some(timer) = BackupTimer::for_state(state) {
        push(&mut actions, MissionAction::ArmBackupTimer(timer));
    }
    if state == PodState::Brake {
        push(&mut actions, MissionAction::DeployBrakes);
    }
    actions
}

/// Actions run once on the cycle a transition away from `state` fires.
#[must_use]
pub fn exit_actions(state: PodState) -> MissionActions {
    let mut actions = MissionActions::new();
    if let Some(timer) = BackupTimer::for_state(state) {
        push(&mut actions, MissionAction::StopBackupTimer(timer));
    }
    if state == PodState::Spindown {
        push(&mut actions, MissionAction::RetractBrakes);
    }
    actions
}

fn push(actions: &mut MissionActions, action: MissionAction) {
    // Capacity covers the largest entry/exit list.
    let _ = actions.push(action);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::{GuardInputs, MissionTimerConfig};
    use core::cell::Cell;

    fn timers() -> BackupTimers {
        BackupTimers::new(MissionTimerConfig::DEFAULT)
    }

    struct CountingGuards {
        inputs: GuardInputs,
        calls: Cell<u32>,
    }

    impl CountingGuards {
        fn bump(&self, value: bool) -> bool {
            self.calls.set(self.calls.get() + 1);
            value
        }
    }

    impl MissionGuards for CountingGuards {
        fn pod_init_complete(&self) -> bool {
            self.bump(self.inputs.pod_init_complete)
        }
        fn armed_wait_checks_ok(&self) -> bool {
            self.bump(self.inputs.armed_wait_checks_ok)
        }
        fn drive_checks_ok(&self) -> bool {
            self.bump(self.inputs.drive_checks_ok)
        }
        fn flight_prep_checks_ok(&self) -> bool {
            self.bump(self.inputs.flight_prep_checks_ok)
        }
        fn flight_readiness_checks_ok(&self) -> bool {
            self.bump(self.inputs.flight_readiness_checks_ok)
        }
        fn accel_confirmed(&self) -> bool {
            self.bump(self.inputs.accel_confirmed)
        }
        fn pusher_separation_confirmed(&self) -> bool {
            self.bump(self.inputs.pusher_separation_confirmed)
        }
        fn pod_stop_confirmed(&self) -> bool {
            self.bump(self.inputs.pod_stop_confirmed)
        }
        fn spindown_complete_confirmed(&self) -> bool {
            self.bump(self.inputs.spindown_complete_confirmed)
        }
    }

    #[test]
    fn idle_test_mode_needs_no_checks() {
        let guards = CountingGuards {
            inputs: GuardInputs::NONE,
            calls: Cell::new(0),
        };
        let result = evaluate(PodState::Idle, Some(PodCommand::TestMode), &timers(), &guards);

        match result.transition {
            Some(Transition { to: PodState::TestMode, cause, .. }) => {
                assert_eq!(cause, TransitionCause::Command(PodCommand::TestMode));
            }
            other => panic!("unexpected transition: {other:?}"),
        }
        assert_eq!(guards.calls.get(), 0);
    }

    #[test]
    fn failed_checks_reject_without_transition() {
        let result = evaluate(
            PodState::Idle,
            Some(PodCommand::ArmedWait),
            &timers(),
            &GuardInputs::NONE,
        );
        assert_eq!(result.transition, None);
        assert_eq!(result.rejected, Some(PodCommand::ArmedWait));
    }

    #[test]
    fn commands_without_a_row_are_ignored_silently() {
        let result = evaluate(PodState::Idle, Some(PodCommand::Ready), &timers(), &GuardInputs::NONE);
        assert_eq!(result, Evaluation::default());

        let result = evaluate(PodState::Accel, Some(PodCommand::Idle), &timers(), &GuardInputs::NONE);
        assert_eq!(result, Evaluation::default());
    }

    #[test]
    fn ready_prefers_command_over_accel_confirmation() {
        let guards = GuardInputs {
            accel_confirmed: true,
            ..GuardInputs::NONE
        };
        let result = evaluate(PodState::Ready, Some(PodCommand::FlightPrep), &timers(), &guards);
        assert_eq!(
            result.transition.map(|transition| transition.to),
            Some(PodState::FlightPrep)
        );
    }

    #[test]
    fn confirmation_wins_over_expired_timer() {
        let mut timers = timers();
        timers.arm_exclusive(BackupTimer::Accel);
        timers.tick(10_000);
        let guards = GuardInputs {
            pusher_separation_confirmed: true,
            ..GuardInputs::NONE
        };

        let result = evaluate(PodState::Accel, None, &timers, &guards);
        match result.transition {
            Some(transition) => assert_eq!(
                transition.cause,
                TransitionCause::Confirmation(Confirmation::PusherSeparationConfirmed)
            ),
            None => panic!("expected accel to exit"),
        }
    }

    #[test]
    fn each_guard_is_consulted_at_most_once() {
        let guards = CountingGuards {
            inputs: GuardInputs::NONE,
            calls: Cell::new(0),
        };
        let _ = evaluate(PodState::Brake, None, &timers(), &guards);
        assert_eq!(guards.calls.get(), 1);
    }

    #[test]
    fn brake_entry_deploys_and_spindown_exit_retracts() {
        let entry = entry_actions(PodState::Brake);
        assert_eq!(
            entry.as_slice(),
            &[
                MissionAction::ArmBackupTimer(BackupTimer::BrakeToSpindown),
                MissionAction::DeployBrakes
            ]
        );

        let exit = exit_actions(PodState::Spindown);
        assert_eq!(
            exit.as_slice(),
            &[
                MissionAction::StopBackupTimer(BackupTimer::SpindownToIdle),
                MissionAction::RetractBrakes
            ]
        );

        assert!(entry_actions(PodState::Idle).is_empty());
    }
}
