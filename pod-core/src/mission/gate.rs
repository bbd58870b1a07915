use core::fmt;

use super::{ALL_POD_COMMANDS, MissionStateMachine, PodCommand};
use crate::timing::{InterlockCommand, Millis, RelockPolicy};

/// Confirmation window for every net-facing mission command.
pub const INTERLOCK_WINDOW_MS: Millis = 10_000;

/// Error returned when a command is executed without an open interlock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateError {
    Locked(PodCommand),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Locked(command) => write!(f, "{command} is locked; unlock it first"),
        }
    }
}

/// Net-facing safety layer: one interlock per mission command.
///
/// A first packet unlocks the command, a second packet inside the window
/// writes it to the sequencer's command register.
#[derive(Copy, Clone, Debug)]
pub struct CommandGate {
    interlocks: [InterlockCommand; 6],
}

impl CommandGate {
    /// Creates a gate whose interlocks relock after each execution.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_policy(INTERLOCK_WINDOW_MS, RelockPolicy::ClearOnReset)
    }

    #[must_use]
    pub const fn with_policy(window: Millis, policy: RelockPolicy) -> Self {
        Self {
            interlocks: [InterlockCommand::with_policy(window, policy); 6],
        }
    }

    /// Arms the interlock for `command`.
    pub fn unlock(&mut self, command: PodCommand) {
        self.interlocks[command.as_index()].unlock();
    }

    #[must_use]
    pub const fn is_unlocked(&self, command: PodCommand) -> bool {
        self.interlocks[command.as_index()].is_unlocked()
    }

    #[must_use]
    pub const fn interlock(&self, command: PodCommand) -> &InterlockCommand {
        &self.interlocks[command.as_index()]
    }

    /// Writes `command` to the sequencer if its interlock is open, then
    /// resets that interlock.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Locked`] when the command was not unlocked or its
    /// window has lapsed; the command register is left untouched.
    pub fn execute(
        &mut self,
        command: PodCommand,
        mission: &mut MissionStateMachine,
    ) -> Result<(), GateError> {
        let interlock = &mut self.interlocks[command.as_index()];
        if !interlock.is_unlocked() {
            return Err(GateError::Locked(command));
        }

        mission.set_command(command);
        interlock.reset();
        Ok(())
    }

    /// Advances every confirmation window.
    pub fn tick(&mut self, delta: Millis) {
        for interlock in &mut self.interlocks {
            interlock.tick(delta);
        }
    }

    /// Iterates `(command, interlock)` pairs in command order.
    pub fn iter(&self) -> impl Iterator<Item = (PodCommand, &InterlockCommand)> + '_ {
        ALL_POD_COMMANDS
            .iter()
            .copied()
            .map(move |command| (command, self.interlock(command)))
    }
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_without_unlock_is_refused() {
        let mut gate = CommandGate::new();
        let mut mission = MissionStateMachine::default();

        assert_eq!(
            gate.execute(PodCommand::Drive, &mut mission),
            Err(GateError::Locked(PodCommand::Drive))
        );
        assert_eq!(mission.command(), None);
    }

    #[test]
    fn execute_inside_window_writes_register_and_relocks() {
        let mut gate = CommandGate::new();
        let mut mission = MissionStateMachine::default();

        gate.unlock(PodCommand::ArmedWait);
        gate.tick(9_900);
        gate.execute(PodCommand::ArmedWait, &mut mission)
            .expect("interlock should be open");
        assert_eq!(mission.command(), Some(PodCommand::ArmedWait));

        assert!(!gate.is_unlocked(PodCommand::ArmedWait));
    }

    #[test]
    fn lapsed_window_refuses_execution() {
        let mut gate = CommandGate::new();
        let mut mission = MissionStateMachine::default();

        gate.unlock(PodCommand::Ready);
        for _ in 0..100 {
            gate.tick(100);
        }

        assert!(gate.execute(PodCommand::Ready, &mut mission).is_err());
        assert_eq!(mission.command(), None);
    }

    #[test]
    fn interlocks_are_independent_per_command() {
        let mut gate = CommandGate::new();
        gate.unlock(PodCommand::Idle);

        assert!(gate.is_unlocked(PodCommand::Idle));
        assert!(!gate.is_unlocked(PodCommand::TestMode));
    }

    #[test]
    fn retain_policy_allows_repeat_execution() {
        let mut gate = CommandGate::with_policy(INTERLOCK_WINDOW_MS, RelockPolicy::RetainEnabled);
        let mut mission = MissionStateMachine::default();

        gate.unlock(PodCommand::Idle);
        gate.execute(PodCommand::Idle, &mut mission).expect("first execute");
        gate.execute(PodCommand::Idle, &mut mission).expect("second execute");
    }
}
