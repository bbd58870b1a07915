//! Applies parsed console commands to the flight-control context.

use core::borrow::BorrowMut;
use core::fmt;

use super::catalog::{self, COMMANDS, CommandSpec};
use super::grammar::{self, BrakeCommand, ConsoleCommand, ParseError};
use crate::brakes::{ALL_BRAKES, BrakeError, BrakeId, BrakeTarget};
use crate::control::FlightControl;
use crate::mission::{GateError, PodCommand};
use crate::telemetry::{StatusFormatter, TelemetrySnapshot};

/// Successful console command results.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConsoleOutcome {
    Unlocked(PodCommand),
    Executed(PodCommand),
    BrakeMove(BrakeTarget),
    BrakeTest { id: BrakeId, enabled: bool },
    BrakeAcknowledged(BrakeId),
    Status(TelemetrySnapshot),
    /// `None` lists every command.
    Help(Option<&'static CommandSpec>),
}

impl fmt::Display for ConsoleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleOutcome::Unlocked(command) => write!(f, "{command} unlocked"),
            ConsoleOutcome::Executed(command) => write!(f, "{command} sent to sequencer"),
            ConsoleOutcome::BrakeMove(target) => write!(
                f,
                "brakes moving to gap {:.2}mm (screw {}um)",
                target.gap_mm, target.screw_um
            ),
            ConsoleOutcome::BrakeTest { id, enabled: true } => write!(f, "{id} brake in test mode"),
            ConsoleOutcome::BrakeTest { id, enabled: false } => {
                write!(f, "{id} brake left test mode")
            }
            ConsoleOutcome::BrakeAcknowledged(id) => write!(f, "{id} brake fault acknowledged"),
            ConsoleOutcome::Status(snapshot) => write_status(f, snapshot),
            ConsoleOutcome::Help(Some(spec)) => write_help(f, spec),
            ConsoleOutcome::Help(None) => {
                for (index, spec) in COMMANDS.iter().enumerate() {
                    if index > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{:<8} {}", spec.name, spec.summary)?;
                }
                Ok(())
            }
        }
    }
}

fn write_status(f: &mut fmt::Formatter<'_>, snapshot: &TelemetrySnapshot) -> fmt::Result {
    let formatter = StatusFormatter::new(snapshot);
    formatter.write_mission_line(f)?;
    f.write_str("\n")?;
    formatter.write_timers_line(f)?;
    for id in ALL_BRAKES {
        f.write_str("\n")?;
        formatter.write_brake_line(f, id)?;
    }
    f.write_str("\n")?;
    formatter.write_faults_line(f)?;
    f.write_str("\n")?;
    formatter.write_range_line(f)
}

fn write_help(f: &mut fmt::Formatter<'_>, spec: &CommandSpec) -> fmt::Result {
    write!(f, "{}: {}", spec.name, spec.summary)?;
    for usage in spec.usage {
        write!(f, "\n  {usage}")?;
    }
    Ok(())
}

/// Errors surfaced while executing a console line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConsoleError<'a> {
    Parse(ParseError<'a>),
    Gate(GateError),
    Brake(BrakeError),
    UnknownTopic(&'a str),
}

impl<'a> From<ParseError<'a>> for ConsoleError<'a> {
    fn from(error: ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<GateError> for ConsoleError<'_> {
    fn from(error: GateError) -> Self {
        Self::Gate(error)
    }
}

impl From<BrakeError> for ConsoleError<'_> {
    fn from(error: BrakeError) -> Self {
        Self::Brake(error)
    }
}

impl fmt::Display for ConsoleError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Parse(error) => write!(f, "parse error: {error}"),
            ConsoleError::Gate(error) => write!(f, "gate error: {error}"),
            ConsoleError::Brake(error) => write!(f, "brake error: {error}"),
            ConsoleError::UnknownTopic(topic) => write!(f, "no help for `{topic}`"),
        }
    }
}

/// Dispatches console lines into a [`FlightControl`].
///
/// `C` is either an owned context or a mutable borrow of one.
pub struct ConsoleExecutor<C> {
    control: C,
}

impl<C> ConsoleExecutor<C> {
    #[must_use]
    pub const fn new(control: C) -> Self {
        Self { control }
    }

    #[must_use]
    pub fn into_inner(self) -> C {
        self.control
    }
}

impl<C> ConsoleExecutor<C>
where
    C: BorrowMut<FlightControl>,
{
    #[must_use]
    pub fn control(&self) -> &FlightControl {
        self.control.borrow()
    }

    pub fn control_mut(&mut self) -> &mut FlightControl {
        self.control.borrow_mut()
    }

    /// Parses and executes one console line.
    ///
    /// # Errors
    ///
    /// Returns the parse failure, or the refusal of the gate or brake bank.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<ConsoleOutcome, ConsoleError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(
        &mut self,
        command: ConsoleCommand<'a>,
    ) -> Result<ConsoleOutcome, ConsoleError<'a>> {
        let control = self.control.borrow_mut();
        match command {
            ConsoleCommand::Unlock(command) => {
                control.unlock(command);
                Ok(ConsoleOutcome::Unlocked(command))
            }
            ConsoleCommand::Execute(command) => {
                control.execute(command)?;
                Ok(ConsoleOutcome::Executed(command))
            }
            ConsoleCommand::Brake(brake) => Self::brake(control, brake),
            ConsoleCommand::Status => Ok(ConsoleOutcome::Status(control.snapshot())),
            ConsoleCommand::Help(None) => Ok(ConsoleOutcome::Help(None)),
            ConsoleCommand::Help(Some(topic)) => catalog::lookup(topic)
                .map(|spec| ConsoleOutcome::Help(Some(spec)))
                .ok_or(ConsoleError::UnknownTopic(topic)),
        }
    }

    fn brake<'a>(
        control: &mut FlightControl,
        command: BrakeCommand,
    ) -> Result<ConsoleOutcome, ConsoleError<'a>> {
        match command {
            BrakeCommand::Percent(percent) => {
                let target = control.move_brakes_percent(f32::from(percent))?;
                Ok(ConsoleOutcome::BrakeMove(target))
            }
            BrakeCommand::DistanceUm(gap_um) => {
                let target = control.move_brakes_distance_um(gap_um)?;
                Ok(ConsoleOutcome::BrakeMove(target))
            }
            BrakeCommand::Raw {
                selection,
                microsteps,
                key,
            } => {
                let target = control.move_brakes_raw(selection, microsteps, key)?;
                Ok(ConsoleOutcome::BrakeMove(target))
            }
            BrakeCommand::Test { id, enabled: true } => {
                control.enter_brake_test(id);
                Ok(ConsoleOutcome::BrakeTest { id, enabled: true })
            }
            BrakeCommand::Test { id, enabled: false } => {
                control.exit_brake_test(id)?;
                Ok(ConsoleOutcome::BrakeTest { id, enabled: false })
            }
            BrakeCommand::Acknowledge(id) => {
                control.acknowledge_brake_fault(id)?;
                Ok(ConsoleOutcome::BrakeAcknowledged(id))
            }
        }
    }
}
