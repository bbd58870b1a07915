use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use pod_core::brakes::{ALL_BRAKES, BrakeConfig};
use pod_core::console::commands::{ConsoleError, ConsoleExecutor};
use pod_core::control::FlightControl;
use pod_core::faults::MemoryGuard;
use pod_core::mission::{CommandGate, GuardInputs, MissionTimerConfig};
use pod_core::range::RangeSample;
use pod_core::scheduler::{ElapsedTicks, FAST_TICK_MS, SLOW_TICK_MS};
use pod_core::telemetry::{EventId, StatusFormatter, TelemetryRate, TelemetrySnapshot};

use crate::sim::{SimulatedPlanner, SimulatedSensors};

/// Upper bound for a single `tick` command (one hour of flight time).
const MAX_TICKS_PER_COMMAND: u32 = 36_000;

const FAST_PER_SLOW: u32 = SLOW_TICK_MS / FAST_TICK_MS;

/// Canary words written by `corrupt`.
const CORRUPTED_GUARD: MemoryGuard = MemoryGuard::from_words(0xDEAD_BEEF, 0x0BAD_F00D);

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "tick",
        "tick [count]                  - advance simulated time in 100 ms steps",
    ),
    (
        "guard",
        "guard <name|all> <on|off>     - set a mission guard input",
    ),
    (
        "guards",
        "guards                        - list the mission guard inputs",
    ),
    (
        "range",
        "range <velocity-mm/s|off>     - feed or stop range-finder samples",
    ),
    (
        "mlp",
        "mlp <on|off>                  - connect or drop the displacement sensors",
    ),
    (
        "corrupt",
        "corrupt                       - overwrite the memory guard words",
    ),
    (
        "clear-faults",
        "clear-faults                  - clear the fault bitset",
    ),
];

const GUARD_NAMES: [&str; 9] = [
    "pod-init-complete",
    "armed-wait-checks-ok",
    "drive-checks-ok",
    "flight-prep-checks-ok",
    "flight-readiness-checks-ok",
    "accel-confirmed",
    "pusher-separation-confirmed",
    "pod-stop-confirmed",
    "spindown-complete-confirmed",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Interactive,
    Flight,
    BrakeTest,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "transcripts/emulator-session.log",
            TranscriptProfile::Flight => "transcripts/emulator-flight.log",
            TranscriptProfile::BrakeTest => "transcripts/emulator-brake-test.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Interactive => "Pod emulator interactive transcript",
            TranscriptProfile::Flight => "Pod emulator flight transcript",
            TranscriptProfile::BrakeTest => "Pod emulator brake test transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("interactive") {
            Ok(Self::Interactive)
        } else if tag.eq_ignore_ascii_case("flight") {
            Ok(Self::Flight)
        } else if tag.eq_ignore_ascii_case("brake-test") {
            Ok(Self::BrakeTest)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// Host-side flight-control context plus simulated hardware.
pub struct Session<W: Write = BufWriter<File>> {
    console: ConsoleExecutor<FlightControl>,
    planner: SimulatedPlanner,
    sensors: SimulatedSensors,
    guards: GuardInputs,
    range: Option<RangeSample>,
    frames: Vec<(TelemetryRate, TelemetrySnapshot)>,
    event_cursor: EventId,
    transcript: TranscriptLogger<W>,
    started_at: HostInstant,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::create(profile)?;
        Ok(Self::with_transcript(transcript))
    }
}

impl<W: Write> Session<W> {
    #[cfg(test)]
    pub fn with_writer(writer: W, profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(writer, profile)?;
        Ok(Self::with_transcript(transcript))
    }

    fn with_transcript(transcript: TranscriptLogger<W>) -> Self {
        let config = BrakeConfig::DEFAULT;
        let control = FlightControl::with_config(
            MissionTimerConfig::DEFAULT,
            config,
            CommandGate::new(),
        );

        Self {
            console: ConsoleExecutor::new(control),
            planner: SimulatedPlanner::new(
                config.stepper.max_velocity_um_s,
                config.geometry.retracted().screw_um,
            ),
            sensors: SimulatedSensors::new(&config),
            guards: GuardInputs::NONE,
            range: None,
            frames: Vec::new(),
            event_cursor: 0,
            transcript,
            started_at: HostInstant::now(),
        }
    }

    #[cfg(test)]
    pub fn control(&self) -> &FlightControl {
        self.console.control()
    }

    #[cfg(test)]
    pub fn planner(&self) -> &SimulatedPlanner {
        &self.planner
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut lines = self.dispatch(trimmed);
        lines.extend(self.drain_events());

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn dispatch(&mut self, line: &str) -> Vec<String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Vec::new();
        };
        let args: Vec<&str> = words.collect();

        match head.to_ascii_lowercase().as_str() {
            "tick" => self.handle_tick(&args),
            "guard" => self.handle_guard(&args),
            "guards" => self.describe_guards(),
            "range" => self.handle_range(&args),
            "mlp" => self.handle_mlp(&args),
            "corrupt" => {
                self.console.control_mut().overwrite_guard(CORRUPTED_GUARD);
                vec!["memory guard overwritten".to_string()]
            }
            "clear-faults" => {
                self.console.control_mut().clear_faults();
                vec!["faults cleared".to_string()]
            }
            "help" => self.handle_help(line, &args),
            _ => self.run_console(line),
        }
    }

    fn run_console(&mut self, line: &str) -> Vec<String> {
        match self.console.execute(line) {
            Ok(outcome) => outcome.to_string().lines().map(str::to_string).collect(),
            Err(err) => vec![format!("ERR {err}")],
        }
    }

    fn handle_help(&mut self, line: &str, args: &[&str]) -> Vec<String> {
        match args {
            [] => {
                let mut lines = self.run_console(line);
                lines.push("Emulator commands:".to_string());
                for (_, detail) in HELP_TOPICS {
                    lines.push(format!("  {detail}"));
                }
                lines
            }
            [topic] => {
                if let Some((_, detail)) = HELP_TOPICS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(topic))
                {
                    return vec![(*detail).to_string()];
                }
                match self.console.execute(line) {
                    Ok(outcome) => outcome.to_string().lines().map(str::to_string).collect(),
                    Err(ConsoleError::UnknownTopic(topic)) => vec![
                        format!("No help available for `{topic}`."),
                        format!("Available topics: {}", help_topic_list()),
                    ],
                    Err(err) => vec![format!("ERR {err}")],
                }
            }
            _ => self.run_console(line),
        }
    }

    fn handle_tick(&mut self, args: &[&str]) -> Vec<String> {
        let count = match args {
            [] => 1,
            [value] => match value.parse::<u32>() {
                Ok(count) if (1..=MAX_TICKS_PER_COMMAND).contains(&count) => count,
                _ => {
                    return vec![format!(
                        "ERR tick count must be 1..={MAX_TICKS_PER_COMMAND}"
                    )];
                }
            },
            _ => return vec!["ERR usage: tick [count]".to_string()],
        };

        self.frames.clear();
        for _ in 0..count {
            self.advance_slow_tick();
        }

        let fast = self
            .frames
            .iter()
            .filter(|(rate, _)| *rate == TelemetryRate::Fast10ms)
            .count();
        let slow = self.frames.len() - fast;
        let control = self.console.control();
        vec![format!(
            "advanced {} ms: state={} cycle={} telemetry fast={fast} slow={slow}",
            u64::from(count) * u64::from(SLOW_TICK_MS),
            control.mission().state(),
            control.cycle()
        )]
    }

    /// Runs one main-loop cycle per fast tick; the last one also carries the slow tick.
    fn advance_slow_tick(&mut self) {
        for index in 1..=FAST_PER_SLOW {
            let slow = u32::from(index == FAST_PER_SLOW);
            self.planner.advance(FAST_TICK_MS);

            if slow == 1 {
                self.feed_range();
            }

            let feedback = self.sensors.feedback(&self.planner);
            let control = self.console.control_mut();
            let report = control.process(
                ElapsedTicks::new(1, slow),
                &self.guards,
                &mut self.planner,
                &feedback,
            );
            control.publish(&report, &mut self.frames);
        }
    }

    fn feed_range(&mut self) {
        let Some(sample) = self.range.as_mut() else {
            return;
        };
        let travelled = i64::from(sample.velocity_mm_s) * i64::from(SLOW_TICK_MS) / 1_000;
        sample.distance_mm = sample
            .distance_mm
            .saturating_add(i32::try_from(travelled).unwrap_or(i32::MAX));
        let sample = *sample;
        self.console.control_mut().record_range(sample);
    }

    fn handle_guard(&mut self, args: &[&str]) -> Vec<String> {
        let [name, value] = args else {
            return vec!["ERR usage: guard <name|all> <on|off>".to_string()];
        };
        let Some(enabled) = parse_switch(value) else {
            return vec![format!("ERR expected on|off, found `{value}`")];
        };

        if name.eq_ignore_ascii_case("all") {
            for guard in GUARD_NAMES {
                if let Some(slot) = guard_slot(&mut self.guards, guard) {
                    *slot = enabled;
                }
            }
            return self.describe_guards();
        }

        match guard_slot(&mut self.guards, &name.to_ascii_lowercase()) {
            Some(slot) => {
                *slot = enabled;
                vec![format!("guard {name}={}", switch_label(enabled))]
            }
            None => vec![
                format!("ERR unknown guard `{name}`"),
                format!("Available guards: {}", GUARD_NAMES.join(", ")),
            ],
        }
    }

    fn describe_guards(&mut self) -> Vec<String> {
        GUARD_NAMES
            .iter()
            .filter_map(|name| {
                guard_slot(&mut self.guards, name)
                    .map(|slot| format!("guard {name}={}", switch_label(*slot)))
            })
            .collect()
    }

    fn handle_range(&mut self, args: &[&str]) -> Vec<String> {
        match args {
            [value] if value.eq_ignore_ascii_case("off") => {
                self.range = None;
                vec!["range feed stopped".to_string()]
            }
            [value] => match value.parse::<i32>() {
                Ok(velocity_mm_s) => {
                    let distance_mm = self.range.map_or(0, |sample| sample.distance_mm);
                    self.range = Some(RangeSample {
                        distance_mm,
                        velocity_mm_s,
                        accel_mm_ss: 0,
                    });
                    vec![format!("range feed velocity={velocity_mm_s}mm/s")]
                }
                Err(_) => vec![format!("ERR expected a velocity or `off`, found `{value}`")],
            },
            _ => vec!["ERR usage: range <velocity-mm/s|off>".to_string()],
        }
    }

    fn handle_mlp(&mut self, args: &[&str]) -> Vec<String> {
        let [value] = args else {
            return vec!["ERR usage: mlp <on|off>".to_string()];
        };
        match parse_switch(value) {
            Some(connected) => {
                self.sensors.mlp_connected = connected;
                let snapshot = self.console.control().snapshot();
                let mut lines = vec![format!("mlp sensors {}", switch_label(connected))];
                for id in ALL_BRAKES {
                    let mut line = String::new();
                    if StatusFormatter::new(&snapshot)
                        .write_brake_line(&mut line, id)
                        .is_ok()
                    {
                        lines.push(line);
                    }
                }
                lines
            }
            None => vec![format!("ERR expected on|off, found `{value}`")],
        }
    }

    /// Formats the events recorded since the previous command.
    fn drain_events(&mut self) -> Vec<String> {
        let events = self.console.control().events();
        let lines = events
            .since(self.event_cursor)
            .map(|record| {
                let level = if record.event.is_warning() {
                    "WARN"
                } else {
                    "INFO"
                };
                format!(
                    "{level} event #{} cycle={} {}",
                    record.id, record.cycle, record.event
                )
            })
            .collect();
        self.event_cursor = events.next_id();
        lines
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn guard_slot<'a>(guards: &'a mut GuardInputs, name: &str) -> Option<&'a mut bool> {
    let slot = match name {
        "pod-init-complete" => &mut guards.pod_init_complete,
        "armed-wait-checks-ok" => &mut guards.armed_wait_checks_ok,
        "drive-checks-ok" => &mut guards.drive_checks_ok,
        "flight-prep-checks-ok" => &mut guards.flight_prep_checks_ok,
        "flight-readiness-checks-ok" => &mut guards.flight_readiness_checks_ok,
        "accel-confirmed" => &mut guards.accel_confirmed,
        "pusher-separation-confirmed" => &mut guards.pusher_separation_confirmed,
        "pod-stop-confirmed" => &mut guards.pod_stop_confirmed,
        "spindown-complete-confirmed" => &mut guards.spindown_complete_confirmed,
        _ => return None,
    };
    Some(slot)
}

fn parse_switch(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on") {
        Some(true)
    } else if value.eq_ignore_ascii_case("off") {
        Some(false)
    } else {
        None
    }
}

fn switch_label(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn help_topic_list() -> String {
    pod_core::console::catalog::COMMANDS
        .iter()
        .map(|spec| spec.name)
        .chain(HELP_TOPICS.iter().map(|(name, _)| *name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Appends timestamped host and emulator lines to a transcript.
struct TranscriptLogger<W: Write> {
    writer: W,
}

impl TranscriptLogger<BufWriter<File>> {
    fn create(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Self::new(BufWriter::new(file), profile)
    }
}

impl<W: Write> TranscriptLogger<W> {
    fn new(writer: W, profile: TranscriptProfile) -> io::Result<Self> {
        let mut logger = Self { writer };
        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
