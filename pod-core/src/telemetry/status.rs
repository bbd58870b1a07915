use core::fmt;

use super::TelemetrySnapshot;
use crate::brakes::{BrakeId, BrakeTelemetry};

/// Renders a [`TelemetrySnapshot`] into human-readable status lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a TelemetrySnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a TelemetrySnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the mission line (e.g. `mission state=ready command=ready cycle=42`).
    pub fn write_mission_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "mission state={}", self.snapshot.mission_state)?;
        writer.write_str(" command=")?;
        match self.snapshot.command {
            Some(command) => write!(writer, "{command}")?,
            None => writer.write_str("none")?,
        }
        write!(writer, " cycle={}", self.snapshot.cycle)
    }

    /// Writes the backup timer line; only started timers show progress.
    pub fn write_timers_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("timers")?;
        for timer in &self.snapshot.timers {
            write!(writer, " {}=", timer.timer.label())?;
            if timer.started {
                write!(writer, "{}/{}ms", timer.elapsed_ms, timer.duration_ms)?;
            } else {
                writer.write_str("off")?;
            }
        }
        Ok(())
    }

    /// Writes one brake line (e.g. `brake left state=idle gap=22.00mm ...`).
    pub fn write_brake_line<W: fmt::Write>(&self, writer: &mut W, id: BrakeId) -> fmt::Result {
        let brake: &BrakeTelemetry = &self.snapshot.brakes[id.as_index()];
        write!(writer, "brake {} state={}", brake.id, brake.state)?;
        match brake.target {
            Some(target) => write!(
                writer,
                " target={:.2}mm screw={}um",
                target.gap_mm, target.screw_um
            )?,
            None => writer.write_str(" target=none")?,
        }
        write!(writer, " pos={}um", brake.motion.position_um)?;

        writer.write_str(" mlp=")?;
        match brake.mlp {
            Some(reading) => write!(writer, "{:.2}mm(raw={})", reading.gap_mm, reading.sample)?,
            None => writer.write_str("n/a")?,
        }

        write!(
            writer,
            " ext={} ret={}",
            brake.switches.extend.state.label(),
            brake.switches.retract.state.label()
        )?;

        if let Some(reason) = brake.fault {
            write!(writer, " fault={}", reason.label())?;
        }
        Ok(())
    }

    /// Writes the fault line (e.g. `faults 0x00000000 none`).
    pub fn write_faults_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "faults {:#010x} {}",
            self.snapshot.faults.bits(),
            self.snapshot.faults
        )
    }

    /// Writes the range-finder line.
    pub fn write_range_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        match self.snapshot.range {
            Some(sample) => write!(
                writer,
                "range distance={}mm velocity={}mm/s accel={}mm/s2",
                sample.distance_mm, sample.velocity_mm_s, sample.accel_mm_ss
            ),
            None => writer.write_str("range stale"),
        }
    }
}
