//! Conversions between I-beam gap, lead-screw travel, and stepper microsteps.
//!
//! Lead-screw travel is measured from the fully deployed position: zero
//! microns puts the pads at the minimum I-beam gap and travel grows as the
//! brake retracts.

/// Mechanical envelope of one brake actuator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BrakeGeometry {
    /// Gap at full deployment (pads closest to the I-beam).
    pub min_gap_mm: f32,
    /// Gap at full retraction.
    pub max_gap_mm: f32,
    /// Gap change per millimetre of lead-screw travel (tan 17°).
    pub gap_per_screw_mm: f32,
}

impl BrakeGeometry {
    pub const DEFAULT: Self = Self {
        min_gap_mm: 2.5,
        max_gap_mm: 22.0,
        gap_per_screw_mm: 0.305_730_7,
    };

    /// Clamps a percentage to `0..=100`; NaN maps to fully retracted.
    #[must_use]
    pub fn clamp_percent(percent: f32) -> f32 {
        if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        }
    }

    /// Gap for a deployment percentage (0 = retracted, 100 = deployed).
    #[must_use]
    pub fn gap_for_percent(&self, percent: f32) -> f32 {
        let fraction = Self::clamp_percent(percent) / 100.0;
        self.max_gap_mm - fraction * (self.max_gap_mm - self.min_gap_mm)
    }

    #[must_use]
    pub fn contains_gap(&self, gap_mm: f32) -> bool {
        gap_mm >= self.min_gap_mm && gap_mm <= self.max_gap_mm
    }

    #[must_use]
    pub fn screw_mm_for_gap(&self, gap_mm: f32) -> f32 {
        (gap_mm - self.min_gap_mm) / self.gap_per_screw_mm
    }

    #[must_use]
    pub fn gap_for_screw_um(&self, screw_um: i32) -> f32 {
        um_to_mm(screw_um) * self.gap_per_screw_mm + self.min_gap_mm
    }

    /// Target for an I-beam gap expressed in millimetres.
    #[must_use]
    pub fn target_for_gap(&self, gap_mm: f32) -> BrakeTarget {
        let screw_mm = self.screw_mm_for_gap(gap_mm);
        BrakeTarget {
            gap_mm,
            screw_mm,
            screw_um: mm_to_um(screw_mm),
        }
    }

    /// Target for a raw lead-screw position; may lie outside the envelope.
    #[must_use]
    pub fn target_for_screw_um(&self, screw_um: i32) -> BrakeTarget {
        BrakeTarget {
            gap_mm: self.gap_for_screw_um(screw_um),
            screw_mm: um_to_mm(screw_um),
            screw_um,
        }
    }

    #[must_use]
    pub fn deployed(&self) -> BrakeTarget {
        self.target_for_gap(self.min_gap_mm)
    }

    #[must_use]
    pub fn retracted(&self) -> BrakeTarget {
        self.target_for_gap(self.max_gap_mm)
    }
}

impl Default for BrakeGeometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Commanded brake position in every representation consumers need.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BrakeTarget {
    pub gap_mm: f32,
    pub screw_mm: f32,
    pub screw_um: i32,
}

/// Stepper drive parameters shared by both actuators.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StepperParams {
    pub steps_per_rev: u32,
    pub microstep_resolution: u32,
    pub microns_per_rev: u32,
    pub max_accel_um_ss: u32,
    pub max_velocity_um_s: u32,
}

impl StepperParams {
    pub const DEFAULT: Self = Self {
        steps_per_rev: 200,
        microstep_resolution: 16,
        microns_per_rev: 3_000,
        max_accel_um_ss: 15_000,
        max_velocity_um_s: 7_500,
    };

    #[must_use]
    pub const fn microsteps_per_rev(&self) -> u32 {
        self.steps_per_rev * self.microstep_resolution
    }

    /// Lead-screw position in microns for a microstep count, saturating.
    #[must_use]
    pub fn microsteps_to_um(&self, microsteps: i32) -> i32 {
        let per_rev = i64::from(self.microsteps_per_rev().max(1));
        let um = i64::from(microsteps) * i64::from(self.microns_per_rev) / per_rev;
        saturate_i32(um)
    }

    #[must_use]
    pub fn um_to_microsteps(&self, um: i32) -> i32 {
        let per_rev = i64::from(self.microns_per_rev.max(1));
        let steps = i64::from(um) * i64::from(self.microsteps_per_rev()) / per_rev;
        saturate_i32(steps)
    }
}

impl Default for StepperParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn saturate_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

#[allow(clippy::cast_precision_loss)]
fn um_to_mm(um: i32) -> f32 {
    um as f32 / 1_000.0
}

#[allow(clippy::cast_possible_truncation)]
fn mm_to_um(mm: f32) -> i32 {
    let scaled = mm * 1_000.0;
    let rounded = if scaled < 0.0 {
        scaled - 0.5
    } else {
        scaled + 0.5
    };
    // `as` saturates on overflow and maps NaN to zero.
    rounded as i32
}

/// Absolute difference between two millimetre readings.
#[must_use]
pub fn gap_difference(a: f32, b: f32) -> f32 {
    if a > b { a - b } else { b - a }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        gap_difference(a, b) < 0.001
    }

    #[test]
    fn percent_maps_retracted_to_deployed() {
        let geometry = BrakeGeometry::DEFAULT;
        assert!(close(geometry.gap_for_percent(0.0), 22.0));
        assert!(close(geometry.gap_for_percent(100.0), 2.5));
        assert!(close(geometry.gap_for_percent(250.0), 2.5));
        assert!(close(geometry.gap_for_percent(-5.0), 22.0));
    }

    #[test]
    fn one_revolution_of_screw_moves_gap_by_0_9172_mm() {
        let geometry = BrakeGeometry::DEFAULT;
        let gap = geometry.gap_for_screw_um(3_000);
        assert!(close(gap - geometry.min_gap_mm, 0.9172));
    }

    #[test]
    fn target_for_gap_fills_every_representation() {
        let geometry = BrakeGeometry::DEFAULT;
        let target = geometry.target_for_gap(geometry.min_gap_mm + 0.9172);

        assert!(close(target.screw_mm, 3.0));
        assert!((target.screw_um - 3_000).abs() <= 1);
        assert_eq!(geometry.deployed().screw_um, 0);
    }

    #[test]
    fn microsteps_convert_through_revolutions() {
        let stepper = StepperParams::DEFAULT;
        assert_eq!(stepper.microsteps_per_rev(), 3_200);
        assert_eq!(stepper.microsteps_to_um(3_200), 3_000);
        assert_eq!(stepper.microsteps_to_um(-1_600), -1_500);
        assert_eq!(stepper.um_to_microsteps(1_500), 1_600);
        assert_eq!(stepper.microsteps_to_um(i32::MAX), 2_013_265_919);
    }
}
