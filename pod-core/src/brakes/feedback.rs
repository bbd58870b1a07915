//! Sensor feedback consumed by the brake actuators.
//!
//! Feedback is advisory and only valid for the cycle it was sampled on; the
//! host hands a fresh [`BrakeFeedback`] to every process call.

/// Level reported by a limit switch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SwitchState {
    #[default]
    Unknown,
    Closed,
    Open,
}

impl SwitchState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SwitchState::Unknown => "unknown",
            SwitchState::Closed => "closed",
            SwitchState::Open => "open",
        }
    }
}

/// One limit switch plus the edge latch set by its interrupt.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LimitSwitch {
    pub state: SwitchState,
    pub edge_seen: bool,
}

impl LimitSwitch {
    #[must_use]
    pub const fn new(state: SwitchState) -> Self {
        Self {
            state,
            edge_seen: false,
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self.state, SwitchState::Closed)
    }
}

/// Travel-end switches of one actuator.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LimitSwitches {
    /// Closed at full deployment.
    pub extend: LimitSwitch,
    /// Closed at full retraction.
    pub retract: LimitSwitch,
}

impl LimitSwitches {
    /// Both ends closed at once cannot happen on a healthy actuator.
    #[must_use]
    pub const fn conflict(&self) -> bool {
        self.extend.is_closed() && self.retract.is_closed()
    }
}

/// Inputs sampled for one actuator during a process cycle.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BrakeFeedback {
    pub switches: LimitSwitches,
    /// Raw MLP ADC count; `None` when no conversion completed this cycle.
    pub mlp_sample: Option<u16>,
}

impl BrakeFeedback {
    /// Nothing sampled: switches unknown and no MLP conversion.
    pub const EMPTY: Self = Self {
        switches: LimitSwitches {
            extend: LimitSwitch::new(SwitchState::Unknown),
            retract: LimitSwitch::new(SwitchState::Unknown),
        },
        mlp_sample: None,
    };

    #[must_use]
    pub const fn with_mlp(sample: u16) -> Self {
        Self {
            switches: LimitSwitches {
                extend: LimitSwitch::new(SwitchState::Open),
                retract: LimitSwitch::new(SwitchState::Open),
            },
            mlp_sample: Some(sample),
        }
    }
}

/// Zero and span calibration of the linear displacement sensor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MlpCalibration {
    pub zero: u16,
    /// Millimetres of I-beam gap per ADC count.
    pub span_mm_per_count: f32,
}

impl MlpCalibration {
    pub const DEFAULT: Self = Self {
        zero: 0,
        span_mm_per_count: 0.01,
    };

    /// Applies the calibration to a raw sample.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn read(&self, sample: u16) -> MlpReading {
        let minus_zero = i32::from(sample) - i32::from(self.zero);
        MlpReading {
            sample,
            zero: self.zero,
            minus_zero,
            span_mm_per_count: self.span_mm_per_count,
            gap_mm: minus_zero as f32 * self.span_mm_per_count,
        }
    }

    /// Raw count that reads back as `gap_mm`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_for_gap(&self, gap_mm: f32) -> u16 {
        let counts = gap_mm / self.span_mm_per_count + f32::from(self.zero) + 0.5;
        if counts <= 0.0 {
            0
        } else {
            counts as u16
        }
    }
}

impl Default for MlpCalibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Calibrated displacement reading exported through telemetry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MlpReading {
    pub sample: u16,
    pub zero: u16,
    pub minus_zero: i32,
    pub span_mm_per_count: f32,
    pub gap_mm: f32,
}

/// Tolerances and watchdog applied by every actuator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BrakeLimits {
    /// Allowed MLP excursion beyond the geometric envelope.
    pub mlp_tolerance_mm: f32,
    /// Allowed disagreement between planner position and MLP before a move.
    pub cross_check_tolerance_mm: f32,
    pub move_watchdog_ms: u32,
}

impl BrakeLimits {
    pub const DEFAULT: Self = Self {
        mlp_tolerance_mm: 0.5,
        cross_check_tolerance_mm: 2.0,
        move_watchdog_ms: 30_000,
    };
}

impl Default for BrakeLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brakes::geometry::gap_difference;

    #[test]
    fn calibration_subtracts_zero_before_scaling() {
        let calibration = MlpCalibration {
            zero: 100,
            span_mm_per_count: 0.02,
        };
        let reading = calibration.read(600);

        assert_eq!(reading.minus_zero, 500);
        assert!(gap_difference(reading.gap_mm, 10.0) < 0.001);
        assert_eq!(calibration.sample_for_gap(10.0), 600);
    }

    #[test]
    fn closed_extend_and_retract_conflict() {
        let switches = LimitSwitches {
            extend: LimitSwitch::new(SwitchState::Closed),
            retract: LimitSwitch::new(SwitchState::Closed),
        };
        assert!(switches.conflict());
        assert!(!LimitSwitches::default().conflict());
    }
}
