//! Simulated brake hardware for the host emulator.
//!
//! The planner ramps each lead screw toward its target at the stepper's
//! maximum velocity and the sensors report limit switches and MLP counts that
//! agree with the simulated position, so the core sees a healthy actuator
//! unless a command deliberately breaks it.

use pod_core::brakes::{
    ALL_BRAKES, BRAKE_COUNT, BrakeConfig, BrakeFeedback, BrakeGeometry, BrakeId, LimitSwitch,
    LimitSwitches, MlpCalibration, MotionPlanner, MotionSample, SwitchState,
};
use pod_core::timing::Millis;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Axis {
    position_um: i32,
    target_um: i32,
    velocity_um_s: i32,
}

/// Constant-velocity lead-screw model.
#[derive(Clone, Debug)]
pub struct SimulatedPlanner {
    axes: [Axis; BRAKE_COUNT],
    speed_um_s: i32,
}

impl SimulatedPlanner {
    /// Planner with both screws resting at `start_um`.
    pub fn new(speed_um_s: u32, start_um: i32) -> Self {
        let axis = Axis {
            position_um: start_um,
            target_um: start_um,
            velocity_um_s: 0,
        };
        Self {
            axes: [axis; BRAKE_COUNT],
            speed_um_s: i32::try_from(speed_um_s).unwrap_or(i32::MAX),
        }
    }

    /// Moves every axis toward its target for `elapsed_ms`.
    pub fn advance(&mut self, elapsed_ms: Millis) {
        let reach = i64::from(self.speed_um_s) * i64::from(elapsed_ms) / 1_000;
        let reach = i32::try_from(reach).unwrap_or(i32::MAX);

        for axis in &mut self.axes {
            let remaining = axis.target_um.saturating_sub(axis.position_um);
            let delta = remaining.clamp(-reach, reach);
            axis.position_um += delta;
            axis.velocity_um_s = delta.signum() * self.speed_um_s;
        }
    }

    pub fn position_um(&self, brake: BrakeId) -> i32 {
        self.axes[brake.as_index()].position_um
    }
}

impl MotionPlanner for SimulatedPlanner {
    fn start_move(&mut self, brake: BrakeId, target_um: i32) {
        self.axes[brake.as_index()].target_um = target_um;
    }

    fn halt(&mut self, brake: BrakeId) {
        let axis = &mut self.axes[brake.as_index()];
        axis.target_um = axis.position_um;
        axis.velocity_um_s = 0;
    }

    fn sample(&self, brake: BrakeId) -> MotionSample {
        let axis = &self.axes[brake.as_index()];
        MotionSample {
            position_um: axis.position_um,
            velocity_um_s: axis.velocity_um_s,
            accel_um_ss: 0,
        }
    }

    fn task_complete(&self, brake: BrakeId) -> bool {
        let axis = &self.axes[brake.as_index()];
        axis.position_um == axis.target_um
    }
}

/// Limit switches and MLP derived from the simulated screw positions.
#[derive(Clone, Debug)]
pub struct SimulatedSensors {
    geometry: BrakeGeometry,
    calibration: MlpCalibration,
    /// Cleared to model a disconnected displacement sensor.
    pub mlp_connected: bool,
}

impl SimulatedSensors {
    pub fn new(config: &BrakeConfig) -> Self {
        Self {
            geometry: config.geometry,
            calibration: config.calibration,
            mlp_connected: true,
        }
    }

    pub fn feedback(&self, planner: &SimulatedPlanner) -> [BrakeFeedback; BRAKE_COUNT] {
        let retracted_um = self.geometry.retracted().screw_um;
        ALL_BRAKES.map(|id| {
            let position_um = planner.position_um(id);
            let switches = LimitSwitches {
                extend: switch(position_um <= 0),
                retract: switch(position_um >= retracted_um),
            };
            let gap_mm = self.geometry.gap_for_screw_um(position_um);
            BrakeFeedback {
                switches,
                mlp_sample: self
                    .mlp_connected
                    .then(|| self.calibration.sample_for_gap(gap_mm)),
            }
        })
    }
}

fn switch(closed: bool) -> LimitSwitch {
    LimitSwitch::new(if closed {
        SwitchState::Closed
    } else {
        SwitchState::Open
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_ramps_at_constant_speed() {
        let mut planner = SimulatedPlanner::new(7_500, 10_000);
        planner.start_move(BrakeId::Left, 0);

        planner.advance(10);
        assert_eq!(planner.position_um(BrakeId::Left), 9_925);
        assert_eq!(planner.sample(BrakeId::Left).velocity_um_s, -7_500);
        assert!(!planner.task_complete(BrakeId::Left));
        assert!(planner.task_complete(BrakeId::Right));

        for _ in 0..200 {
            planner.advance(10);
        }
        assert_eq!(planner.position_um(BrakeId::Left), 0);
        assert_eq!(planner.sample(BrakeId::Left).velocity_um_s, 0);
        assert!(planner.task_complete(BrakeId::Left));
    }

    #[test]
    fn sensors_follow_the_planner() {
        let config = BrakeConfig::DEFAULT;
        let retracted = config.geometry.retracted().screw_um;
        let mut sensors = SimulatedSensors::new(&config);
        let planner = SimulatedPlanner::new(7_500, retracted);

        let feedback = sensors.feedback(&planner);
        assert!(feedback[0].switches.retract.is_closed());
        assert!(!feedback[0].switches.extend.is_closed());
        assert_eq!(feedback[0].mlp_sample, Some(2_200));

        sensors.mlp_connected = false;
        assert_eq!(sensors.feedback(&planner)[1].mlp_sample, None);
    }
}
