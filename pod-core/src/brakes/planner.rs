use super::BrakeId;

/// Kinematic state reported by the motion planner for one actuator.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MotionSample {
    pub position_um: i32,
    pub velocity_um_s: i32,
    pub accel_um_ss: i32,
}

/// Stepper motion planner driving the lead screws.
///
/// The brake machine never derives position on its own; it hands targets to
/// the planner and samples what the planner reports every cycle.
pub trait MotionPlanner {
    /// Begins a move of `brake` toward an absolute lead-screw position.
    fn start_move(&mut self, brake: BrakeId, target_um: i32);

    /// Stops any motion of `brake` as quickly as the drive allows.
    fn halt(&mut self, brake: BrakeId);

    fn sample(&self, brake: BrakeId) -> MotionSample;

    /// Returns `true` once the last move of `brake` has finished.
    fn task_complete(&self, brake: BrakeId) -> bool;
}

/// Planner that reports every move as finished on arrival.
///
/// Useful where no stepper drive is attached; positions jump to the target.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct OpenLoopPlanner {
    positions: [i32; 2],
}

impl OpenLoopPlanner {
    #[must_use]
    pub const fn new() -> Self {
        Self { positions: [0; 2] }
    }

    /// Seeds the planner with known lead-screw positions.
    #[must_use]
    pub const fn homed_at(positions: [i32; 2]) -> Self {
        Self { positions }
    }
}

impl MotionPlanner for OpenLoopPlanner {
    fn start_move(&mut self, brake: BrakeId, target_um: i32) {
        self.positions[brake.as_index()] = target_um;
    }

    fn halt(&mut self, _brake: BrakeId) {}

    fn sample(&self, brake: BrakeId) -> MotionSample {
        MotionSample {
            position_um: self.positions[brake.as_index()],
            ..MotionSample::default()
        }
    }

    fn task_complete(&self, _brake: BrakeId) -> bool {
        true
    }
}
