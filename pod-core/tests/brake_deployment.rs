use pod_core::brakes::{
    ALL_BRAKES, BRAKE_COUNT, BrakeError, BrakeFaultReason, BrakeFeedback, BrakeGeometry, BrakeId,
    BrakeState, DevKey, MlpCalibration, MotionPlanner, MotionSample, RawMoveSelection,
};
use pod_core::control::FlightControl;
use pod_core::faults::FaultFlag;
use pod_core::mission::{GuardInputs, PodState};
use pod_core::scheduler::ElapsedTicks;
use pod_core::telemetry::MissionEvent;

/// Planner that reaches its target a fixed number of samples after a start.
#[derive(Default)]
struct FakePlanner {
    positions: [i32; BRAKE_COUNT],
    remaining: [u32; BRAKE_COUNT],
    starts: u32,
}

impl FakePlanner {
    const SAMPLES_PER_MOVE: u32 = 3;

    fn retracted() -> Self {
        let retracted = BrakeGeometry::DEFAULT.retracted().screw_um;
        Self {
            positions: [retracted; BRAKE_COUNT],
            ..Self::default()
        }
    }

    /// MLP feedback that agrees with the current planner positions.
    fn feedback(&self) -> [BrakeFeedback; BRAKE_COUNT] {
        ALL_BRAKES.map(|id| {
            let gap_mm = BrakeGeometry::DEFAULT.gap_for_screw_um(self.positions[id.as_index()]);
            BrakeFeedback::with_mlp(MlpCalibration::DEFAULT.sample_for_gap(gap_mm))
        })
    }
}

impl MotionPlanner for FakePlanner {
    fn start_move(&mut self, brake: BrakeId, target_um: i32) {
        self.positions[brake.as_index()] = target_um;
        self.remaining[brake.as_index()] = Self::SAMPLES_PER_MOVE;
        self.starts += 1;
    }

    fn halt(&mut self, brake: BrakeId) {
        self.remaining[brake.as_index()] = 0;
    }

    fn sample(&self, brake: BrakeId) -> MotionSample {
        MotionSample {
            position_um: self.positions[brake.as_index()],
            ..MotionSample::default()
        }
    }

    fn task_complete(&self, brake: BrakeId) -> bool {
        self.remaining[brake.as_index()] == 0
    }
}

fn cycle(control: &mut FlightControl, planner: &mut FakePlanner, guards: &GuardInputs) {
    let feedback = planner.feedback();
    control.process(ElapsedTicks::new(10, 1), guards, planner, &feedback);
    for remaining in &mut planner.remaining {
        *remaining = remaining.saturating_sub(1);
    }
}

fn fly_to_brake(control: &mut FlightControl, planner: &mut FakePlanner) {
    let init = GuardInputs {
        pod_init_complete: true,
        armed_wait_checks_ok: true,
        flight_prep_checks_ok: true,
        flight_readiness_checks_ok: true,
        ..GuardInputs::NONE
    };
    cycle(control, planner, &init);

    for command in [
        pod_core::mission::PodCommand::ArmedWait,
        pod_core::mission::PodCommand::FlightPrep,
        pod_core::mission::PodCommand::Ready,
    ] {
        control.unlock(command);
        control.execute(command).expect("unlocked command");
        cycle(control, planner, &init);
    }
    assert_eq!(control.mission().state(), PodState::Ready);

    let launch = GuardInputs {
        accel_confirmed: true,
        pusher_separation_confirmed: true,
        ..GuardInputs::NONE
    };
    cycle(control, planner, &launch);
    cycle(control, planner, &launch);
    assert_eq!(control.mission().state(), PodState::CoastInterlock);

    for _ in 0..10 {
        cycle(control, planner, &GuardInputs::NONE);
    }
    assert_eq!(control.mission().state(), PodState::Brake);
}

#[test]
fn entering_brake_deploys_both_actuators() {
    let mut control = FlightControl::new();
    let mut planner = FakePlanner::retracted();
    fly_to_brake(&mut control, &mut planner);
    let cursor = control.events().next_id();

    cycle(&mut control, &mut planner, &GuardInputs::NONE);
    let deployed = BrakeGeometry::DEFAULT.deployed();
    for id in ALL_BRAKES {
        let actuator = control.brakes().actuator(id);
        assert_eq!(actuator.state(), BrakeState::Moving);
        assert_eq!(actuator.target(), Some(deployed));
    }
    assert_eq!(planner.starts, 2);

    for _ in 0..FakePlanner::SAMPLES_PER_MOVE {
        cycle(&mut control, &mut planner, &GuardInputs::NONE);
    }

    let stopped = control
        .events()
        .since(cursor)
        .filter(|record| {
            matches!(
                record.event,
                MissionEvent::BrakeChanged(change) if change.to == BrakeState::MoveStopped
            )
        })
        .count();
    assert_eq!(stopped, BRAKE_COUNT);

    cycle(&mut control, &mut planner, &GuardInputs::NONE);
    for id in ALL_BRAKES {
        let actuator = control.brakes().actuator(id);
        assert_eq!(actuator.state(), BrakeState::Idle);
        assert_eq!(actuator.last_completed(), Some(deployed));
    }
    assert!(!control.faults().contains(FaultFlag::General));
}

#[test]
fn brake_entry_without_sensors_faults_and_spindown_retract_is_refused() {
    let mut control = FlightControl::new();
    let mut planner = FakePlanner::retracted();
    fly_to_brake(&mut control, &mut planner);

    let blind = [BrakeFeedback::EMPTY; BRAKE_COUNT];
    control.process(ElapsedTicks::slow(1), &GuardInputs::NONE, &mut planner, &blind);

    for id in ALL_BRAKES {
        assert_eq!(control.brakes().actuator(id).state(), BrakeState::Fault);
    }
    assert!(control.faults().contains(FaultFlag::BrakeSensorUnavailable));
    assert!(control.faults().contains(FaultFlag::General));
    assert_eq!(planner.starts, 0);

    let stopped = GuardInputs {
        pod_stop_confirmed: true,
        spindown_complete_confirmed: true,
        ..GuardInputs::NONE
    };
    control.process(ElapsedTicks::slow(1), &stopped, &mut planner, &blind);
    control.process(ElapsedTicks::slow(1), &stopped, &mut planner, &blind);
    assert_eq!(control.mission().state(), PodState::Idle);

    let refused = control
        .events()
        .oldest_first()
        .filter(|record| matches!(record.event, MissionEvent::BrakeDemandRefused(_)))
        .count();
    assert_eq!(
        refused, BRAKE_COUNT,
        "each faulted brake records its own refused retract"
    );
}

#[test]
fn unusable_actuator_does_not_hold_back_the_healthy_one() {
    type Disable = fn(&mut FlightControl);
    let cases: [(Disable, BrakeError); 2] = [
        (
            |control: &mut FlightControl| {
                control.force_brake_fault(BrakeId::Left, BrakeFaultReason::External);
            },
            BrakeError::Faulted(BrakeId::Left),
        ),
        (
            |control: &mut FlightControl| control.enter_brake_test(BrakeId::Left),
            BrakeError::TestMode(BrakeId::Left),
        ),
    ];

    for (disable, expected) in cases {
        let mut control = FlightControl::new();
        let mut planner = FakePlanner::retracted();
        fly_to_brake(&mut control, &mut planner);
        disable(&mut control);
        let cursor = control.events().next_id();

        cycle(&mut control, &mut planner, &GuardInputs::NONE);

        let right = control.brakes().actuator(BrakeId::Right);
        assert_eq!(right.state(), BrakeState::Moving, "case {expected:?}");
        assert_eq!(right.target(), Some(BrakeGeometry::DEFAULT.deployed()));
        assert_eq!(planner.starts, 1);
        assert_ne!(
            control.brakes().actuator(BrakeId::Left).state(),
            BrakeState::Moving
        );

        let refusals: Vec<_> = control
            .events()
            .since(cursor)
            .filter_map(|record| match record.event {
                MissionEvent::BrakeDemandRefused(refusal) => Some(refusal),
                _ => None,
            })
            .collect();
        assert_eq!(refusals.len(), 1);
        assert_eq!(refusals[0].id, BrakeId::Left);
        assert_eq!(refusals[0].error, expected);
    }
}

#[test]
fn out_of_range_sensor_never_reaches_moving() {
    let mut control = FlightControl::new();
    let mut planner = FakePlanner::retracted();

    control.move_brakes_percent(100.0).expect("move accepted");
    let beyond = MlpCalibration::DEFAULT.sample_for_gap(40.0);
    let feedback = [BrakeFeedback::with_mlp(beyond); BRAKE_COUNT];
    control.process(ElapsedTicks::NONE, &GuardInputs::NONE, &mut planner, &feedback);

    for id in ALL_BRAKES {
        let actuator = control.brakes().actuator(id);
        assert_eq!(actuator.state(), BrakeState::Fault);
    }
    assert_eq!(planner.starts, 0);
    assert!(control.faults().contains(FaultFlag::BrakeSensorOutOfRange));

    assert!(control.acknowledge_brake_fault(BrakeId::Left).is_ok());
    assert_eq!(
        control.brakes().actuator(BrakeId::Left).state(),
        BrakeState::Idle
    );
    assert!(control.faults().contains(FaultFlag::BrakeSensorOutOfRange));
}

#[test]
fn wrong_key_leaves_brakes_untouched() {
    let mut control = FlightControl::new();
    let before = control.brakes().actuator(BrakeId::Right).target();

    let result = control.move_brakes_raw(RawMoveSelection::Right, 3_200, DevKey::new(0, 0));

    assert!(result.is_err());
    let right = control.brakes().actuator(BrakeId::Right);
    assert_eq!(right.state(), BrakeState::Idle);
    assert_eq!(right.target(), before);
    assert!(!control.faults().contains(FaultFlag::Modified));
    assert!(control.faults().contains(FaultFlag::GuardKeyMismatch));
}

#[test]
fn raw_move_in_test_mode_runs_and_flags_override() {
    let mut control = FlightControl::new();
    let mut planner = FakePlanner::retracted();
    control.enter_brake_test(BrakeId::Left);

    let target = control
        .move_brakes_raw(RawMoveSelection::Left, -3_200, DevKey::AUTHORISED)
        .expect("authorised raw move");
    assert_eq!(target.screw_um, -3_000);
    assert!(control.faults().contains(FaultFlag::Modified));
    assert!(!control.faults().contains(FaultFlag::General));

    let feedback = planner.feedback();
    control.process(ElapsedTicks::NONE, &GuardInputs::NONE, &mut planner, &feedback);
    assert_eq!(
        control.brakes().actuator(BrakeId::Left).state(),
        BrakeState::Moving
    );
    assert_eq!(
        control.brakes().actuator(BrakeId::Right).state(),
        BrakeState::Idle
    );

    for _ in 0..FakePlanner::SAMPLES_PER_MOVE + 2 {
        let feedback = planner.feedback();
        control.process(ElapsedTicks::NONE, &GuardInputs::NONE, &mut planner, &feedback);
        for remaining in &mut planner.remaining {
            *remaining = remaining.saturating_sub(1);
        }
    }
    let left = control.brakes().actuator(BrakeId::Left);
    assert_eq!(left.state(), BrakeState::Test);
    assert_eq!(left.last_completed(), Some(target));
    assert!(control.move_brakes_percent(50.0).is_err());
    assert!(control.exit_brake_test(BrakeId::Left).is_ok());
}
