use pod_core::brakes::{BRAKE_COUNT, BrakeConfig, BrakeFeedback, OpenLoopPlanner};
use pod_core::console::commands::{ConsoleError, ConsoleExecutor, ConsoleOutcome};
use pod_core::control::FlightControl;
use pod_core::faults::{FaultFlag, MemoryGuard};
use pod_core::mission::{
    CommandGate, GateError, GuardInputs, INTERLOCK_WINDOW_MS, MissionTimerConfig, PodCommand,
    PodState,
};
use pod_core::range::RangeSample;
use pod_core::scheduler::{ElapsedTicks, TickCounters};
use pod_core::telemetry::MissionEvent;
use pod_core::timing::RelockPolicy;

const NO_FEEDBACK: [BrakeFeedback; BRAKE_COUNT] = [BrakeFeedback::EMPTY; BRAKE_COUNT];

const INIT_DONE: GuardInputs = GuardInputs {
    pod_init_complete: true,
    ..GuardInputs::NONE
};

fn cycle(control: &mut FlightControl, ticks: ElapsedTicks, guards: &GuardInputs) {
    let mut planner = OpenLoopPlanner::new();
    control.process(ticks, guards, &mut planner, &NO_FEEDBACK);
}

fn idle_control(gate: CommandGate) -> FlightControl {
    let mut control =
        FlightControl::with_config(MissionTimerConfig::DEFAULT, BrakeConfig::DEFAULT, gate);
    cycle(&mut control, ElapsedTicks::NONE, &INIT_DONE);
    assert_eq!(control.mission().state(), PodState::Idle);
    control
}

#[test]
fn execute_without_unlock_leaves_register_empty() {
    let mut control = idle_control(CommandGate::new());

    assert_eq!(
        control.execute(PodCommand::TestMode),
        Err(GateError::Locked(PodCommand::TestMode))
    );
    cycle(&mut control, ElapsedTicks::slow(1), &GuardInputs::NONE);

    assert_eq!(control.mission().command(), None);
    assert_eq!(control.mission().state(), PodState::Idle);
}

#[test]
fn unlocked_command_reaches_sequencer_once() {
    let mut control = idle_control(CommandGate::new());

    control.unlock(PodCommand::TestMode);
    cycle(&mut control, ElapsedTicks::slow(50), &GuardInputs::NONE);
    control
        .execute(PodCommand::TestMode)
        .expect("inside the window");
    cycle(&mut control, ElapsedTicks::slow(1), &GuardInputs::NONE);
    assert_eq!(control.mission().state(), PodState::TestMode);

    assert_eq!(
        control.execute(PodCommand::TestMode),
        Err(GateError::Locked(PodCommand::TestMode))
    );
}

#[test]
fn unlock_window_lapses_after_ten_seconds() {
    let mut control = idle_control(CommandGate::new());
    let window_ticks = INTERLOCK_WINDOW_MS / 100;

    control.unlock(PodCommand::Drive);
    cycle(
        &mut control,
        ElapsedTicks::slow(window_ticks - 1),
        &GuardInputs::NONE,
    );
    assert!(control.gate().is_unlocked(PodCommand::Drive));

    cycle(&mut control, ElapsedTicks::slow(1), &GuardInputs::NONE);
    assert!(!control.gate().is_unlocked(PodCommand::Drive));
    assert_eq!(
        control.execute(PodCommand::Drive),
        Err(GateError::Locked(PodCommand::Drive))
    );
}

#[test]
fn fast_ticks_do_not_age_interlocks() {
    let mut control = idle_control(CommandGate::new());

    control.unlock(PodCommand::Drive);
    cycle(&mut control, ElapsedTicks::new(5_000, 0), &GuardInputs::NONE);

    assert!(control.gate().is_unlocked(PodCommand::Drive));
}

#[test]
fn retained_policy_keeps_enabled_after_execute() {
    let gate = CommandGate::with_policy(INTERLOCK_WINDOW_MS, RelockPolicy::RetainEnabled);
    let mut control = idle_control(gate);

    control.unlock(PodCommand::TestMode);
    control.execute(PodCommand::TestMode).expect("first execute");
    assert!(control.gate().interlock(PodCommand::TestMode).is_enabled());
    assert!(control.execute(PodCommand::TestMode).is_ok());
}

#[test]
fn corrupted_guard_is_flagged_every_cycle() {
    let mut control = idle_control(CommandGate::new());
    control.overwrite_guard(MemoryGuard::from_words(0xAABB_CCDD, 0));

    cycle(&mut control, ElapsedTicks::slow(1), &GuardInputs::NONE);
    assert!(control.faults().contains(FaultFlag::GuardCorruption));
    assert!(control.faults().contains(FaultFlag::General));

    control.clear_faults();
    cycle(&mut control, ElapsedTicks::slow(1), &GuardInputs::NONE);
    assert!(control.faults().contains(FaultFlag::GuardCorruption));

    let raised = control
        .events()
        .oldest_first()
        .filter(|record| record.event == MissionEvent::FaultRaised(FaultFlag::GuardCorruption))
        .count();
    assert_eq!(raised, 2);
}

#[test]
fn range_goes_stale_after_six_silent_ticks() {
    let mut control = idle_control(CommandGate::new());
    let stopped = RangeSample {
        distance_mm: 12_000,
        velocity_mm_s: 3,
        accel_mm_ss: 0,
    };
    control.record_range(stopped);
    assert!(control.range().pod_stopped(5));

    for _ in 0..5 {
        cycle(&mut control, ElapsedTicks::slow(1), &GuardInputs::NONE);
    }
    assert!(!control.faults().contains(FaultFlag::RangeSensorStale));

    cycle(&mut control, ElapsedTicks::slow(1), &GuardInputs::NONE);
    assert!(control.faults().contains(FaultFlag::RangeSensorStale));
    assert!(!control.range().pod_stopped(5));

    control.record_range(stopped);
    assert!(!control.faults().contains(FaultFlag::RangeSensorStale));
}

#[test]
fn tick_counters_feed_the_cycle() {
    let counters = TickCounters::new();
    let mut control = idle_control(CommandGate::new());
    control.unlock(PodCommand::Drive);

    for _ in 0..99 {
        counters.tick_100ms();
    }
    for _ in 0..10 {
        counters.tick_10ms();
    }
    cycle(&mut control, counters.drain(), &GuardInputs::NONE);
    assert!(control.gate().is_unlocked(PodCommand::Drive));
    assert!(counters.pending().is_empty());

    counters.tick_100ms();
    cycle(&mut control, counters.drain(), &GuardInputs::NONE);
    assert!(!control.gate().is_unlocked(PodCommand::Drive));
}

#[test]
fn console_drives_the_mission() {
    let mut control = idle_control(CommandGate::new());
    let mut console = ConsoleExecutor::new(&mut control);

    assert_eq!(
        console.execute("unlock test-mode"),
        Ok(ConsoleOutcome::Unlocked(PodCommand::TestMode))
    );
    assert_eq!(
        console.execute("execute test-mode"),
        Ok(ConsoleOutcome::Executed(PodCommand::TestMode))
    );
    match console.execute("execute test-mode") {
        Err(ConsoleError::Gate(GateError::Locked(PodCommand::TestMode))) => {}
        other => panic!("unexpected console result: {other:?}"),
    }
    match console.execute("launch") {
        Err(ConsoleError::Parse(_)) => {}
        other => panic!("unexpected console result: {other:?}"),
    }

    cycle(&mut control, ElapsedTicks::slow(1), &GuardInputs::NONE);
    assert_eq!(control.mission().state(), PodState::TestMode);
}
