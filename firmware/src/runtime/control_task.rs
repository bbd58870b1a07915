use embassy_time::{Duration, Ticker};
use pod_core::brakes::{BRAKE_COUNT, BrakeFeedback, OpenLoopPlanner};
use pod_core::console::commands::ConsoleExecutor;
use pod_core::control::FlightControl;
use pod_core::mission::GuardInputs;

use super::{CONSOLE_RX_QUEUE, CONSOLE_TX_QUEUE, TICKS};
use crate::console::{LineAssembler, Reply, frames, respond};
use crate::hw::BrakeSensors;
use crate::telemetry::{EventMirror, SnapshotLogger};

/// Main-loop period; elapsed time reaches the core only through the tick counters.
const CONTROL_PERIOD_MS: u64 = 1;

/// Pod speed at or below which the pod counts as stopped.
const STOP_THRESHOLD_MM_S: u32 = 50;

#[embassy_executor::task]
pub async fn run(mut sensors: BrakeSensors<'static>) -> ! {
    let mut console = ConsoleExecutor::new(FlightControl::new());
    // Open-loop planner until the step/dir drive is wired; homed from the MLP.
    let mut planner = OpenLoopPlanner::new();
    let mut homed = false;
    let mut mirror = EventMirror::new();
    let mut logger = SnapshotLogger::new();
    let mut assembler = LineAssembler::new();
    let mut reply = Reply::new();

    let console_rx = CONSOLE_RX_QUEUE.receiver();
    let console_tx = CONSOLE_TX_QUEUE.sender();
    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_PERIOD_MS));

    defmt::info!("control: flight-control loop started");

    loop {
        ticker.next().await;

        while let Ok(frame) = console_rx.try_receive() {
            assembler.feed(&frame, |line| {
                respond(&mut console, line, &mut reply);
                for frame in frames(&reply) {
                    if console_tx.try_send(frame).is_err() {
                        defmt::warn!("control: console reply truncated (transmit queue full)");
                        break;
                    }
                }
            });
        }

        let ticks = TICKS.drain();
        let feedback = sensors.sample();
        if !homed {
            homed = home_planner(&mut planner, console.control(), &feedback);
        }
        let guards = sample_guards(console.control());

        let control = console.control_mut();
        let report = control.process(ticks, &guards, &mut planner, &feedback);
        control.publish(&report, &mut logger);
        mirror.drain(control.events());
    }
}

/// Seeds the planner from the displacement sensors once both report.
fn home_planner(
    planner: &mut OpenLoopPlanner,
    control: &FlightControl,
    feedback: &[BrakeFeedback; BRAKE_COUNT],
) -> bool {
    let Some(positions) = control.brakes().sensed_positions_um(feedback) else {
        return false;
    };

    *planner = OpenLoopPlanner::homed_at(positions);
    defmt::info!(
        "control: brake planner homed left={}um right={}um",
        positions[0],
        positions[1]
    );
    true
}

/// Guard inputs known to the firmware. The range finder and the propulsion
/// and ground-link readiness checks have no drivers yet, so only init and pod
/// stop can be reported.
fn sample_guards(control: &FlightControl) -> GuardInputs {
    GuardInputs {
        pod_init_complete: true,
        pod_stop_confirmed: control.range().pod_stopped(STOP_THRESHOLD_MM_S),
        ..GuardInputs::NONE
    }
}
