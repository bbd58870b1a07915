use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../sim.rs"]
mod sim;

use session::{Session, TranscriptProfile};

const FLIGHT_SCRIPT: &[&str] = &[
    "guard pod-init-complete on",
    "guard armed-wait-checks-ok on",
    "guard flight-prep-checks-ok on",
    "guard flight-readiness-checks-ok on",
    "range 0",
    "tick",
    "unlock armed-wait",
    "execute armed-wait",
    "tick",
    "unlock flight-prep",
    "execute flight-prep",
    "tick",
    "execute ready",
    "unlock ready",
    "execute ready",
    "tick",
    "guard accel-confirmed on",
    "range 90000",
    "tick 20",
    "guard pusher-separation-confirmed on",
    "tick",
    "range 0",
    "tick 90",
    "status",
    "guard pod-stop-confirmed on",
    "tick 5",
    "guard spindown-complete-confirmed on",
    "tick 90",
    "status",
];

const BRAKE_TEST_SCRIPT: &[&str] = &[
    "guard pod-init-complete on",
    "tick",
    "brake percent 50",
    "tick 50",
    "brake distance 30000",
    "brake test left on",
    "brake raw left -3200 key=0:0",
    "brake raw left 3200 key=01293847:ABCD0987",
    "tick 5",
    "brake test left off",
    "mlp off",
    "brake percent 100",
    "tick",
    "mlp on",
    "brake ack left",
    "brake ack right",
    "status",
];

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Flight, FLIGHT_SCRIPT)?;
    record_profile(TranscriptProfile::BrakeTest, BRAKE_TEST_SCRIPT)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile, script: &[&str]) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    for line in script {
        let _ = session.handle_command(line)?;
    }
    println!("recorded {}", profile.log_path());
    Ok(())
}
