#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Flight-control core for the vacuum-tube pod.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware, sensors and motion control enter through
// traits and plain sample structs supplied by the owning binary.

pub mod brakes;
pub mod console;
pub mod control;
pub mod faults;
pub mod mission;
pub mod range;
pub mod scheduler;
pub mod telemetry;
pub mod timing;
