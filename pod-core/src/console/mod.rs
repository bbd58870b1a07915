//! Ground console shared between the firmware and the emulator.
//!
//! [`grammar`] turns a text line into a [`ConsoleCommand`](grammar::ConsoleCommand)
//! and [`commands`] applies it to a [`FlightControl`](crate::control::FlightControl).

pub mod catalog;
pub mod commands;
pub mod grammar;
