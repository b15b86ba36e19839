//! Echometer is the host side of a bench speed-of-sound rig: a Raspberry Pi
//! Pico fires a speaker, waits for the pressure wave to reach a microphone,
//! and reports the travel time in microseconds over USB serial. This crate
//! asks the controller for a batch of repetitions, collects and parses the
//! response lines, labels each reading with the distance and temperature the
//! operator wrote on the bench sheet, and exports the accumulated dataset as
//! CSV for analysis in a spreadsheet.
//!
//! The firmware half is a small MicroPython loop flashed onto the Pico; it
//! reads a repetition count per line and prints one integer per measurement.
//! Everything protocol-shaped lives in [`session`] and [`serial_link`]; the
//! interactive console lives in the `echometer` binary and only translates
//! results and failures into prompts and messages.

#![warn(missing_docs)]
pub mod args;
pub mod export;
pub mod measurement_link;
pub mod response_decoder;
pub mod serial_link;
pub mod session;
pub mod sim_link;
