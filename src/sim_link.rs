//! A stand-in controller for running without the rig attached. It behaves
//! like the firmware's serial loop: echoes whatever command it receives,
//! silently ignores anything that is not a number, and otherwise queues one
//! plausible travel time per repetition, jittered so repeated batches do not
//! produce suspiciously identical data.

use crate::measurement_link::{LinkError, MeasurementLink};

use rand::prelude::*;
use std::collections::VecDeque;

/// Speed of sound in air at roughly room temperature, metres per second.
const NOMINAL_SOUND_SPEED: f64 = 343.0;

/// A scripted [`MeasurementLink`] that plays the controller's part of the
/// protocol in memory. Reading past the queued responses looks exactly like
/// a read timeout, so the failure paths behave the same as on hardware.
pub struct SimLink {
    distance_m: f64,
    jitter_us: f64,
    queued: VecDeque<Vec<u8>>,
}

impl SimLink {
    /// A simulated rig with the speaker and microphone `distance_m` metres
    /// apart, reporting times jittered by up to `jitter_us` microseconds.
    pub fn new(distance_m: f64, jitter_us: f64) -> Self {
        SimLink {
            distance_m,
            jitter_us,
            queued: VecDeque::new(),
        }
    }
}

impl MeasurementLink for SimLink {
    fn flush_input(&mut self) -> Result<(), LinkError> {
        self.queued.clear();
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        // The firmware's input() echoes the command back before anything
        // else happens.
        self.queued.push_back(format!("{}\r", line).into_bytes());

        let Ok(repetitions) = line.trim().parse::<u32>() else {
            // Firmware ignores commands that fail int(); no readings follow.
            return Ok(());
        };

        let mut rng = thread_rng();
        let nominal_us = self.distance_m / NOMINAL_SOUND_SPEED * 1e6;
        for _ in 0..repetitions {
            let jitter = if self.jitter_us > 0.0 {
                rng.gen_range(-self.jitter_us..self.jitter_us)
            } else {
                0.0
            };
            let time_us = (nominal_us + jitter).round().max(1.0) as i64;
            self.queued.push_back(format!("{}\r", time_us).into_bytes());
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, LinkError> {
        Ok(self.queued.pop_front().unwrap_or_default())
    }
}
