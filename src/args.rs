// Commandline argument parser using clap for echometer

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct EchoArgs {
    /// Serial port of the controller; discovered by USB vendor id when omitted
    #[arg(short = 'p', long = "port")]
    pub port: Option<String>,

    /// Talk to a simulated controller instead of real hardware
    #[arg(long = "simulate")]
    pub simulate: bool,

    /// Speaker-to-microphone distance of the simulated rig, in metres
    #[arg(long = "sim-distance", default_value_t = 1.0)]
    pub sim_distance: f64,

    /// Timing jitter of the simulated rig, in microseconds
    #[arg(long = "sim-jitter", default_value_t = 150.0)]
    pub sim_jitter: f64,
}
