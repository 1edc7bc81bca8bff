// Commandline argument parser using clap for FollowSpot

use clap::Parser;
use std::path::PathBuf;

/// Track a UWB tag and steer a moving-head light at it over DMX
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct TrackerArgs {
    /// Serial port of the UWB positioning module. If left out, a list of
    /// available ports is shown to pick from
    #[arg(short = 'u', long = "uwb-port")]
    pub uwb_port: Option<PathBuf>,

    /// Serial port of the DMX interface
    #[arg(short = 'd', long = "dmx-port", default_value = "/dev/ttyUSB0")]
    pub dmx_port: PathBuf,

    /// Fixture to drive, overriding the config file (BadBoy or Sparky)
    #[arg(short = 'l', long = "fixture")]
    pub fixture: Option<String>,

    /// RON configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log DMX frames instead of writing them to a port
    #[arg(long = "dmx-mock")]
    pub dmx_mock: bool,

    /// Use a simulated UWB module instead of a serial port
    #[arg(long = "dummy-uwb")]
    pub dummy_uwb: bool,

    /// Show the tracked position in the terminal while tracking
    #[arg(short = 'm', long = "monitor")]
    pub monitor: bool,

    /// Send one frame pointing the fixture at pan 0, tilt 0, then exit
    #[arg(short = 's', long = "send-test")]
    pub send_test: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = TrackerArgs::parse_from(["followspot"]);
        assert_eq!(args.uwb_port, None);
        assert_eq!(args.dmx_port, PathBuf::from("/dev/ttyUSB0"));
        assert!(!args.dmx_mock && !args.dummy_uwb && !args.monitor && !args.send_test);
    }

    #[test]
    fn all_flags() {
        let args = TrackerArgs::parse_from([
            "followspot",
            "-u",
            "/dev/ttyACM0",
            "--fixture",
            "Sparky",
            "--config",
            "rig.ron",
            "--dmx-mock",
            "--monitor",
        ]);
        assert_eq!(args.uwb_port, Some(PathBuf::from("/dev/ttyACM0")));
        assert_eq!(args.fixture.as_deref(), Some("Sparky"));
        assert_eq!(args.config, Some(PathBuf::from("rig.ron")));
        assert!(args.dmx_mock && args.monitor);
    }
}
