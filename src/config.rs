//! Command line and runtime configuration

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_PIDFILE, SUPPORTED_BAUD_RATES};
use crate::error::{SnifferError, SnifferResult};
use crate::sniffer::SnifferConfig;

/// Command line arguments of `modbus_sniffer`
#[derive(Parser, Debug, Clone)]
#[command(
    name = "modbus_sniffer",
    version = env!("CARGO_PKG_VERSION"),
    about = "Passive RS485 Modbus RTU sniffer for battery telemetry",
    long_about = None
)]
#[command(group(ArgGroup::new("source").required(true).args(["serial", "replay"])))]
pub struct Args {
    /// Serial port (e.g. /dev/ttyUSB0)
    #[arg(short = 's', long = "serial", value_name = "PORT")]
    pub serial: Option<String>,

    /// Replay a captured byte stream from a file instead of a serial port
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// JSON output file (e.g. /tmp/battery_data.json)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: PathBuf,

    /// Baud rate
    #[arg(short = 'b', long = "baud", value_name = "BAUD", default_value_t = DEFAULT_BAUD_RATE, value_parser = parse_baud)]
    pub baud: u32,

    /// Run as a background service (plain log lines for the service manager)
    #[arg(short = 'd', long = "daemon")]
    pub daemon: bool,

    /// PID file
    #[arg(short = 'p', long = "pidfile", value_name = "FILE", default_value = DEFAULT_PIDFILE)]
    pub pidfile: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,
}

/// Where bus bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Live RS485 adapter
    Serial {
        /// Device path
        port: String,
        /// Line speed
        baud: u32,
    },
    /// Previously captured stream; the run ends at end of file
    Replay(PathBuf),
}

impl Args {
    /// Selected byte source
    pub fn source(&self) -> SnifferResult<Source> {
        match (&self.serial, &self.replay) {
            (Some(port), None) => Ok(Source::Serial {
                port: port.clone(),
                baud: self.baud,
            }),
            (None, Some(path)) => Ok(Source::Replay(path.clone())),
            (Some(_), Some(_)) => Err(SnifferError::configuration(
                "--serial and --replay are mutually exclusive",
            )),
            (None, None) => Err(SnifferError::configuration(
                "a serial port (-s) or replay file (--replay) is required",
            )),
        }
    }

    /// Processing loop settings derived from the arguments
    pub fn sniffer_config(&self) -> SnifferConfig {
        SnifferConfig::new(self.output.clone()).with_stop_at_eof(self.replay.is_some())
    }
}

/// Parse and validate a baud rate against the supported table
pub fn parse_baud(value: &str) -> Result<u32, String> {
    let baud: u32 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    if SUPPORTED_BAUD_RATES.contains(&baud) {
        Ok(baud)
    } else {
        Err(format!(
            "unsupported baud rate {} (expected one of {:?})",
            baud, SUPPORTED_BAUD_RATES
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("modbus_sniffer").chain(args.iter().copied()))
    }

    #[test]
    fn test_minimal_serial_invocation() {
        let args = parse(&["-s", "/dev/ttyUSB0", "-o", "/tmp/battery.json"]).unwrap();
        assert_eq!(
            args.source().unwrap(),
            Source::Serial {
                port: "/dev/ttyUSB0".to_string(),
                baud: 9600
            }
        );
        assert_eq!(args.output, PathBuf::from("/tmp/battery.json"));
        assert_eq!(args.pidfile, PathBuf::from(DEFAULT_PIDFILE));
        assert!(!args.daemon);
        assert!(!args.sniffer_config().stop_at_eof);
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&[
            "-s", "/dev/ttyS1", "-o", "out.json", "-b", "19200", "-d", "-p", "/run/s.pid",
        ])
        .unwrap();
        assert_eq!(args.baud, 19200);
        assert!(args.daemon);
        assert_eq!(args.pidfile, PathBuf::from("/run/s.pid"));
    }

    #[test]
    fn test_replay_source() {
        let args = parse(&["--replay", "capture.bin", "-o", "out.json"]).unwrap();
        assert_eq!(
            args.source().unwrap(),
            Source::Replay(PathBuf::from("capture.bin"))
        );
        assert!(args.sniffer_config().stop_at_eof);
    }

    #[test]
    fn test_missing_required_arguments() {
        assert!(parse(&["-o", "out.json"]).is_err());
        assert!(parse(&["-s", "/dev/ttyUSB0"]).is_err());
        assert!(parse(&["-s", "/dev/ttyUSB0", "--replay", "x", "-o", "o"]).is_err());
    }

    #[test]
    fn test_unsupported_baud_rejected() {
        let err = parse(&["-s", "/dev/ttyUSB0", "-o", "o.json", "-b", "14400"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(parse_baud("fast").is_err());
        for baud in SUPPORTED_BAUD_RATES {
            assert_eq!(parse_baud(&baud.to_string()), Ok(baud));
        }
    }

    #[test]
    fn test_help_is_not_an_error_kind() {
        let err = parse(&["-h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
