use anyhow::Result;
use clap::{ArgEnum, Parser, Subcommand};
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use sunpower_lib::{AtomicItem, Media};

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("invalid device '{0}' (expected HOST:PORT or a serial device path)")]
    BadTarget(String),
}

/// Controller address: `HOST:PORT` for TCP, anything else is a serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Tcp { host: String, port: u16 },
    Serial { path: String },
}

impl Target {
    pub fn into_media(self, baudrate: u32) -> Media {
        match self {
            Target::Tcp { host, port } => Media::tcp(host, port),
            Target::Serial { path } => Media::serial(path, baudrate),
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        lazy_static! {
            static ref TCP_RE: Regex =
                Regex::new(r"^(?:tcp://)?(\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9_.\-]+):(\d{1,5})$")
                    .unwrap();
            static ref SERIAL_RE: Regex = Regex::new(r"^(?:serial://)?(\S+)$").unwrap();
        }

        if let Some(c) = TCP_RE.captures(input) {
            let host = c.get(1).unwrap().as_str();
            let port = c
                .get(2)
                .unwrap()
                .as_str()
                .parse::<u16>()
                .map_err(|_| TargetError::BadTarget(input.to_string()))?;
            Ok(Target::Tcp {
                host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
                port,
            })
        } else if let Some(c) = SERIAL_RE.captures(input) {
            Ok(Target::Serial {
                path: c.get(1).unwrap().as_str().to_string(),
            })
        } else {
            Err(TargetError::BadTarget(input.to_string()))
        }
    }
}

fn parse_seconds(input: &str) -> Result<Duration, String> {
    match input.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        _ => Err(format!("'{}' is not a positive number of seconds", input)),
    }
}

#[derive(ArgEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoolerState {
    On,
    Off,
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Skip sanity checks
    #[clap(long, short)]
    pub force: bool,

    /// enable debug output
    #[clap(long, short)]
    pub debug: bool,

    /// Controller address: HOST:PORT or serial device
    #[clap(long, short = 'D')]
    pub device: Target,

    /// UART baud rate
    #[clap(long, short, default_value_t = 4800)]
    pub baudrate: u32,

    /// Reply read timeout, seconds
    #[clap(long, short, default_value = "1.0", parse(try_from_str = parse_seconds))]
    pub timeout: Duration,

    /// Delay between command and reply, milliseconds
    #[clap(long, short, default_value_t = 200)]
    pub settle_ms: u64,

    /// Use json-formatted output
    #[clap(long, short)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the full status block
    Status,

    /// Read the last controller error
    Error,

    /// Read the firmware version
    Version,

    /// Read cold head temperature (K)
    #[clap(visible_alias = "tc")]
    ColdHeadTemp,

    /// Read reject temperature (K)
    RejectTemp,

    /// Read target temperature (K)
    TargetTemp,

    /// Set target temperature (K)
    SetTargetTemp { kelvin: f64 },

    /// Read measured power (W)
    #[clap(visible_alias = "p")]
    MeasuredPower,

    /// Read commanded power (W)
    CommandedPower,

    /// Set commanded power (W)
    SetCommandedPower { watts: f64 },

    /// Read current commanded power (W)
    CurrentCommandedPower,

    /// Switch the cooler on or off
    Cooler {
        #[clap(arg_enum)]
        state: CoolerState,
    },

    /// Read a value by name (e.g. cold_head_temp)
    Get { item: AtomicItem },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_targets() {
        assert_eq!(
            "192.168.1.20:4000".parse::<Target>().unwrap(),
            Target::Tcp {
                host: "192.168.1.20".into(),
                port: 4000
            }
        );
        assert_eq!(
            "tcp://cryo-ctl.lab:23".parse::<Target>().unwrap(),
            Target::Tcp {
                host: "cryo-ctl.lab".into(),
                port: 23
            }
        );
        assert_eq!(
            "[::1]:4000".parse::<Target>().unwrap().into_media(4800),
            Media::tcp("::1", 4000)
        );
    }

    #[test]
    fn serial_targets() {
        assert_eq!(
            "/dev/ttyUSB0".parse::<Target>().unwrap().into_media(9600),
            Media::serial("/dev/ttyUSB0", 9600)
        );
        assert_eq!(
            "COM3".parse::<Target>().unwrap(),
            Target::Serial {
                path: "COM3".into()
            }
        );
    }

    #[test]
    fn bad_targets() {
        assert!("".parse::<Target>().is_err());
        assert!("host:99999".parse::<Target>().is_err());
        assert!("two words".parse::<Target>().is_err());
    }

    #[test]
    fn seconds() {
        assert_eq!(parse_seconds("0.5").unwrap(), Duration::from_millis(500));
        assert!(parse_seconds("0").is_err());
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn parses_command_line() {
        let cli = Cli::try_parse_from([
            "sunpower-tool",
            "-D",
            "10.0.0.7:4000",
            "--settle-ms",
            "0",
            "cooler",
            "on",
        ])
        .unwrap();
        assert_eq!(
            cli.device,
            Target::Tcp {
                host: "10.0.0.7".into(),
                port: 4000
            }
        );
        assert_eq!(cli.settle_ms, 0);
        assert!(matches!(
            cli.command,
            Commands::Cooler {
                state: CoolerState::On
            }
        ));

        let cli =
            Cli::try_parse_from(["sunpower-tool", "-D", "/dev/ttyS1", "get", "reject-temp"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Get {
                item: AtomicItem::RejectTemp
            }
        ));
    }
}
