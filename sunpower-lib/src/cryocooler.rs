//! Sunpower cryocooler controller.
//!
//! Every accessor runs one transaction: send the command with a trailing
//! carriage return, wait [`Config::settle_delay`], read a single bounded
//! chunk and split it into lines. Only connection setup, transmission and
//! close failures come back as errors; an empty or short reply is reported
//! as a warning and surfaces as an empty [`Reply`] or the "No reply" value.
//!
//! The controller has no request IDs, so one transaction must finish before
//! the next starts. Share an instance across threads by wrapping it in a
//! `Mutex`.

use std::fmt::Display;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;

use crate::protocol::{self, cmds, parse_single_value, ParsedValue, Reply, READ_SIZE};
use crate::report::{Level, LogReporter, MessageLog, Reporter};
use crate::transport::{self, ConnectError, Media, Received, Transport, TransportError};

#[derive(Error, Debug)]
pub enum CryocoolerError {
    #[error("failed to send command {command:?}")]
    Transmit {
        command: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to close connection")]
    Close(#[source] TransportError),
    #[error("{command:?} reply {value:?} is not a number")]
    BadValue { command: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Bound on each reply read; also the serial port timeout.
    pub read_timeout: Duration,
    /// Pause between sending a command and reading its reply.
    pub settle_delay: Duration,
    /// Open serial devices even if another process holds them.
    pub force: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(200),
            force: false,
        }
    }
}

/// Readings available through [`SunpowerCryocooler::get_atomic_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicItem {
    ColdHeadTemp,
    RejectTemp,
    TargetTemp,
    MeasuredPower,
    CommandedPower,
    CurrentCommandedPower,
}

impl AtomicItem {
    pub const ALL: [AtomicItem; 6] = [
        AtomicItem::ColdHeadTemp,
        AtomicItem::RejectTemp,
        AtomicItem::TargetTemp,
        AtomicItem::MeasuredPower,
        AtomicItem::CommandedPower,
        AtomicItem::CurrentCommandedPower,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AtomicItem::ColdHeadTemp => "cold_head_temp",
            AtomicItem::RejectTemp => "reject_temp",
            AtomicItem::TargetTemp => "target_temp",
            AtomicItem::MeasuredPower => "measured_power",
            AtomicItem::CommandedPower => "commanded_power",
            AtomicItem::CurrentCommandedPower => "current_commanded_power",
        }
    }
}

impl Display for AtomicItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name().fmt(f)
    }
}

#[derive(Error, Debug)]
pub enum AtomicItemError {
    #[error("unknown item '{0}'")]
    Unknown(String),
}

impl FromStr for AtomicItem {
    type Err = AtomicItemError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let name = input.trim().replace('-', "_");
        AtomicItem::ALL
            .iter()
            .find(|item| item.name() == name)
            .copied()
            .ok_or_else(|| AtomicItemError::Unknown(input.to_string()))
    }
}

pub struct SunpowerCryocooler {
    config: Config,
    log: MessageLog,
    transport: Option<Box<dyn Transport>>,
    media: Option<Media>,
}

impl Default for SunpowerCryocooler {
    fn default() -> Self {
        Self::new(Config::default(), LogReporter::default())
    }
}

impl SunpowerCryocooler {
    pub fn new<R: Reporter + 'static>(config: Config, reporter: R) -> Self {
        Self {
            config,
            log: MessageLog::new(Box::new(reporter)),
            transport: None,
            media: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Target of the current connection, if it was opened by [`connect`](Self::connect).
    pub fn media(&self) -> Option<&Media> {
        self.media.as_ref()
    }

    /// Most recent warning or error reported by this instance.
    pub fn last_message(&self) -> Option<&str> {
        self.log.last_message()
    }

    pub fn last_level(&self) -> Option<Level> {
        self.log.last_level()
    }

    pub fn connect(&mut self, media: Media) -> Result<()> {
        if self.is_connected() {
            self.log
                .emit(Level::Warn, "Already connected, closing previous connection.");
            self.disconnect()?;
        }

        if !media.is_valid() {
            self.log
                .emit(Level::Error, format!("Invalid connection parameters: {}", media));
            return Err(ConnectError::InvalidParameters(media.to_string()).into());
        }

        match transport::open(&media, self.config.read_timeout, self.config.force) {
            Ok(transport) => {
                self.log.emit(
                    Level::Info,
                    format!("{} connection opened: {}", media.kind(), media),
                );
                self.transport = Some(transport);
                self.media = Some(media);
                Ok(())
            }
            Err(e) => {
                let err = anyhow::Error::from(e);
                self.log.emit(
                    Level::Error,
                    format!("Failed to establish connection: {:#}", err),
                );
                Err(err)
            }
        }
    }

    /// Takes over an already open transport.
    pub fn attach(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        if self.is_connected() {
            self.disconnect()?;
        }
        self.log.emit(
            Level::Info,
            format!("Attached transport: {}", transport.describe()),
        );
        self.transport = Some(transport);
        self.media = None;
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        let mut transport = match self.transport.take() {
            Some(transport) => transport,
            None => {
                self.log.emit(Level::Warn, "Already disconnected from device.");
                return Ok(());
            }
        };
        let kind = self.media.take().map_or("Attached", |m| m.kind());

        if let Err(e) = transport.close() {
            self.log
                .emit(Level::Error, format!("Failed to close connection: {}", e));
            return Err(CryocoolerError::Close(e).into());
        }

        self.log
            .emit(Level::Info, format!("{} connection closed.", kind));
        self.log.emit(Level::Info, "Disconnected from device");
        Ok(())
    }

    /// Runs one transaction and returns the reply lines.
    ///
    /// Not being connected, a read timeout, an empty read and a read error
    /// all yield an empty reply. Only a failed write is an error.
    pub fn send_and_read(&mut self, command: &str) -> Result<Reply> {
        let transport = match self.transport.as_mut() {
            Some(transport) => transport,
            None => {
                self.log.emit(
                    Level::Error,
                    format!("Failed to send command '{}': Not connected", command),
                );
                return Ok(Reply::default());
            }
        };

        let frame = protocol::frame(command);
        self.log
            .emit(Level::Debug, format!("Sending command: {:?}", command));
        if let Err(source) = transport.write(&frame) {
            self.log
                .emit(Level::Error, format!("Failed to send command: {}", source));
            return Err(CryocoolerError::Transmit {
                command: command.to_string(),
                source,
            }
            .into());
        }
        self.log.emit(Level::Debug, "Command sent");

        if !self.config.settle_delay.is_zero() {
            thread::sleep(self.config.settle_delay);
        }

        let raw = match transport.read(READ_SIZE) {
            Ok(Received::Data(raw)) if !raw.is_empty() => raw,
            Ok(Received::Data(_)) => {
                self.log.emit(Level::Warn, "No data received.");
                return Ok(Reply::default());
            }
            Ok(Received::TimedOut) => {
                self.log.emit(Level::Warn, "Read timeout.");
                return Ok(Reply::default());
            }
            Err(e) => {
                let err = anyhow::Error::from(e);
                self.log
                    .emit(Level::Error, format!("Failed to read reply: {:#}", err));
                return Ok(Reply::default());
            }
        };

        self.log.emit(
            Level::Debug,
            format!("Raw received: {:?}", String::from_utf8_lossy(&raw)),
        );
        Ok(Reply::from_bytes(&raw))
    }

    fn query(&mut self, command: &str) -> Result<ParsedValue> {
        Ok(parse_single_value(&self.send_and_read(command)?))
    }

    /// Full status block, one entry per line.
    pub fn get_status(&mut self) -> Result<Reply> {
        self.send_and_read(cmds::STATUS)
    }

    pub fn get_error(&mut self) -> Result<ParsedValue> {
        self.query(cmds::ERROR)
    }

    pub fn get_version(&mut self) -> Result<ParsedValue> {
        self.query(cmds::VERSION)
    }

    /// Cold head temperature, kelvin.
    pub fn get_cold_head_temp(&mut self) -> Result<ParsedValue> {
        self.query(cmds::COLD_HEAD_TEMP)
    }

    /// Reject temperature, kelvin.
    pub fn get_reject_temp(&mut self) -> Result<ParsedValue> {
        self.query(cmds::REJECT_TEMP)
    }

    pub fn get_target_temp(&mut self) -> Result<ParsedValue> {
        self.query(cmds::TARGET_TEMP)
    }

    pub fn set_target_temp(&mut self, kelvin: f64) -> Result<ParsedValue> {
        self.query(&protocol::assign(cmds::TARGET_TEMP, kelvin))
    }

    /// Measured power, watts.
    pub fn get_measured_power(&mut self) -> Result<ParsedValue> {
        self.query(cmds::MEASURED_POWER)
    }

    pub fn get_commanded_power(&mut self) -> Result<ParsedValue> {
        self.query(cmds::COMMANDED_POWER)
    }

    pub fn set_commanded_power(&mut self, watts: f64) -> Result<ParsedValue> {
        self.query(&protocol::assign(cmds::COMMANDED_POWER, watts))
    }

    /// Reads line 3 of the `E` reply as watts.
    ///
    /// # Panics
    ///
    /// Panics if the reply has fewer than four lines, including the empty
    /// reply produced by a timeout or a missing connection. This reply is not
    /// run through [`parse_single_value`].
    pub fn get_current_commanded_power(&mut self) -> Result<f64> {
        let reply = self.send_and_read(cmds::CURRENT_COMMANDED_POWER)?;
        let line = &reply[3];
        line.parse::<f64>().map_err(|_| {
            CryocoolerError::BadValue {
                command: cmds::CURRENT_COMMANDED_POWER,
                value: line.clone(),
            }
            .into()
        })
    }

    pub fn turn_on_cooler(&mut self) -> Result<ParsedValue> {
        self.query(cmds::COOLER_ON)
    }

    pub fn turn_off_cooler(&mut self) -> Result<ParsedValue> {
        self.query(cmds::COOLER_OFF)
    }

    pub fn read_atomic(&mut self, item: AtomicItem) -> Result<ParsedValue> {
        match item {
            AtomicItem::ColdHeadTemp => self.get_cold_head_temp(),
            AtomicItem::RejectTemp => self.get_reject_temp(),
            AtomicItem::TargetTemp => self.get_target_temp(),
            AtomicItem::MeasuredPower => self.get_measured_power(),
            AtomicItem::CommandedPower => self.get_commanded_power(),
            AtomicItem::CurrentCommandedPower => {
                self.get_current_commanded_power().map(ParsedValue::Float)
            }
        }
    }

    /// Reads a value by name. Unknown names are reported and yield `None`.
    pub fn get_atomic_value(&mut self, item: &str) -> Result<Option<ParsedValue>> {
        match item.parse::<AtomicItem>() {
            Ok(item) => self.read_atomic(item).map(Some),
            Err(_) => {
                self.log.emit(Level::Error, format!("Unknown item: {}", item));
                Ok(None)
            }
        }
    }
}
