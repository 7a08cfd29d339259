mod serial;
mod tcp;

pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use std::fmt::Display;
use std::io::{self, Read};
use std::time::Duration;

use thiserror::Error;

use crate::port::OpenPortError;

/// Fixed timeout for establishing a TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Where the controller lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Serial { path: String, baudrate: u32 },
    Tcp { host: String, port: u16 },
}

impl Media {
    pub fn serial<S: Into<String>>(path: S, baudrate: u32) -> Self {
        Media::Serial {
            path: path.into(),
            baudrate,
        }
    }

    pub fn tcp<S: Into<String>>(host: S, port: u16) -> Self {
        Media::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Media::Serial { .. } => "Serial",
            Media::Tcp { .. } => "TCP",
        }
    }

    /// Rejects empty names and zero baud rates or ports.
    pub fn is_valid(&self) -> bool {
        match self {
            Media::Serial { path, baudrate } => !path.trim().is_empty() && *baudrate > 0,
            Media::Tcp { host, port } => !host.trim().is_empty() && *port > 0,
        }
    }
}

impl Display for Media {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Media::Serial { path, baudrate } => write!(f, "{}@{}", path, baudrate),
            Media::Tcp { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("invalid connection parameters: {0}")]
    InvalidParameters(String),
    #[error("read timeout must be non-zero")]
    InvalidTimeout,
    #[error(transparent)]
    Serial(#[from] OpenPortError),
    #[error("can't resolve {addr}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("can't connect to {addr}")]
    Tcp {
        addr: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("write failed")]
    Write(#[source] io::Error),
    #[error("read failed")]
    Read(#[source] io::Error),
    #[error("close failed")]
    Close(#[source] io::Error),
    #[error("transport is closed")]
    Closed,
}

/// Outcome of a single bounded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Data(Vec<u8>),
    TimedOut,
}

/// A byte pipe to the controller.
pub trait Transport: Send {
    /// Writes the whole buffer.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Blocking read of at most `max_bytes`, bounded by the read timeout.
    /// TCP returns what one `recv` yields; serial keeps collecting until the
    /// buffer is full or the timeout runs out.
    fn read(&mut self, max_bytes: usize) -> Result<Received, TransportError>;

    /// Releases the handle. Closing twice is a silent no-op; reporting that
    /// is left to the caller.
    fn close(&mut self) -> Result<(), TransportError>;

    fn describe(&self) -> String;
}

/// Opens the transport for `media`.
pub fn open(
    media: &Media,
    read_timeout: Duration,
    force: bool,
) -> Result<Box<dyn Transport>, ConnectError> {
    if read_timeout.is_zero() {
        return Err(ConnectError::InvalidTimeout);
    }

    let transport: Box<dyn Transport> = match media {
        Media::Serial { path, baudrate } => Box::new(SerialTransport::open(
            path,
            *baudrate,
            read_timeout,
            force,
        )?),
        Media::Tcp { host, port } => Box::new(TcpTransport::connect(host, *port, read_timeout)?),
    };
    Ok(transport)
}

fn read_once<R: Read + ?Sized>(reader: &mut R, max_bytes: usize) -> Result<Received, TransportError> {
    let mut buf = vec![0u8; max_bytes];
    match reader.read(&mut buf) {
        Ok(n) => {
            buf.truncate(n);
            Ok(Received::Data(buf))
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
            Ok(Received::TimedOut)
        }
        Err(e) => Err(TransportError::Read(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_display_and_validation() {
        assert_eq!(Media::tcp("10.0.0.5", 4000).to_string(), "10.0.0.5:4000");
        assert_eq!(Media::serial("/dev/ttyUSB0", 4800).to_string(), "/dev/ttyUSB0@4800");
        assert!(Media::tcp("cryo", 4000).is_valid());
        assert!(!Media::tcp("", 4000).is_valid());
        assert!(!Media::tcp("cryo", 0).is_valid());
        assert!(!Media::serial(" ", 4800).is_valid());
        assert!(!Media::serial("/dev/ttyUSB0", 0).is_valid());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let res = open(&Media::tcp("127.0.0.1", 1), Duration::ZERO, false);
        assert!(matches!(res, Err(ConnectError::InvalidTimeout)));
    }

    struct Stalled;

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "stalled"))
        }
    }

    #[test]
    fn read_once_maps_timeouts() {
        assert_eq!(read_once(&mut Stalled, 16).unwrap(), Received::TimedOut);

        let mut data: &[u8] = b"TC 77.0\r\n";
        assert_eq!(
            read_once(&mut data, 4).unwrap(),
            Received::Data(b"TC 7".to_vec())
        );
    }
}
