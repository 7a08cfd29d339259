use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use log::debug;

use super::{ConnectError, Received, Transport, TransportError};
use crate::port::{self, SerialPort};

pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
}

impl SerialTransport {
    pub fn open(
        path: &str,
        baudrate: u32,
        read_timeout: Duration,
        force: bool,
    ) -> Result<Self, ConnectError> {
        let port = port::open_port(path, baudrate, read_timeout, force)?;
        Ok(Self {
            port: Some(port),
            name: format!("{}@{}", path, baudrate),
        })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

/// Fills `buf` until it is full or `deadline` passes, returning the count.
///
/// A slow line delivers a reply in several pieces, so a single `read` call
/// would cut it short.
fn fill_until(
    port: &mut dyn SerialPort,
    buf: &mut [u8],
    deadline: Instant,
) -> Result<usize, TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        port.set_timeout(remaining)
            .map_err(|e| TransportError::Read(e.into()))?;

        match port.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                break
            }
            Err(e) => return Err(TransportError::Read(e)),
        }
    }
    Ok(filled)
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port()?;
        port.write_all(bytes)
            .and_then(|_| port.flush())
            .map_err(TransportError::Write)
    }

    /// Collects bytes until `max_bytes` have arrived or the read timeout
    /// runs out, whichever comes first.
    fn read(&mut self, max_bytes: usize) -> Result<Received, TransportError> {
        let port = self.port()?;
        let timeout = port.timeout();
        let mut buf = vec![0u8; max_bytes];

        let filled = fill_until(&mut **port, &mut buf, Instant::now() + timeout);
        // the per-call timeout is shrunk while filling
        let restored = port
            .set_timeout(timeout)
            .map_err(|e| TransportError::Read(e.into()));
        let filled = filled?;
        restored?;

        if filled == 0 {
            return Ok(Received::TimedOut);
        }
        buf.truncate(filled);
        Ok(Received::Data(buf))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.port.take() {
            Some(mut port) => {
                let res = port.flush().map_err(TransportError::Close);
                debug!("closed serial port {}", self.name);
                res
            }
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cryocooler::{Config, SunpowerCryocooler};
    use crate::protocol::Reply;
    use crate::report::{Level, MemoryReporter};
    use serialport::TTYPort;
    use std::thread;

    /// A pty pair: the controller end and a transport on the other end.
    fn pty(read_timeout: Duration) -> (TTYPort, SerialTransport) {
        let (mut controller, mut host) = TTYPort::pair().unwrap();
        controller.set_timeout(Duration::from_secs(1)).unwrap();
        host.set_timeout(read_timeout).unwrap();
        let transport = SerialTransport {
            port: Some(Box::new(host)),
            name: "pty@4800".into(),
        };
        (controller, transport)
    }

    /// Sends `chunks` from the controller end with a pause between them.
    /// The controller end is handed back on join so the line stays up until
    /// the test is done reading.
    fn trickle(
        mut controller: TTYPort,
        chunks: &'static [&'static [u8]],
        pause: Duration,
    ) -> thread::JoinHandle<TTYPort> {
        thread::spawn(move || {
            for (i, chunk) in chunks.iter().enumerate() {
                if i > 0 {
                    thread::sleep(pause);
                }
                controller.write_all(chunk).unwrap();
            }
            controller
        })
    }

    #[test]
    fn reply_arriving_in_pieces_is_collected() {
        let (controller, mut transport) = pty(Duration::from_millis(500));
        let device = trickle(
            controller,
            &[b"E\r\n0.000\r\n", b"0.000\r\n12.34\r\n"],
            Duration::from_millis(100),
        );

        let raw = match transport.read(1024).unwrap() {
            Received::Data(raw) => raw,
            Received::TimedOut => panic!("nothing received"),
        };
        assert_eq!(
            *Reply::from_bytes(&raw),
            vec!["E", "0.000", "0.000", "12.34"]
        );
        device.join().unwrap();
    }

    #[test]
    fn read_stops_at_max_bytes() {
        let (controller, mut transport) = pty(Duration::from_secs(2));
        let device = trickle(controller, &[b"STATUS\r\n", b"more"], Duration::ZERO);

        let started = Instant::now();
        assert_eq!(
            transport.read(4).unwrap(),
            Received::Data(b"STAT".to_vec())
        );
        assert!(started.elapsed() < Duration::from_secs(1));
        device.join().unwrap();
    }

    #[test]
    fn silent_line_times_out_and_keeps_timeout() {
        let (_controller, mut transport) = pty(Duration::from_millis(200));

        let started = Instant::now();
        assert_eq!(transport.read(1024).unwrap(), Received::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(150));

        let port = transport.port().unwrap();
        assert_eq!(port.timeout(), Duration::from_millis(200));
    }

    #[test]
    fn write_then_close_twice() {
        let (mut controller, mut transport) = pty(Duration::from_millis(200));
        transport.write(b"TC\r").unwrap();

        let mut buf = [0u8; 16];
        let n = controller.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"TC\r");

        transport.close().unwrap();
        transport.close().unwrap();
        assert!(matches!(transport.write(b"TC\r"), Err(TransportError::Closed)));
        assert!(matches!(transport.read(16), Err(TransportError::Closed)));
    }

    #[test]
    fn current_commanded_power_over_a_slow_line() {
        let (controller, transport) = pty(Duration::from_millis(500));
        let device = trickle(
            controller,
            &[b"E\r\n0.000\r\n", b"0.000\r\n12.34\r\n"],
            Duration::from_millis(100),
        );

        let reporter = MemoryReporter::new();
        let mut cooler = SunpowerCryocooler::new(
            Config {
                read_timeout: Duration::from_millis(500),
                settle_delay: Duration::from_millis(20),
                force: true,
            },
            reporter.clone(),
        );
        cooler.attach(Box::new(transport)).unwrap();

        assert_eq!(cooler.get_current_commanded_power().unwrap(), 12.34);

        cooler.disconnect().unwrap();
        cooler.disconnect().unwrap();
        assert_eq!(reporter.count(Level::Warn), 1);
        assert_eq!(cooler.last_message(), Some("Already disconnected from device."));
        device.join().unwrap();
    }
}
