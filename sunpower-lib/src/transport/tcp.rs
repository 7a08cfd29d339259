use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use super::{read_once, ConnectError, Received, Transport, TransportError, CONNECT_TIMEOUT};

pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: String,
}

impl TcpTransport {
    /// Tries every resolved address in turn, each with [`CONNECT_TIMEOUT`].
    pub fn connect(host: &str, port: u16, read_timeout: Duration) -> Result<Self, ConnectError> {
        let addr = format!("{}:{}", host, port);
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|source| ConnectError::Resolve {
                addr: addr.clone(),
                source,
            })?;

        let mut last_error = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(read_timeout))
                        .map_err(|source| ConnectError::Tcp {
                            addr: addr.clone(),
                            source,
                        })?;
                    debug!("connected to {} ({})", addr, candidate);
                    return Ok(Self {
                        stream: Some(stream),
                        peer: addr,
                    });
                }
                Err(e) => {
                    debug!("connect to {} failed: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        Err(ConnectError::Tcp {
            source: last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")
            }),
            addr,
        })
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for TcpTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream()?
            .write_all(bytes)
            .map_err(TransportError::Write)
    }

    fn read(&mut self, max_bytes: usize) -> Result<Received, TransportError> {
        read_once(self.stream()?, max_bytes)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.take() {
            Some(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                // peer hung up first
                Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
                Err(e) => Err(TransportError::Close(e)),
            },
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        self.peer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn refused_connection_is_a_connect_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let res = TcpTransport::connect("127.0.0.1", port, Duration::from_millis(100));
        assert!(matches!(res, Err(ConnectError::Tcp { .. })));
    }

    #[test]
    fn unresolvable_host_is_a_resolve_error() {
        let res = TcpTransport::connect("no such host.invalid", 4000, Duration::from_millis(100));
        assert!(matches!(
            res,
            Err(ConnectError::Resolve { .. }) | Err(ConnectError::Tcp { .. })
        ));
    }

    #[test]
    fn write_read_timeout_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let device = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 16];
            let n = stream.read(&mut buf).unwrap();
            stream.write_all(b"TC 77.0\r\n").unwrap();
            // hold the line open until the client hangs up
            let _ = stream.read(&mut buf);
            buf[..n].to_vec()
        });

        let mut transport =
            TcpTransport::connect("127.0.0.1", port, Duration::from_millis(500)).unwrap();
        assert_eq!(transport.describe(), format!("127.0.0.1:{}", port));

        transport.write(b"TC\r").unwrap();
        assert_eq!(
            transport.read(1024).unwrap(),
            Received::Data(b"TC 77.0\r\n".to_vec())
        );

        let started = std::time::Instant::now();
        assert_eq!(transport.read(1024).unwrap(), Received::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(400));

        transport.close().unwrap();
        transport.close().unwrap();
        assert!(matches!(transport.write(b"TC\r"), Err(TransportError::Closed)));

        assert_eq!(device.join().unwrap(), b"TC\r".to_vec());
    }
}
