#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
use linux::is_port_open;

pub use serialport::SerialPort;

use core::time::Duration;
use log::debug;
use serialport::{DataBits, FlowControl, Parity, StopBits};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenPortError {
    #[error("{port_name:?} busy")]
    PortBusy { port_name: String },
    #[error("can't open {port_name:?}")]
    Open {
        port_name: String,
        #[source]
        source: serialport::Error,
    },
}

// TODO: implement a holder check for non-Linux hosts
#[cfg(not(target_os = "linux"))]
fn is_port_open(_port_name: &str) -> bool {
    false
}

/// Opens `port_name` with 8N1 framing, no flow control and `timeout` as the
/// read timeout. Unless `force` is set, refuses a device another process
/// already holds.
pub fn open_port(
    port_name: &str,
    baudrate: u32,
    timeout: Duration,
    force: bool,
) -> Result<Box<dyn SerialPort>, OpenPortError> {
    if !force && is_port_open(port_name) {
        return Err(OpenPortError::PortBusy {
            port_name: port_name.to_string(),
        });
    }

    let port = serialport::new(port_name, baudrate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(timeout)
        .open()
        .map_err(|source| OpenPortError::Open {
            port_name: port_name.to_string(),
            source,
        })?;

    debug!("open_port OK: {} @ {} baud", port_name, baudrate);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_open() {
        let err = match open_port(
            "/dev/this-cryocooler-does-not-exist",
            4800,
            Duration::from_millis(100),
            true,
        ) {
            Ok(_) => panic!("opened a device that does not exist"),
            Err(e) => e,
        };
        assert!(matches!(err, OpenPortError::Open { .. }));
        assert!(err.to_string().contains("this-cryocooler-does-not-exist"));
    }
}
