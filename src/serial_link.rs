//! The [`SerialLink`] owns the open connection to the measurement controller
//! and moves whole lines across it. The controller side is fixed at 115200
//! baud, 8 data bits, no parity, one stop bit, and every read is bounded by
//! a one second timeout so a stalled exchange can never hang the caller
//! indefinitely.
//!
//! Enumeration goes through the `serialport` crate because it reports USB
//! descriptor metadata; the transport itself goes through `serial2`.

use crate::measurement_link::{LinkError, MeasurementLink};

use log::{debug, warn};
use serial2::SerialPort;
use serialport::{SerialPortInfo, SerialPortType};
use std::time::Duration;

/// USB vendor id of the controller board (Raspberry Pi, 0x2E8A).
pub const CONTROLLER_VENDOR_ID: u16 = 11914;

/// Line rate the controller firmware is flashed with.
pub const BAUD_RATE: u32 = 115200;

/// How long a single read may block before the line is treated as withheld.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// An open serial connection to the controller. Replaced wholesale on
/// reconnect; the old handle is closed when it is dropped.
pub struct SerialLink {
    port: SerialPort,
    // Bytes received after the last line terminator, carried over between
    // read_line calls.
    pending: Vec<u8>,
}

impl SerialLink {
    /// Opens the named port with the fixed communication parameters.
    pub fn open(port_name: &str) -> Result<Self, LinkError> {
        let mut port = SerialPort::open(port_name, BAUD_RATE).map_err(classify_open_error)?;
        port.set_read_timeout(READ_TIMEOUT)
            .map_err(LinkError::Connection)?;

        debug!("opened {} at {} baud", port_name, BAUD_RATE);
        Ok(SerialLink {
            port,
            pending: Vec::new(),
        })
    }

    /// Enumerates serial devices and returns the name of the first one whose
    /// USB vendor id is the controller's. Read-only; opens nothing.
    pub fn discover() -> Result<String, LinkError> {
        let ports = serialport::available_ports()
            .map_err(|e| LinkError::Connection(std::io::Error::from(e)))?;
        first_matching_port(&ports).ok_or(LinkError::NoMatchingDevice)
    }
}

/// Picks the first port in `ports` presented by a device with the
/// controller's USB vendor id. Split out from [`SerialLink::discover`] so the
/// matching rule can be exercised without hardware attached.
pub fn first_matching_port(ports: &[SerialPortInfo]) -> Option<String> {
    ports
        .iter()
        .find(|p| match &p.port_type {
            SerialPortType::UsbPort(usb) => usb.vid == CONTROLLER_VENDOR_ID,
            _ => false,
        })
        .map(|p| p.port_name.clone())
}

impl MeasurementLink for SerialLink {
    fn flush_input(&mut self) -> Result<(), LinkError> {
        self.pending.clear();
        self.port
            .discard_input_buffer()
            .map_err(LinkError::Communication)
    }

    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        debug!("-> {:?}", line);
        let mut framed = line.as_bytes().to_vec();
        framed.extend_from_slice(b"\r\n");
        self.port.write_all(&framed).map_err(LinkError::Communication)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, LinkError> {
        let mut chunk = [0; 256];
        loop {
            if let Some(idx) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=idx).collect();
                line.pop();
                debug!("<- {:?}", String::from_utf8_lossy(&line));
                return Ok(line);
            }

            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(Vec::new()),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    if !self.pending.is_empty() {
                        warn!(
                            "timed out with {} unterminated bytes pending",
                            self.pending.len()
                        );
                    }
                    return Ok(Vec::new());
                }
                Err(e) => return Err(LinkError::Communication(e)),
            }
        }
    }
}

fn classify_open_error(err: std::io::Error) -> LinkError {
    if port_is_busy(&err) {
        LinkError::PortBusy(err)
    } else {
        LinkError::Connection(err)
    }
}

#[cfg(unix)]
fn port_is_busy(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::EBUSY)
}

#[cfg(windows)]
fn port_is_busy(err: &std::io::Error) -> bool {
    // ERROR_ACCESS_DENIED, which is how Windows reports a COM port that is
    // already held open elsewhere.
    err.raw_os_error() == Some(5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb_port(name: &str, vid: u16) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_owned(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid: 0x0005,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        }
    }

    #[test]
    fn test_discovery_picks_first_vendor_match() {
        let ports = vec![
            usb_port("/dev/ttyUSB0", 0x0403),
            usb_port("/dev/ttyACM0", CONTROLLER_VENDOR_ID),
            usb_port("/dev/ttyACM1", CONTROLLER_VENDOR_ID),
        ];

        assert_eq!(
            first_matching_port(&ports),
            Some("/dev/ttyACM0".to_owned())
        );
    }

    #[test]
    fn test_discovery_ignores_non_usb_ports() {
        let ports = vec![
            SerialPortInfo {
                port_name: "/dev/ttyS0".to_owned(),
                port_type: SerialPortType::PciPort,
            },
            usb_port("/dev/ttyUSB1", 0x1a86),
        ];

        assert_eq!(first_matching_port(&ports), None);
    }

    #[test]
    fn test_discovery_empty_enumeration() {
        assert_eq!(first_matching_port(&[]), None);
    }
}
