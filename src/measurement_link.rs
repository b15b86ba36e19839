use std::borrow::Cow;
use std::fmt;

/// `MeasurementLink`
///
/// Line-level transport to the measurement controller. Implementations own
/// the underlying device handle and know nothing about what the lines mean;
/// the session layer composes them into a request/response exchange. Designed
/// so a scripted in-memory implementation can stand in for real hardware.
pub trait MeasurementLink {
    /// Discards any unread bytes left over from a previous exchange.
    fn flush_input(&mut self) -> Result<(), LinkError>;

    /// Sends one CRLF-terminated line to the controller.
    fn write_line(&mut self, line: &str) -> Result<(), LinkError>;

    /// Receives one line, blocking up to the transport's read timeout. The
    /// line terminator is not included. An empty buffer means the timeout
    /// elapsed with no complete line; callers distinguish timeout from data
    /// by emptiness.
    fn read_line(&mut self) -> Result<Vec<u8>, LinkError>;
}

/// The ways talking to the serial device can go wrong. `PortBusy` and
/// `Connection` can only come out of opening or discovering a port;
/// `Communication` can only come out of traffic on an already-open one.
#[derive(Debug)]
pub enum LinkError {
    /// The port exists but another process is holding it.
    PortBusy(std::io::Error),

    /// The port could not be opened, or enumeration itself failed.
    Connection(std::io::Error),

    /// Enumeration succeeded but no device carried the controller's USB
    /// vendor id.
    NoMatchingDevice,

    /// A read or write on an open port failed outright. Distinct from a
    /// timeout, which is reported as an empty read.
    Communication(std::io::Error),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use LinkError as LE;
        let msg = match self {
            LE::PortBusy(error) => Cow::from(format!("port is in use: {}", error)),
            LE::Connection(error) => Cow::from(format!("could not open port: {}", error)),
            LE::NoMatchingDevice => Cow::from("no serial device matched the controller vendor id"),
            LE::Communication(error) => Cow::from(format!("serial transport failure: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for LinkError {}
