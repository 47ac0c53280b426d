use std::fmt;
use std::io;

use armlink::simulator::SimulatorError;
use armlink_robot::LinkError;
use armlink_transport::ConnectError;

pub const SUCCESS: i32 = 0;
#[allow(dead_code)]
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn connect_error(context: &str, err: ConnectError) -> CliError {
    match err {
        ConnectError::Connect { addr, source } | ConnectError::Bind { addr, source } => {
            io_error(&format!("{context} ({addr})"), source)
        }
        ConnectError::Io(source) => io_error(context, source),
        ConnectError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ConnectError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ConnectError::Resolve { .. } | ConnectError::Serial { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Connect(err) => connect_error(context, err),
        LinkError::OutOfRangeJoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        LinkError::ClosedWhileConnecting | LinkError::Cancelled => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        LinkError::ConnectInProgress => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn simulator_error(context: &str, err: SimulatorError) -> CliError {
    match err {
        SimulatorError::Bind { source, .. } | SimulatorError::Io(source) => {
            io_error(context, source)
        }
        SimulatorError::InvalidRate(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SimulatorError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SimulatorError::Frame(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}
