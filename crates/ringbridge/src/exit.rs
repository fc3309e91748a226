use std::fmt;
use std::io;

use ringbridge_frame::FrameError;
use ringbridge_io::IoError;
use ringbridge_relay::RelayError;
use ringbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const CONFIG_INVALID: i32 = 40;
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
        io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrInUse => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::TrailingBytes { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed | FrameError::Truncated { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn subsystem_error(context: &str, err: IoError) -> CliError {
    match err {
        IoError::InvalidConfig(_) | IoError::RegionExhausted { .. } => {
            CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
        }
        IoError::InvalidStreamId { .. } | IoError::ChannelExists { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        IoError::Malformed(_) | IoError::BufferOverflow { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn relay_error(context: &str, err: RelayError) -> CliError {
    match err {
        RelayError::Transport(err) => transport_error(context, err),
        RelayError::Config(_) | RelayError::Json(_) => {
            CliError::new(CONFIG_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
