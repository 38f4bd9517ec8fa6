use std::fmt;
use std::io;

use magtile_line::FramingError;
use magtile_session::{Reply, SessionError};
use magtile_transport::TransportError;

pub const SUCCESS: i32 = 0;
/// The device answered `error` or something unrecognized.
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const USAGE: i32 = 64;
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
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::NoDeviceSelected => CliError::new(
            USAGE,
            format!("{context}: {err} (pass --port or set MAGTILE_PORT)"),
        ),
        TransportError::PermissionDenied { .. } => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn framing_error(context: &str, err: FramingError) -> CliError {
    match err {
        FramingError::Io(source) => io_error(context, source),
        FramingError::StreamClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        FramingError::LineTooLong { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        FramingError::InvalidToken(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Framing(err) => framing_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

/// Exit code for a device reply.
pub fn reply_code(reply: &Reply) -> i32 {
    if reply.is_success() {
        SUCCESS
    } else {
        FAILURE
    }
}
