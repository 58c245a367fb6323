use std::fmt;
use std::io;

use pwmgen_client::GeneratorError;
use pwmgen_line::LineError;
use pwmgen_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
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

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
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
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotFound
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidAddress { .. } | TransportError::PathTooLong { .. } => {
            CliError::usage(format!("{context}: {err}"))
        }
    }
}

pub fn line_error(context: &str, err: LineError) -> CliError {
    match err {
        LineError::Io(source) => io_error(context, source),
        LineError::Transport(err) => transport_error(context, err),
        LineError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LineError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        LineError::Overflow { .. }
        | LineError::EmptyResponse
        | LineError::InvalidResponse { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        LineError::EmptyRequest | LineError::MultiLineRequest => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}

pub fn generator_error(context: &str, err: GeneratorError) -> CliError {
    match err {
        GeneratorError::Transport(err) => transport_error(context, err),
        GeneratorError::Line(err) => line_error(context, err),
        GeneratorError::InvalidGreeting(_)
        | GeneratorError::GreetingRefused(_)
        | GeneratorError::Device(_)
        | GeneratorError::InvalidResponse(_)
        | GeneratorError::InvalidParam { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        GeneratorError::NotConnected | GeneratorError::SessionFailed(_) => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
        GeneratorError::Close(err) => transport_error(context, err),
    }
}
