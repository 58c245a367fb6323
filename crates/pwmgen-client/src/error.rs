use std::num::{ParseFloatError, ParseIntError};

/// Errors that can occur in generator operations.
///
/// Use [`GeneratorError::is_fatal`] to tell whether the session is still
/// usable; matching on the variant alone does not say so for
/// [`GeneratorError::Line`].
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// Transport-level error (address, connect, socket setup).
    #[error("transport error: {0}")]
    Transport(#[from] pwmgen_transport::TransportError),

    /// Line-level error (I/O, framing, overflow, request encoding).
    #[error("{0}")]
    Line(#[from] pwmgen_line::LineError),

    /// The greeting reply did not start with `HELO `.
    #[error("invalid greeting: {0:?}")]
    InvalidGreeting(String),

    /// The device answered the greeting with an error line.
    #[error("greeting refused by device: {0}")]
    GreetingRefused(String),

    /// A channel operation was attempted without an open session.
    #[error("not connected")]
    NotConnected,

    /// An earlier fatal error left the session unusable.
    #[error("session failed ({0}); close it before reuse")]
    SessionFailed(String),

    /// The device understood the request and refused it.
    #[error("{0}")]
    Device(String),

    /// The device replied, but the payload does not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(#[from] PayloadError),

    /// A channel configuration violates the generator's acceptance rules.
    #[error("channel[{channel}]: {reason}")]
    InvalidParam { channel: u32, reason: String },

    /// Releasing the transport failed; the session was reset anyway.
    #[error("close failed: {0}")]
    Close(#[source] pwmgen_transport::TransportError),
}

impl GeneratorError {
    /// Whether the session must be closed (and possibly reopened) before
    /// issuing further requests.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Line(err) => err.is_fatal(),
            Self::Device(_)
            | Self::InvalidResponse(_)
            | Self::InvalidParam { .. }
            | Self::Close(_) => false,
            Self::Transport(_)
            | Self::InvalidGreeting(_)
            | Self::GreetingRefused(_)
            | Self::NotConnected
            | Self::SessionFailed(_) => true,
        }
    }

    /// The device's own error text, for `!` replies.
    pub fn device_message(&self) -> Option<&str> {
        match self {
            Self::Device(message) | Self::GreetingRefused(message) => Some(message),
            _ => None,
        }
    }
}

/// Why a received payload could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is not valid UTF-8")]
    NotText(#[from] std::str::Utf8Error),

    #[error("missing channel count")]
    MissingCount,

    #[error("invalid channel count {text:?}")]
    BadCount {
        text: String,
        #[source]
        source: ParseIntError,
    },

    #[error("expected {expected} channel entries, found {found}")]
    CountMismatch { expected: usize, found: usize },

    #[error("channel entry {entry}: expected 6 fields, found {found}")]
    FieldCount { entry: usize, found: usize },

    #[error("channel entry {entry}: invalid channel index {text:?}")]
    BadChannel {
        entry: usize,
        text: String,
        #[source]
        source: ParseIntError,
    },

    #[error("unknown waveform kind {0:?}")]
    UnknownKind(String),

    #[error("invalid {field} value {text:?}")]
    BadNumber {
        field: &'static str,
        text: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("expected {expected} values, found {found}")]
    ValueCount { expected: usize, found: usize },

    #[error("unexpected acknowledgement {0:?}")]
    UnexpectedAck(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
