use std::time::Duration;

/// Errors that can occur while framing requests and responses.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    /// An I/O error occurred while reading or writing lines.
    #[error("line I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport could not be configured.
    #[error(transparent)]
    Transport(#[from] pwmgen_transport::TransportError),

    /// The peer closed the connection before a complete line was received.
    #[error("connection closed (incomplete line)")]
    ConnectionClosed,

    /// A blocking read or write hit the configured deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// No newline arrived before the receive buffer reached its ceiling.
    #[error("input buffer overflow (no newline within {max} bytes)")]
    Overflow { max: usize },

    /// The request was empty after trimming; nothing was sent.
    #[error("empty request")]
    EmptyRequest,

    /// The request contains a line break and would desynchronize the peer.
    #[error("request spans multiple lines")]
    MultiLineRequest,

    /// The peer sent an empty line.
    #[error("empty response")]
    EmptyResponse,

    /// The line starts with neither the success nor the error marker.
    #[error("invalid response (unexpected leading byte {found:#04x})")]
    InvalidResponse { found: u8 },
}

impl LineError {
    /// Whether the connection must be considered unusable after this error.
    ///
    /// Only request-side validation errors leave the stream untouched; every
    /// other failure may have left unread or half-written bytes behind.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::EmptyRequest | Self::MultiLineRequest)
    }
}

pub type Result<T> = std::result::Result<T, LineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validation_errors_are_not_fatal() {
        assert!(!LineError::EmptyRequest.is_fatal());
        assert!(!LineError::MultiLineRequest.is_fatal());
    }

    #[test]
    fn stream_errors_are_fatal() {
        assert!(LineError::ConnectionClosed.is_fatal());
        assert!(LineError::EmptyResponse.is_fatal());
        assert!(LineError::Overflow { max: 64 }.is_fatal());
        assert!(LineError::InvalidResponse { found: b'?' }.is_fatal());
        assert!(LineError::Timeout(Duration::from_secs(1)).is_fatal());
        assert!(LineError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)).is_fatal());
    }

    #[test]
    fn invalid_response_shows_byte() {
        let err = LineError::InvalidResponse { found: b'?' };
        assert_eq!(err.to_string(), "invalid response (unexpected leading byte 0x3f)");
    }
}
