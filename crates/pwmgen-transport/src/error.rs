/// Errors that can occur in device transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The device address could not be parsed or resolved.
    #[error("invalid device address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Failed to bind a listener to the specified address.
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: std::path::PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
