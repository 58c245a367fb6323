use std::net::TcpListener;

use tracing::{debug, info};

use crate::address::DeviceAddress;
use crate::error::{Result, TransportError};
use crate::traits::DeviceStream;

/// Accepts device-side connections.
///
/// Only the simulated device needs this; a real generator is the listening
/// side and the client just connects.
pub enum DeviceListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(crate::uds::UnixSocketListener),
}

impl DeviceListener {
    /// Bind to a TCP endpoint or a Unix socket path.
    pub fn bind(address: &DeviceAddress) -> Result<Self> {
        match address {
            DeviceAddress::Tcp(addr) => {
                let listener = TcpListener::bind(addr.as_str()).map_err(|source| {
                    TransportError::Bind {
                        address: addr.clone(),
                        source,
                    }
                })?;
                info!(address = %addr, "listening on tcp");
                Ok(Self::Tcp(listener))
            }
            #[cfg(unix)]
            DeviceAddress::Unix(path) => Ok(Self::Unix(crate::uds::UnixSocketListener::bind(
                path,
            )?)),
            #[cfg(not(unix))]
            DeviceAddress::Unix(_) => Err(TransportError::Bind {
                address: address.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
        }
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<DeviceStream> {
        match self {
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                debug!(%peer, "accepted connection");
                Ok(DeviceStream::from(stream))
            }
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept(),
        }
    }

    /// The address clients should connect to.
    ///
    /// For a TCP listener bound to port 0 this reports the port the OS
    /// picked.
    pub fn local_address(&self) -> Result<DeviceAddress> {
        match self {
            Self::Tcp(listener) => Ok(DeviceAddress::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            Self::Unix(listener) => Ok(DeviceAddress::Unix(listener.path().to_path_buf())),
        }
    }
}

impl std::fmt::Debug for DeviceListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let address = self
            .local_address()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        f.debug_struct("DeviceListener")
            .field("address", &address)
            .finish()
    }
}
