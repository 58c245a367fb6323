use std::fmt;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::DeviceStream;

/// TCP port the generator firmware listens on when none is given.
pub const DEFAULT_PORT: u16 = 1234;

/// Prefix selecting a Unix domain socket address.
pub const UNIX_PREFIX: &str = "unix:";

/// Where a generator (or simulator) can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAddress {
    /// `host:port` TCP endpoint, kept unresolved until connect time.
    Tcp(String),
    /// Filesystem path of a Unix domain socket.
    Unix(PathBuf),
}

impl FromStr for DeviceAddress {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TransportError::InvalidAddress {
                address: input.to_string(),
                reason: "address must not be empty".to_string(),
            });
        }

        if let Some(path) = input.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(TransportError::InvalidAddress {
                    address: input.to_string(),
                    reason: "missing socket path".to_string(),
                });
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        if has_port(input) {
            Ok(Self::Tcp(input.to_string()))
        } else if input.contains(':') {
            // Bare IPv6 literal.
            Ok(Self::Tcp(format!("[{input}]:{DEFAULT_PORT}")))
        } else {
            Ok(Self::Tcp(format!("{input}:{DEFAULT_PORT}")))
        }
    }
}

fn has_port(input: &str) -> bool {
    if let Some(rest) = input.strip_prefix('[') {
        return rest.contains("]:");
    }
    match input.rsplit_once(':') {
        Some((host, port)) => !host.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => f.write_str(addr),
            Self::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

impl DeviceAddress {
    /// Connect to the device (blocking).
    ///
    /// With `timeout` set, each resolved TCP address is tried with that
    /// connect timeout; otherwise the OS default applies.
    pub fn connect(&self, timeout: Option<Duration>) -> Result<DeviceStream> {
        match self {
            Self::Tcp(addr) => connect_tcp(addr, timeout),
            #[cfg(unix)]
            Self::Unix(path) => crate::uds::UnixSocketListener::connect(path),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(TransportError::Connect {
                address: self.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
        }
    }
}

fn connect_tcp(addr: &str, timeout: Option<Duration>) -> Result<DeviceStream> {
    let candidates: Vec<SocketAddr> = addr
        .to_socket_addrs()
        .map_err(|err| TransportError::InvalidAddress {
            address: addr.to_string(),
            reason: err.to_string(),
        })?
        .collect();

    let mut last_err = None;
    for candidate in candidates {
        let attempt = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
            None => TcpStream::connect(candidate),
        };
        match attempt {
            Ok(stream) => {
                // Every request is one short line.
                stream.set_nodelay(true)?;
                debug!(address = %candidate, "connected to device");
                return Ok(DeviceStream::from(stream));
            }
            Err(err) => {
                debug!(address = %candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(TransportError::Connect {
        address: addr.to_string(),
        source: last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "address resolved to no endpoints",
            )
        }),
    })
}
