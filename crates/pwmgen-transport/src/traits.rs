use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected device stream. Implements Read + Write.
///
/// This is the live byte stream every generator session runs on. It wraps
/// a TCP connection to the device, or a Unix domain socket stream for local
/// simulators and tests.
pub struct DeviceStream {
    inner: DeviceStreamInner,
}

enum DeviceStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for DeviceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for DeviceStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            DeviceStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl From<TcpStream> for DeviceStream {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: DeviceStreamInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for DeviceStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: DeviceStreamInner::Unix(stream),
        }
    }
}

impl DeviceStream {
    /// Set read timeout on the underlying stream.
    ///
    /// `None` blocks forever, which is what the device protocol expects by
    /// default.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Used to split one connection into an independent reader and writer.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            DeviceStreamInner::Tcp(stream) => DeviceStreamInner::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => DeviceStreamInner::Unix(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Shut down both halves of the connection.
    ///
    /// Every clone of the stream observes the shutdown. A peer that already
    /// went away reports `NotConnected`, which is not treated as a failure.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Into::into),
        }
    }

    /// Human-readable description of the remote end, for diagnostics.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            DeviceStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:<unknown>".to_string()),
            #[cfg(unix)]
            DeviceStreamInner::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|p| format!("unix:{}", p.display())))
                .unwrap_or_else(|| "unix:<unnamed>".to_string()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            DeviceStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            DeviceStreamInner::Unix(_) => "unix-domain-socket",
        }
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStream")
            .field("type", &self.transport_name())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn unix_pair_reads_and_writes() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut left = DeviceStream::from(left);
        let mut right = DeviceStream::from(right);

        left.write_all(b"PWM0\n").unwrap();
        let mut buf = [0u8; 5];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"PWM0\n");
        assert_eq!(left.transport_name(), "unix-domain-socket");
    }

    #[test]
    fn clone_shares_connection() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let left = DeviceStream::from(left);
        let mut writer = left.try_clone().unwrap();
        let mut right = DeviceStream::from(right);

        writer.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
    }

    #[test]
    fn shutdown_is_seen_by_peer_as_eof() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let left = DeviceStream::from(left);
        let mut right = DeviceStream::from(right);

        left.shutdown().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(right.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_timeout_reports_would_block() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut left = DeviceStream::from(left);
        left.set_read_timeout(Some(Duration::from_millis(10))).unwrap();

        let mut buf = [0u8; 8];
        let err = left.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }
}
