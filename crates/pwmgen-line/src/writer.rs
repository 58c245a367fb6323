use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use pwmgen_transport::DeviceStream;
use tracing::trace;

use crate::codec::{encode_request, encode_response, LineConfig, Response};
use crate::error::{LineError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete lines to any `Write` stream.
pub struct LineWriter<T> {
    inner: T,
    buf: BytesMut,
    config: LineConfig,
}

impl<T: Write> LineWriter<T> {
    /// Create a new line writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LineConfig::default())
    }

    /// Create a new line writer with explicit configuration.
    pub fn with_config(inner: T, config: LineConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one request line (blocking).
    ///
    /// An empty request is rejected before anything reaches the stream.
    pub fn send_request(&mut self, request: &str) -> Result<()> {
        self.buf.clear();
        encode_request(request, &mut self.buf)?;
        self.write_buffered()
    }

    /// Encode and send one response line, device side.
    pub fn send_response(&mut self, response: &Response) -> Result<()> {
        self.buf.clear();
        encode_response(response, &mut self.buf);
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        trace!(line = ?String::from_utf8_lossy(&self.buf), "sending line");
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(LineError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.classify(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.classify(err)),
            }
        }
    }

    fn classify(&self, err: std::io::Error) -> LineError {
        match (err.kind(), self.config.write_timeout) {
            (ErrorKind::WouldBlock | ErrorKind::TimedOut, Some(timeout)) => {
                LineError::Timeout(timeout)
            }
            _ => LineError::Io(err),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current line writer configuration.
    pub fn config(&self) -> &LineConfig {
        &self.config
    }
}

impl LineWriter<DeviceStream> {
    /// Create a line writer for `DeviceStream` and apply write timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: LineConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
