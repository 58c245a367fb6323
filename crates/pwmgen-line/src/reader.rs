use std::io::{ErrorKind, Read};

use bytes::Bytes;
use pwmgen_transport::DeviceStream;
use tracing::trace;

use crate::buffer::LineBuffer;
use crate::codec::LineConfig;
use crate::error::{LineError, Result};

/// Reads newline-terminated records from any `Read` stream.
///
/// Handles fragmented reads internally: callers always get complete
/// lines, and bytes received past a newline are kept for the next call.
pub struct LineReader<T> {
    inner: T,
    buf: LineBuffer,
    config: LineConfig,
}

impl<T: Read> LineReader<T> {
    /// Create a new line reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LineConfig::default())
    }

    /// Create a new line reader with explicit configuration.
    pub fn with_config(inner: T, config: LineConfig) -> Self {
        Self {
            inner,
            buf: LineBuffer::new(config.initial_capacity, config.max_capacity),
            config,
        }
    }

    /// Read the next complete line, newline included (blocking).
    ///
    /// A line already sitting in the buffer is returned without touching
    /// the stream. Returns `Err(LineError::ConnectionClosed)` on EOF.
    pub fn read_line(&mut self) -> Result<Bytes> {
        loop {
            if let Some(len) = self.buf.find_line() {
                let line = self.buf.consume_up_to(len);
                trace!(len, buffered = self.buf.len(), "line received");
                return Ok(line);
            }

            match self.buf.append_from(&mut self.inner) {
                Ok(0) => return Err(LineError::ConnectionClosed),
                Ok(_) => {}
                Err(LineError::Io(err)) if err.kind() == ErrorKind::Interrupted => {}
                Err(LineError::Io(err))
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Err(match self.config.read_timeout {
                        Some(timeout) => LineError::Timeout(timeout),
                        None => LineError::Io(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Number of received bytes not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Current receive buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Discard buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current line reader configuration.
    pub fn config(&self) -> &LineConfig {
        &self.config
    }
}

impl LineReader<DeviceStream> {
    /// Create a line reader for `DeviceStream` and apply read timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: LineConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use super::*;

    fn lines_of(reader: &mut LineReader<impl Read>) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match reader.read_line() {
                Ok(line) => out.push(line.to_vec()),
                Err(LineError::ConnectionClosed) => return out,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
    }

    #[test]
    fn read_single_line() {
        let mut reader = LineReader::new(Cursor::new(b">DONE\n".to_vec()));
        assert_eq!(reader.read_line().unwrap().as_ref(), b">DONE\n");
    }

    #[test]
    fn buffered_second_line_needs_no_read() {
        let mut reader = LineReader::new(CountingReader::new(b">DONE\n>440 0.5\n"));

        assert_eq!(reader.read_line().unwrap().as_ref(), b">DONE\n");
        assert_eq!(reader.get_ref().reads, 1);
        assert_eq!(reader.read_line().unwrap().as_ref(), b">440 0.5\n");
        assert_eq!(reader.get_ref().reads, 1, "second line must come from the buffer");
    }

    #[test]
    fn fragmentation_does_not_change_records() {
        let wire: &[u8] = b">HELO dev\n>2, 0 CST 0.1 0 0 0, 1 SIN 0.5 0.5 1 0\n!nope\n>DONE\n";
        let whole = lines_of(&mut LineReader::new(Cursor::new(wire.to_vec())));
        assert_eq!(whole.len(), 4);

        for chunk in [1, 2, 3, 5, 7, 16] {
            let chunked = ChunkedReader {
                bytes: wire.to_vec(),
                pos: 0,
                chunk,
            };
            let mut reader = LineReader::with_config(
                chunked,
                LineConfig {
                    initial_capacity: 4,
                    ..LineConfig::default()
                },
            );
            assert_eq!(lines_of(&mut reader), whole, "chunk size {chunk}");
        }
    }

    #[test]
    fn line_longer_than_initial_capacity_grows_buffer() {
        let mut wire = vec![b'>'];
        wire.extend(std::iter::repeat(b'9').take(5000));
        wire.push(b'\n');

        let mut reader = LineReader::new(Cursor::new(wire.clone()));
        assert_eq!(reader.read_line().unwrap().as_ref(), wire.as_slice());
        assert!(reader.capacity() >= 5002);
    }

    #[test]
    fn line_longer_than_ceiling_overflows() {
        let wire = vec![b'x'; 70 * 1024];
        let mut reader = LineReader::new(Cursor::new(wire));
        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, LineError::Overflow { max: 65536 }));
    }

    #[test]
    fn connection_closed_mid_line() {
        let mut reader = LineReader::new(Cursor::new(b">HEL".to_vec()));
        assert!(matches!(
            reader.read_line().unwrap_err(),
            LineError::ConnectionClosed
        ));
    }

    #[test]
    fn read_error_propagates() {
        let mut reader = LineReader::new(ResetReader);
        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, LineError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
    }

    #[test]
    fn interrupted_read_retries() {
        let mut reader = LineReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(b">DONE\n".to_vec()),
        });
        assert_eq!(reader.read_line().unwrap().as_ref(), b">DONE\n");
    }

    #[test]
    fn would_block_with_deadline_is_timeout() {
        let config = LineConfig {
            read_timeout: Some(Duration::from_millis(5)),
            ..LineConfig::default()
        };
        let mut reader = LineReader::with_config(WouldBlockReader, config);
        assert!(matches!(
            reader.read_line().unwrap_err(),
            LineError::Timeout(d) if d == Duration::from_millis(5)
        ));
    }

    #[test]
    #[cfg(unix)]
    fn device_stream_read_timeout_is_applied() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let config = LineConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..LineConfig::default()
        };
        let mut reader = LineReader::with_config_device(DeviceStream::from(left), config).unwrap();
        assert!(matches!(
            reader.read_line().unwrap_err(),
            LineError::Timeout(_)
        ));
    }

    struct CountingReader {
        inner: Cursor<Vec<u8>>,
        reads: usize,
    }

    impl CountingReader {
        fn new(bytes: &[u8]) -> Self {
            Self {
                inner: Cursor::new(bytes.to_vec()),
                reads: 0,
            }
        }
    }

    impl Read for CountingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads += 1;
            self.inner.read(buf)
        }
    }

    struct ChunkedReader {
        bytes: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.bytes.len() - self.pos);
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct ResetReader;

    impl Read for ResetReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::ConnectionReset))
        }
    }

    struct WouldBlockReader;

    impl Read for WouldBlockReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
