use std::fmt;
use std::io::Read;

use bytes::{Bytes, BytesMut};

use crate::codec::NEWLINE;
use crate::error::{LineError, Result};

/// Largest single read issued against the source.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Growable receive buffer that assembles newline-terminated records.
///
/// Holds the bytes received but not yet handed out. Growth doubles the
/// capacity up to a hard ceiling; bytes already scanned for a newline are
/// never scanned again.
pub struct LineBuffer {
    data: BytesMut,
    capacity: usize,
    max_capacity: usize,
    scanned: usize,
    scratch: Box<[u8]>,
}

impl fmt::Debug for LineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineBuffer")
            .field("len", &self.data.len())
            .field("capacity", &self.capacity)
            .field("max_capacity", &self.max_capacity)
            .field("scanned", &self.scanned)
            .finish_non_exhaustive()
    }
}

impl LineBuffer {
    /// Create a buffer with the given initial capacity and ceiling.
    ///
    /// The initial capacity is clamped to `1..=max_capacity`.
    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(1);
        let capacity = initial_capacity.clamp(1, max_capacity);
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
            max_capacity,
            scanned: 0,
            scratch: vec![0u8; READ_CHUNK_SIZE.min(max_capacity)].into_boxed_slice(),
        }
    }

    /// Number of valid, not yet consumed bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Current logical capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hard ceiling the capacity never grows past.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Locate the next complete line in the buffered bytes.
    ///
    /// Returns the record length including the newline. Only the bytes
    /// appended since the previous scan are inspected.
    pub fn find_line(&mut self) -> Option<usize> {
        match self.data[self.scanned..]
            .iter()
            .position(|&b| b == NEWLINE)
        {
            Some(offset) => {
                self.scanned += offset;
                Some(self.scanned + 1)
            }
            None => {
                self.scanned = self.data.len();
                None
            }
        }
    }

    /// Remove the first `marker` bytes and return them.
    ///
    /// The remaining bytes move to the front of the buffer.
    pub fn consume_up_to(&mut self, marker: usize) -> Bytes {
        let marker = marker.min(self.data.len());
        self.scanned = self.scanned.saturating_sub(marker);
        self.data.split_to(marker).freeze()
    }

    /// Perform one read from `src` into the free tail of the buffer.
    ///
    /// A full buffer first doubles its capacity; a full buffer already at
    /// the ceiling is [`LineError::Overflow`]. A single read never asks for
    /// more than the free tail or the reusable read chunk. Returns the
    /// number of bytes read, `0` meaning end of stream.
    pub fn append_from<R: Read + ?Sized>(&mut self, src: &mut R) -> Result<usize> {
        if self.data.len() >= self.capacity {
            if self.capacity >= self.max_capacity {
                return Err(LineError::Overflow {
                    max: self.max_capacity,
                });
            }
            self.capacity = (self.capacity * 2).min(self.max_capacity);
        }

        let free = (self.capacity - self.data.len()).min(self.scratch.len());
        let read = src.read(&mut self.scratch[..free])?;
        self.data.extend_from_slice(&self.scratch[..read]);
        Ok(read)
    }

    /// Drop every buffered byte and reset the markers.
    ///
    /// The grown capacity is kept.
    pub fn clear(&mut self) {
        self.data.clear();
        self.scanned = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn finds_line_and_keeps_remainder() {
        let mut buf = LineBuffer::new(64, 1024);
        let mut src = Cursor::new(b">DONE\n>HELO".to_vec());
        assert_eq!(buf.append_from(&mut src).unwrap(), 11);

        let len = buf.find_line().unwrap();
        assert_eq!(len, 6);
        assert_eq!(buf.consume_up_to(len).as_ref(), b">DONE\n");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.find_line(), None);
    }

    #[test]
    fn scan_resumes_after_previous_position() {
        let mut buf = LineBuffer::new(64, 1024);
        buf.append_from(&mut Cursor::new(b"FR".to_vec())).unwrap();
        assert_eq!(buf.find_line(), None);
        assert_eq!(buf.scanned, 2);

        buf.append_from(&mut Cursor::new(b"EQ\nGP".to_vec())).unwrap();
        assert_eq!(buf.find_line(), Some(5));
        assert_eq!(buf.consume_up_to(5).as_ref(), b"FREQ\n");
        assert_eq!(buf.scanned, 0);
    }

    #[test]
    fn doubles_capacity_when_full() {
        let mut buf = LineBuffer::new(4, 16);
        let mut src = Cursor::new(vec![b'x'; 32]);

        assert_eq!(buf.append_from(&mut src).unwrap(), 4);
        assert_eq!(buf.capacity(), 4);
        assert_eq!(buf.append_from(&mut src).unwrap(), 4);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.append_from(&mut src).unwrap(), 8);
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn full_buffer_at_ceiling_overflows() {
        let mut buf = LineBuffer::new(8, 8);
        let mut src = Cursor::new(vec![b'x'; 32]);
        buf.append_from(&mut src).unwrap();

        let err = buf.append_from(&mut src).unwrap_err();
        assert!(matches!(err, LineError::Overflow { max: 8 }));
    }

    #[test]
    fn initial_capacity_is_clamped() {
        assert_eq!(LineBuffer::new(0, 16).capacity(), 1);
        assert_eq!(LineBuffer::new(1024, 16).capacity(), 16);
    }

    #[test]
    fn read_error_leaves_buffer_unchanged() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
            }
        }

        let mut buf = LineBuffer::new(8, 64);
        buf.append_from(&mut Cursor::new(b"ab".to_vec())).unwrap();
        let err = buf.append_from(&mut Failing).unwrap_err();
        assert!(matches!(err, LineError::Io(e) if e.kind() == std::io::ErrorKind::ConnectionReset));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn reads_are_bounded_by_free_tail_and_chunk() {
        struct Recording {
            remaining: usize,
            requests: Vec<usize>,
        }
        impl Read for Recording {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.requests.push(buf.len());
                let n = buf.len().min(self.remaining);
                buf[..n].fill(b'x');
                self.remaining -= n;
                Ok(n)
            }
        }

        let mut buf = LineBuffer::new(4, 64 * 1024);
        let mut src = Recording {
            remaining: 40_000,
            requests: Vec::new(),
        };
        while buf.append_from(&mut src).unwrap() > 0 {}

        assert_eq!(buf.len(), 40_000);
        assert_eq!(&src.requests[..3], &[4, 4, 8]);
        assert!(src.requests.iter().all(|&len| len <= READ_CHUNK_SIZE));
    }

    #[test]
    fn single_byte_reads_fill_up_to_ceiling() {
        struct OneByte(usize);
        impl Read for OneByte {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0 == 0 || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = b'x';
                self.0 -= 1;
                Ok(1)
            }
        }

        let mut buf = LineBuffer::new(16, 64 * 1024);
        let mut src = OneByte(64 * 1024);
        for _ in 0..64 * 1024 {
            assert_eq!(buf.append_from(&mut src).unwrap(), 1);
        }
        assert_eq!(buf.capacity(), 64 * 1024);
        assert!(matches!(
            buf.append_from(&mut src),
            Err(LineError::Overflow { max: 65536 })
        ));
    }

    #[test]
    fn clear_resets_markers() {
        let mut buf = LineBuffer::new(8, 64);
        buf.append_from(&mut Cursor::new(b"abc".to_vec())).unwrap();
        assert_eq!(buf.find_line(), None);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.scanned, 0);
    }
}
