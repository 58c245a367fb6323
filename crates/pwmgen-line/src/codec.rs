use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{LineError, Result};

/// Line terminator for requests and responses.
pub const NEWLINE: u8 = b'\n';

/// Leading byte of a successful response.
pub const SUCCESS_MARKER: u8 = b'>';

/// Leading byte of a device-reported error.
pub const ERROR_MARKER: u8 = b'!';

/// Default initial receive buffer size.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Default receive buffer ceiling: 64 KiB.
pub const DEFAULT_MAX_CAPACITY: usize = 64 * 1024;

/// One classified line from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `>` line: the payload after the marker, terminator removed.
    Data(Bytes),
    /// `!` line: the device understood the request and refused it.
    DeviceError(String),
}

/// Encode a request into its wire form.
///
/// Surrounding whitespace is trimmed and exactly one newline appended.
///
/// ```text
/// "  GPRM \n"  ->  "GPRM\n"
/// ```
pub fn encode_request(request: &str, dst: &mut BytesMut) -> Result<()> {
    let line = request.trim();
    if line.is_empty() {
        return Err(LineError::EmptyRequest);
    }
    if line.bytes().any(|b| b == NEWLINE || b == b'\r') {
        return Err(LineError::MultiLineRequest);
    }
    dst.reserve(line.len() + 1);
    dst.put_slice(line.as_bytes());
    dst.put_u8(NEWLINE);
    Ok(())
}

/// Encode a response line, as the device side of the protocol sends it.
pub fn encode_response(response: &Response, dst: &mut BytesMut) {
    let (marker, body): (u8, &[u8]) = match response {
        Response::Data(payload) => (SUCCESS_MARKER, payload.as_ref()),
        Response::DeviceError(message) => (ERROR_MARKER, message.as_bytes()),
    };
    let body = strip_terminator(body);
    dst.reserve(body.len() + 2);
    dst.put_u8(marker);
    dst.put_slice(body);
    dst.put_u8(NEWLINE);
}

/// Classify one record produced by the line reader.
///
/// | leading byte | result                        |
/// |--------------|-------------------------------|
/// | `>`          | `Response::Data`              |
/// | `!`          | `Response::DeviceError`       |
/// | none         | `LineError::EmptyResponse`    |
/// | other        | `LineError::InvalidResponse`  |
pub fn decode_response(record: &Bytes) -> Result<Response> {
    let body_len = strip_terminator(record).len();
    let Some(&marker) = record.first().filter(|_| body_len > 0) else {
        return Err(LineError::EmptyResponse);
    };

    match marker {
        SUCCESS_MARKER => Ok(Response::Data(record.slice(1..body_len))),
        ERROR_MARKER => Ok(Response::DeviceError(
            String::from_utf8_lossy(&record[1..body_len]).into_owned(),
        )),
        found => Err(LineError::InvalidResponse { found }),
    }
}

/// Remove one trailing `\n` (and a preceding `\r`, if any).
pub fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Configuration for the line reader and writer.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Initial receive buffer size. Default: 1 KiB.
    pub initial_capacity: usize,
    /// Receive buffer ceiling; a longer line is an overflow. Default: 64 KiB.
    pub max_capacity: usize,
    /// Read deadline for blocking reads. Default: none (block forever).
    pub read_timeout: Option<Duration>,
    /// Write deadline for blocking writes.
    pub write_timeout: Option<Duration>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_capacity: DEFAULT_MAX_CAPACITY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(request: &str) -> Result<Vec<u8>> {
        let mut dst = BytesMut::new();
        encode_request(request, &mut dst)?;
        Ok(dst.to_vec())
    }

    #[test]
    fn request_gets_single_newline() {
        assert_eq!(encode("GPRM").unwrap(), b"GPRM\n");
        assert_eq!(encode("PWM0\n").unwrap(), b"PWM0\n");
        assert_eq!(encode("  FREQ  ").unwrap(), b"FREQ\n");
    }

    #[test]
    fn empty_request_is_rejected() {
        assert!(matches!(encode(""), Err(LineError::EmptyRequest)));
        assert!(matches!(encode(" \n "), Err(LineError::EmptyRequest)));
    }

    #[test]
    fn embedded_newline_is_rejected() {
        assert!(matches!(
            encode("GPRM\nFREQ"),
            Err(LineError::MultiLineRequest)
        ));
    }

    #[test]
    fn success_line_yields_payload_without_newline() {
        let rsp = decode_response(&Bytes::from_static(b">HELO unit-test-device\n")).unwrap();
        assert_eq!(rsp, Response::Data(Bytes::from_static(b"HELO unit-test-device")));
    }

    #[test]
    fn crlf_terminator_is_stripped() {
        let rsp = decode_response(&Bytes::from_static(b">DONE\r\n")).unwrap();
        assert_eq!(rsp, Response::Data(Bytes::from_static(b"DONE")));
    }

    #[test]
    fn marker_only_yields_empty_payload() {
        let rsp = decode_response(&Bytes::from_static(b">\n")).unwrap();
        assert_eq!(rsp, Response::Data(Bytes::new()));
    }

    #[test]
    fn error_line_yields_message() {
        let rsp = decode_response(&Bytes::from_static(b"!channel not found\n")).unwrap();
        assert_eq!(rsp, Response::DeviceError("channel not found".to_string()));
    }

    #[test]
    fn empty_line_is_empty_response() {
        assert!(matches!(
            decode_response(&Bytes::from_static(b"\n")),
            Err(LineError::EmptyResponse)
        ));
        assert!(matches!(
            decode_response(&Bytes::new()),
            Err(LineError::EmptyResponse)
        ));
    }

    #[test]
    fn unknown_marker_is_invalid_response() {
        assert!(matches!(
            decode_response(&Bytes::from_static(b"HELO\n")),
            Err(LineError::InvalidResponse { found: b'H' })
        ));
    }

    #[test]
    fn response_encoding_matches_wire_form() {
        let mut dst = BytesMut::new();
        encode_response(&Response::Data(Bytes::from_static(b"DONE")), &mut dst);
        encode_response(&Response::DeviceError("invalid arguments\n".to_string()), &mut dst);
        assert_eq!(dst.as_ref(), b">DONE\n!invalid arguments\n");
    }
}
