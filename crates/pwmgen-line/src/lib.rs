//! Newline-delimited framing for the PWM generator protocol.
//!
//! Every exchange is one text line each way:
//! - requests are ASCII commands terminated by `\n`
//! - responses start with `>` (payload follows) or `!` (device error text)
//!
//! The reader assembles lines from arbitrarily fragmented reads in a
//! growable buffer with a hard ceiling. No partial lines reach callers.

pub mod buffer;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use buffer::LineBuffer;
pub use codec::{
    decode_response, encode_request, encode_response, LineConfig, Response,
    DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_CAPACITY, ERROR_MARKER, SUCCESS_MARKER,
};
pub use error::{LineError, Result};
pub use reader::LineReader;
pub use writer::LineWriter;
