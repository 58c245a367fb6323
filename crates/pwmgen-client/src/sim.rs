//! Software stand-in for a generator, speaking the device side of the
//! protocol.
//!
//! It keeps per-channel parameters in memory, applies the same acceptance
//! rules as the firmware and reports a fixed pulse frequency. Useful for
//! tests and for trying the CLI without hardware.

use std::io::{Read, Write};

use bytes::Bytes;
use pwmgen_line::codec::strip_terminator;
use pwmgen_line::{LineError, LineReader, LineWriter, Response};
use pwmgen_transport::{DeviceListener, DeviceStream};
use tracing::{debug, info, warn};

use crate::error::{GeneratorError, Result};
use crate::greeting::answer_greeting;
use crate::message::{encode_channel_list, Frequency, FREQUENCY, GET_PARAMS, SET_ACK, SET_PARAMS};
use crate::param::{Param, WaveKind};

/// Identification sent in the greeting by default.
pub const DEFAULT_IDENTITY: &str = "v0.1.1 12bits";

/// Channels of the reference hardware.
pub const DEFAULT_CHANNELS: usize = 8;

/// Pulse frequency measured on the reference hardware.
pub const DEFAULT_FREQUENCY: Frequency = Frequency {
    mean: 10156.78,
    std_dev: 3.5,
};

/// In-memory generator.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    identity: String,
    params: Vec<Param>,
    frequency: Frequency,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDevice {
    /// Eight constant channels at 0, default identity and frequency.
    pub fn new() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            params: vec![Param::default(); DEFAULT_CHANNELS],
            frequency: DEFAULT_FREQUENCY,
        }
    }

    /// Use `channels` channels instead of eight.
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.params = vec![Param::default(); channels];
        self
    }

    /// Identification sent after `HELO `.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Frequency reported to `FREQ`.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Current channel parameters.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Answer one request line (terminator already removed).
    pub fn handle_request(&mut self, request: &str) -> Response {
        if request.len() < GET_PARAMS.len() {
            return error(format!("invalid request \"{request}\""));
        }

        if let Some(rest) = request.strip_prefix(GET_PARAMS) {
            if !rest.is_empty() {
                return error(format!("unexpected data after \"{GET_PARAMS}\""));
            }
            let list = encode_channel_list((0u32..).zip(self.params.iter()));
            return Response::Data(Bytes::from(list));
        }

        if let Some(rest) = request.strip_prefix(SET_PARAMS) {
            return match rest.strip_prefix(' ') {
                Some(args) => self.set_params(args),
                None if rest.is_empty() => {
                    error(format!("expected arguments to \"{SET_PARAMS}\""))
                }
                None => error(format!("undefined request \"{request}\"")),
            };
        }

        if let Some(rest) = request.strip_prefix(FREQUENCY) {
            if !rest.is_empty() {
                return error(format!("unexpected data after \"{FREQUENCY}\""));
            }
            let Frequency { mean, std_dev } = self.frequency;
            return Response::Data(Bytes::from(format!("{mean} {std_dev}")));
        }

        error(format!("undefined request \"{request}\""))
    }

    /// Channels are checked and staged first; nothing is applied unless
    /// every entry is acceptable.
    fn set_params(&mut self, args: &str) -> Response {
        let mut parts = args.split(',');
        let Some(count) = parts.next().and_then(|c| c.trim().parse::<usize>().ok()) else {
            return error("invalid arguments");
        };

        let mut staged: Vec<Option<Param>> = vec![None; self.params.len()];
        for _ in 0..count {
            let Some(entry) = parts.next() else {
                return error("invalid arguments");
            };
            let fields: Vec<&str> = entry.split_whitespace().collect();
            let [channel, kind, values @ ..] = fields.as_slice() else {
                return error("invalid arguments");
            };
            let Ok(channel) = channel.parse::<i64>() else {
                return error("invalid arguments");
            };
            let Some(slot) = usize::try_from(channel)
                .ok()
                .filter(|&slot| slot < self.params.len())
            else {
                return error("channel number out of range");
            };
            let Ok(kind) = kind.parse::<WaveKind>() else {
                return error(format!("channel {channel} assigned invalid type {kind}"));
            };
            let numbers: Option<Vec<f64>> = values.iter().map(|v| v.parse().ok()).collect();
            let Some([average, amplitude, period, start]) =
                numbers.and_then(|n| <[f64; 4]>::try_from(n).ok())
            else {
                return error("invalid arguments");
            };
            staged[slot] = Some(Param {
                kind,
                average,
                amplitude,
                period,
                start,
            });
        }

        for (channel, param) in (0u32..).zip(&staged) {
            if let Some(Err(err)) = param.map(|p| p.validate(channel)) {
                return error(err.to_string());
            }
        }
        for (current, param) in self.params.iter_mut().zip(staged) {
            if let Some(param) = param {
                *current = param;
            }
        }
        Response::Data(Bytes::from_static(SET_ACK.as_bytes()))
    }

    /// Serve one connection over a reader/writer pair: greeting, then
    /// requests until the client hangs up.
    ///
    /// Returns the number of requests answered after the greeting.
    pub fn serve<R: Read, W: Write>(
        &mut self,
        reader: &mut LineReader<R>,
        writer: &mut LineWriter<W>,
    ) -> Result<usize> {
        answer_greeting(reader, writer, &self.identity)?;

        let mut answered = 0usize;
        loop {
            let record = match reader.read_line() {
                Ok(record) => record,
                Err(LineError::ConnectionClosed) => return Ok(answered),
                Err(err) => return Err(err.into()),
            };
            let request = String::from_utf8_lossy(strip_terminator(&record)).into_owned();
            let response = self.handle_request(&request);
            if let Response::DeviceError(message) = &response {
                debug!(%request, %message, "request rejected");
            }
            writer.send_response(&response)?;
            answered += 1;
        }
    }

    /// Serve one connected stream.
    pub fn serve_stream(&mut self, stream: DeviceStream) -> Result<usize> {
        let peer = stream.peer_label();
        let read_half = stream.try_clone()?;
        let mut reader = LineReader::new(read_half);
        let mut writer = LineWriter::new(stream);
        debug!(%peer, "client connected");
        let answered = self.serve(&mut reader, &mut writer)?;
        debug!(%peer, answered, "client disconnected");
        Ok(answered)
    }

    /// Accept and serve clients one at a time.
    ///
    /// Stops after `max_connections` clients when set; otherwise runs until
    /// accepting fails. A client that breaks the protocol is logged and
    /// dropped.
    pub fn run(&mut self, listener: &DeviceListener, max_connections: Option<usize>) -> Result<()> {
        let mut served = 0usize;
        while max_connections.is_none_or(|max| served < max) {
            let stream = listener.accept()?;
            match self.serve_stream(stream) {
                Ok(answered) => info!(answered, "session ended"),
                Err(err @ GeneratorError::InvalidGreeting(_)) => {
                    warn!(error = %err, "rejected client");
                }
                Err(err) => warn!(error = %err, "session aborted"),
            }
            served += 1;
        }
        Ok(())
    }
}

fn error(message: impl Into<String>) -> Response {
    Response::DeviceError(message.into())
}
