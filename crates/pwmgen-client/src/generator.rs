use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::time::Duration;

use bytes::Bytes;
use pwmgen_line::{
    decode_response, LineConfig, LineError, LineReader, LineWriter, Response,
    DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_CAPACITY,
};
use pwmgen_transport::{DeviceAddress, DeviceStream, TransportError};
use tracing::{debug, trace};

use crate::error::{GeneratorError, Result};
use crate::greeting::greet;
use crate::message::{
    check_set_ack, encode_set_params, parse_frequency, parse_params, Frequency, FREQUENCY,
    GET_PARAMS,
};
use crate::param::Param;

/// Default connect timeout for [`Generator::open`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Session configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Deadline for establishing the connection. Default: 5 seconds.
    pub connect_timeout: Option<Duration>,
    /// Deadline for each response. Default: none (block until the device
    /// answers or the connection drops).
    pub read_timeout: Option<Duration>,
    /// Deadline for each request write. Default: none.
    pub write_timeout: Option<Duration>,
    /// Initial receive buffer size. Default: 1 KiB.
    pub initial_buffer: usize,
    /// Longest accepted response line. Default: 64 KiB.
    pub max_buffer: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: None,
            write_timeout: None,
            initial_buffer: DEFAULT_INITIAL_CAPACITY,
            max_buffer: DEFAULT_MAX_CAPACITY,
        }
    }
}

impl GeneratorConfig {
    fn line_config(&self) -> LineConfig {
        LineConfig {
            initial_capacity: self.initial_buffer,
            max_capacity: self.max_buffer,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        }
    }
}

/// Observable state of a [`Generator`] session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection. `open` is the only useful call.
    Idle,
    /// Greeting done; requests may be issued.
    Connected,
    /// A fatal error occurred. Requests fail until the session is closed.
    Failed,
}

struct Connection {
    reader: LineReader<DeviceStream>,
    writer: LineWriter<DeviceStream>,
}

impl Connection {
    fn new(stream: DeviceStream, config: LineConfig) -> Result<Self> {
        let read_half = stream.try_clone()?;
        Ok(Self {
            reader: LineReader::with_config_device(read_half, config.clone())?,
            writer: LineWriter::with_config_device(stream, config)?,
        })
    }

    fn round_trip(&mut self, request: &str) -> pwmgen_line::Result<Response> {
        self.writer.send_request(request)?;
        let record = self.reader.read_line()?;
        decode_response(&record)
    }

    fn shutdown(self) -> std::result::Result<(), TransportError> {
        self.writer.get_ref().shutdown()
    }
}

enum Session {
    Idle,
    Connected(Connection),
    Failed {
        conn: Option<Connection>,
        reason: String,
    },
}

/// Client session with one PWM generator.
///
/// One exchange at a time: every request blocks until its response line
/// has been read. After a fatal error the session refuses further
/// requests without touching the connection until [`Generator::close`]
/// is called; it can then be reopened.
///
/// ```no_run
/// use pwmgen_client::Generator;
///
/// let mut generator = Generator::new();
/// let id = generator.open("192.168.1.50:1234")?;
/// println!("connected to {id}");
/// let freq = generator.get_frequency()?;
/// println!("{} Hz (std dev {})", freq.mean, freq.std_dev);
/// generator.close()?;
/// # Ok::<(), pwmgen_client::GeneratorError>(())
/// ```
pub struct Generator {
    config: GeneratorConfig,
    session: Session,
    device_id: Option<String>,
    channel_count: Option<usize>,
}

impl Generator {
    /// Create an idle session with default configuration.
    pub fn new() -> Self {
        Self::with_config(GeneratorConfig::default())
    }

    /// Create an idle session with explicit configuration.
    pub fn with_config(config: GeneratorConfig) -> Self {
        Self {
            config,
            session: Session::Idle,
            device_id: None,
            channel_count: None,
        }
    }

    /// Connect to `address` and perform the greeting.
    ///
    /// `address` is `host:port`, a bare host (port 1234) or
    /// `unix:<path>`. An open or failed session is closed first. Returns
    /// the device identification.
    pub fn open(&mut self, address: &str) -> Result<String> {
        self.reset_for_open();
        let stream = address
            .parse::<DeviceAddress>()
            .and_then(|address| {
                debug!(%address, "connecting");
                address.connect(self.config.connect_timeout)
            });
        match stream {
            Ok(stream) => self.start(stream),
            Err(err) => Err(self.fail(None, err.into())),
        }
    }

    /// Perform the greeting over an already connected stream.
    pub fn open_stream(&mut self, stream: DeviceStream) -> Result<String> {
        self.reset_for_open();
        self.start(stream)
    }

    fn start(&mut self, stream: DeviceStream) -> Result<String> {
        let peer = stream.peer_label();
        let mut conn = match Connection::new(stream, self.config.line_config()) {
            Ok(conn) => conn,
            Err(err) => return Err(self.fail(None, err)),
        };

        match greet(&mut conn.reader, &mut conn.writer) {
            Ok(id) => {
                debug!(%peer, device = %id, "session connected");
                self.session = Session::Connected(conn);
                self.device_id = Some(id.clone());
                Ok(id)
            }
            Err(err) => Err(self.fail(Some(conn), err)),
        }
    }

    fn reset_for_open(&mut self) {
        if matches!(self.session, Session::Idle) {
            return;
        }
        if let Err(err) = self.close() {
            debug!(error = %err, "ignoring close failure before reopening");
        }
    }

    /// Release the connection and return to the idle state.
    ///
    /// The session is reset even when releasing the transport fails; that
    /// failure is reported as a non-fatal [`GeneratorError::Close`]. The
    /// last known channel count is kept.
    pub fn close(&mut self) -> Result<()> {
        let conn = match mem::replace(&mut self.session, Session::Idle) {
            Session::Idle => None,
            Session::Connected(conn) => Some(conn),
            Session::Failed { conn, .. } => conn,
        };
        self.device_id = None;

        match conn {
            Some(conn) => {
                debug!("closing session");
                conn.shutdown().map_err(GeneratorError::Close)
            }
            None => Ok(()),
        }
    }

    /// Read the parameters of every channel, in the order the device lists them.
    ///
    /// Also records the channel count reported by the device.
    pub fn get_parameters(&mut self) -> Result<Vec<Param>> {
        let payload = self.exchange(GET_PARAMS)?;
        let params = parse_params(&payload)?;
        self.channel_count = Some(params.len());
        Ok(params)
    }

    /// Set the parameters of the channels in `params`.
    ///
    /// The channel configuration is read first so the channel count is
    /// current. Channels are sent in ascending index order. The device
    /// applies all of them or none.
    pub fn set_parameters(&mut self, params: &BTreeMap<u32, Param>) -> Result<()> {
        self.get_parameters()?;
        let payload = self.exchange(&encode_set_params(params))?;
        check_set_ack(&payload)?;
        Ok(())
    }

    /// Sample the pulse generation frequency.
    pub fn get_frequency(&mut self) -> Result<Frequency> {
        let payload = self.exchange(FREQUENCY)?;
        Ok(parse_frequency(&payload)?)
    }

    fn exchange(&mut self, request: &str) -> Result<Bytes> {
        let conn = match &mut self.session {
            Session::Connected(conn) => conn,
            Session::Idle => return Err(GeneratorError::NotConnected),
            Session::Failed { reason, .. } => {
                return Err(GeneratorError::SessionFailed(reason.clone()))
            }
        };

        trace!(request, "exchange");
        match conn.round_trip(request) {
            Ok(Response::Data(payload)) => Ok(payload),
            Ok(Response::DeviceError(message)) => {
                debug!(request, %message, "device rejected request");
                Err(GeneratorError::Device(message))
            }
            Err(err) => Err(self.latch(err)),
        }
    }

    fn latch(&mut self, err: LineError) -> GeneratorError {
        let err = GeneratorError::from(err);
        if !err.is_fatal() {
            return err;
        }
        match mem::replace(&mut self.session, Session::Idle) {
            Session::Connected(conn) => self.fail(Some(conn), err),
            other => {
                self.session = other;
                err
            }
        }
    }

    fn fail(&mut self, conn: Option<Connection>, err: GeneratorError) -> GeneratorError {
        debug!(error = %err, "session failed");
        self.session = Session::Failed {
            conn,
            reason: err.to_string(),
        };
        err
    }

    /// Whether the session holds a fatal failure and must be closed.
    pub fn is_fatal(&self) -> bool {
        matches!(self.session, Session::Failed { .. })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        match self.session {
            Session::Idle => SessionState::Idle,
            Session::Connected(_) => SessionState::Connected,
            Session::Failed { .. } => SessionState::Failed,
        }
    }

    /// Description of the fatal error held by a failed session.
    pub fn failure(&self) -> Option<&str> {
        match &self.session {
            Session::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Identification returned by the last successful greeting.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Channel count from the last successful parameter read.
    pub fn channel_count(&self) -> Option<usize> {
        self.channel_count
    }

    /// Session configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("state", &self.state())
            .field("device_id", &self.device_id)
            .field("channel_count", &self.channel_count)
            .field("failure", &self.failure())
            .finish()
    }
}
