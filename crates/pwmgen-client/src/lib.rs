//! Client sessions for remote PWM signal generators.
//!
//! A [`Generator`] owns one connection, performs the `PWM0`/`HELO`
//! greeting and then runs one request/response exchange at a time:
//! read or write the per-channel waveform [`Param`]s, or sample the
//! pulse [`Frequency`].
//!
//! Errors are split into fatal and recoverable ones
//! ([`GeneratorError::is_fatal`]). A fatal error latches the session
//! until it is closed.

pub mod connector;
pub mod error;
pub mod generator;
pub mod greeting;
pub mod message;
pub mod param;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use connector::{connect, connect_with_config};
pub use error::{GeneratorError, PayloadError, Result};
pub use generator::{Generator, GeneratorConfig, SessionState, DEFAULT_CONNECT_TIMEOUT};
pub use greeting::{answer_greeting, greet};
pub use message::{DeviceIdentity, Frequency};
pub use param::{Param, WaveKind};
#[cfg(any(test, feature = "sim"))]
pub use sim::SimulatedDevice;
