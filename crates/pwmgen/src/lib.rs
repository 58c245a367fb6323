//! Client for remote PWM signal generators.
//!
//! The generator speaks a line-oriented text protocol over TCP: a `PWM0`
//! greeting, then `GPRM` / `SPRM` / `FREQ` exchanges answered with `>`
//! (data) or `!` (device error) lines.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix socket streams, device addresses
//! - [`line`]: line assembly and response classification
//! - [`client`]: sessions, channel parameters, frequency sampling, and the
//!   simulated device (behind the `sim` feature)

/// Re-export transport types.
pub mod transport {
    pub use pwmgen_transport::*;
}

/// Re-export line framing types.
pub mod line {
    pub use pwmgen_line::*;
}

/// Re-export client types.
pub mod client {
    pub use pwmgen_client::*;
}

pub use pwmgen_client::{
    connect, Frequency, Generator, GeneratorConfig, GeneratorError, Param, SessionState, WaveKind,
};
