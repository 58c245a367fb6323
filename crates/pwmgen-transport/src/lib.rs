//! Byte-stream transport for PWM generator connections.
//!
//! Provides a unified stream over:
//! - TCP (the generator firmware's only transport)
//! - Unix domain sockets (local simulators and tests)
//!
//! This is the lowest layer of pwmgen. Everything else builds on top of
//! the [`DeviceStream`] type provided here.

pub mod address;
pub mod error;
pub mod listener;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use address::{DeviceAddress, DEFAULT_PORT};
pub use error::{Result, TransportError};
pub use listener::DeviceListener;
pub use traits::DeviceStream;

#[cfg(unix)]
pub use uds::UnixSocketListener;
