//! Core module - session with the on-chip debugger
//!
//! This module contains the wire protocol, the transport seam and the typed
//! memory and run-control operations built on top of one round-trip primitive.

pub mod control;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

// Re-export common types
pub use error::DebugError;
pub use protocol::{DeviceState, Opcode};
pub use session::{Session, CONNECT_ATTEMPTS};
pub use transport::{Connector, SerialConfig, SerialConnector, Transport};
