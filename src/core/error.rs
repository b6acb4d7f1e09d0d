//! Error taxonomy for the debugger session layer.

use std::io;
use thiserror::Error;

use super::protocol::Opcode;

/// Debugger-specific errors
#[derive(Error, Debug)]
pub enum DebugError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("On-chip debugger rejected command \"{}\"", String::from_utf8_lossy(.opcode))]
    RejectedCommand { opcode: Opcode },

    #[error("Invalid debugger state: {0}")]
    State(String),

    #[error("Invalid memory address: {0}")]
    Address(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DebugError {
    /// The opcode a rejected command carried, if this is a rejection.
    pub fn rejected_opcode(&self) -> Option<Opcode> {
        match self {
            DebugError::RejectedCommand { opcode } => Some(*opcode),
            _ => None,
        }
    }
}
