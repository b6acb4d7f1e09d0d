//! Wire protocol definitions for the on-chip debugger.
//!
//! Every request starts with a three byte ASCII opcode, optionally followed by
//! big-endian 32-bit arguments. Every response starts with a two byte status
//! marker, `OK` on success.

use std::fmt;

use super::error::DebugError;

/// Three byte ASCII command identifier.
pub type Opcode = [u8; 3];

pub const OP_STATE: Opcode = *b"+ST";
pub const OP_PC: Opcode = *b"+PC";
pub const OP_HALT: Opcode = *b"+HL";
pub const OP_RESUME: Opcode = *b"+RE";
pub const OP_MEMORY_READ: Opcode = *b"+MR";
pub const OP_MEMORY_WRITE: Opcode = *b"+MW";
pub const OP_BREAKPOINT_SET: Opcode = *b"+BS";
pub const OP_BREAKPOINT_CLEAR: Opcode = *b"+BC";
pub const OP_STEP: Opcode = *b"+SS";

/// Status marker prefixed to every accepted response.
pub const STATUS_OK: &[u8; 2] = b"OK";
pub const STATUS_LEN: usize = STATUS_OK.len();

/// Size of a memory word, the only unit of memory transfer.
pub const WORD_SIZE: u32 = 4;

/// Run state of the target CPU, as last reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    #[default]
    Disconnected,
    Running,
    Halted,
}

impl DeviceState {
    /// Decodes the single state byte of a `+ST` response.
    pub fn from_wire(byte: u8) -> Result<Self, DebugError> {
        match byte {
            b'H' => Ok(DeviceState::Halted),
            b'R' => Ok(DeviceState::Running),
            other => Err(DebugError::Decode(format!(
                "unknown state code {:#04x}",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceState::Disconnected => "DISCONNECTED",
            DeviceState::Running => "RUNNING",
            DeviceState::Halted => "HALTED",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decodes a big-endian word from a response payload.
pub fn decode_word(payload: &[u8]) -> Result<u32, DebugError> {
    let bytes: [u8; 4] = payload.try_into().map_err(|_| {
        DebugError::Decode(format!("expected 4 byte word, got {} bytes", payload.len()))
    })?;
    Ok(u32::from_be_bytes(bytes))
}

/// Encodes a sequence of words as a big-endian request payload.
pub fn encode_words(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}
