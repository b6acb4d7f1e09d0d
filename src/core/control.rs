//! Run control - state queries, halt/resume, stepping and the breakpoint
//!
//! Transitions of the cached device state happen here, and only after the
//! device acknowledged the command.

use super::error::DebugError;
use super::protocol::{
    decode_word, encode_words, DeviceState, OP_BREAKPOINT_CLEAR, OP_BREAKPOINT_SET, OP_HALT,
    OP_PC, OP_RESUME, OP_STEP, STATUS_LEN,
};
use super::session::Session;

impl Session {
    /// Current program counter. Allowed while running.
    pub fn retrieve_pc(&mut self) -> Result<u32, DebugError> {
        let response = self.send_command(OP_PC, &[], STATUS_LEN + 4)?;
        decode_word(&response)
    }

    pub fn halt(&mut self) -> Result<(), DebugError> {
        self.send_command(OP_HALT, &[], STATUS_LEN)?;
        self.set_state(DeviceState::Halted);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), DebugError> {
        self.send_command(OP_RESUME, &[], STATUS_LEN)?;
        self.set_state(DeviceState::Running);
        Ok(())
    }

    /// Executes a single instruction. Only meaningful while halted.
    pub fn step(&mut self) -> Result<(), DebugError> {
        self.send_command(OP_STEP, &[], STATUS_LEN)?;
        Ok(())
    }

    /// Arms the hardware breakpoint, replacing any previous one.
    pub fn set_breakpoint(&mut self, address: u32) -> Result<(), DebugError> {
        self.send_command(OP_BREAKPOINT_SET, &encode_words(&[address]), STATUS_LEN)?;
        self.set_breakpoint_address(Some(address));
        log::info!("Breakpoint armed at {:#010x}", address);
        Ok(())
    }

    pub fn clear_breakpoint(&mut self) -> Result<(), DebugError> {
        self.send_command(OP_BREAKPOINT_CLEAR, &[], STATUS_LEN)?;
        self.set_breakpoint_address(None);
        log::info!("Breakpoint cleared");
        Ok(())
    }

    /// Polls the device state and updates the cached one.
    ///
    /// The device never announces an autonomous halt (breakpoint hit), so this
    /// is the only way to notice one.
    pub fn refresh_state(&mut self) -> Result<DeviceState, DebugError> {
        if !self.is_connected() {
            return Err(DebugError::State("Debugger is disconnected".into()));
        }
        let state = self.query_state()?;
        self.set_state(state);
        Ok(state)
    }
}
