//! Memory - word and block access through the on-chip debugger
//!
//! The debugger can reach any memory-mapped location, not only RAM. It only
//! ever transfers full, word-aligned 32-bit words.

use super::error::DebugError;
use super::protocol::{
    decode_word, encode_words, OP_MEMORY_READ, OP_MEMORY_WRITE, STATUS_LEN, WORD_SIZE,
};
use super::session::Session;

fn check_aligned(address: u32, what: &str) -> Result<(), DebugError> {
    if address % WORD_SIZE != 0 {
        return Err(DebugError::Address(format!(
            "{} address {:#010x} needs to be aligned on 4 byte boundary",
            what, address
        )));
    }
    Ok(())
}

impl Session {
    /// Reads the word at `address`.
    pub fn read_word(&mut self, address: u32) -> Result<u32, DebugError> {
        check_aligned(address, "Memory read")?;

        let payload = encode_words(&[address]);
        let response = self.send_command(OP_MEMORY_READ, &payload, STATUS_LEN + 4)?;
        let value = decode_word(&response)?;

        log::debug!("read  [{:#010x}] = {:#010x}", address, value);
        Ok(value)
    }

    /// Writes `value` to the word at `address`.
    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), DebugError> {
        check_aligned(address, "Memory write")?;

        let payload = encode_words(&[address, value]);
        self.send_command(OP_MEMORY_WRITE, &payload, STATUS_LEN)?;

        log::debug!("write [{:#010x}] = {:#010x}", address, value);
        Ok(())
    }

    /// Reads `length` bytes starting at `start` as a list of words.
    ///
    /// The protocol has no block transfer, so this is one round trip per word,
    /// in ascending address order.
    pub fn read_block(&mut self, start: u32, length: u32) -> Result<Vec<u32>, DebugError> {
        if length == 0 {
            return Err(DebugError::Address(
                "Memory block read length can't be zero".into(),
            ));
        }
        check_aligned(start, "Memory block read start")?;
        if length % WORD_SIZE != 0 {
            return Err(DebugError::Address(format!(
                "Memory block read length {} not multiple of 4 bytes",
                length
            )));
        }

        (0..length / WORD_SIZE)
            .map(|index| {
                let address = start.checked_add(index * WORD_SIZE).ok_or_else(|| {
                    DebugError::Address(format!(
                        "Memory block {:#010x}+{} wraps past the end of the address space",
                        start, length
                    ))
                })?;
                self.read_word(address)
            })
            .collect()
    }
}
