//! Disasm module - assembly listings of target memory
//!
//! The decoder itself lives in [`engine`]; this module only lays out its
//! output, one word per line, marking the line the program counter points at.

pub mod engine;

pub use engine::{Decoder, Rv32Decoder};

use crate::core::protocol::WORD_SIZE;

/// Number of words shown around the program counter by the location view.
pub const LOCATION_WINDOW: u32 = 5;

/// Formats `instructions`, read from `start_address` on, as an assembly listing.
///
/// The line whose address equals `current_pc` gets a `->` marker.
pub fn format_assembly(
    start_address: u32,
    current_pc: Option<u32>,
    instructions: &[u32],
    decoder: &dyn Decoder,
) -> String {
    let mut result = String::new();

    for (index, &word) in instructions.iter().enumerate() {
        let address = start_address.wrapping_add(index as u32 * WORD_SIZE);
        let prefix = if current_pc == Some(address) { "-> " } else { "   " };
        result.push_str(&format!(
            "{}{:08x}:  {:08x}  {}\n",
            prefix,
            address,
            word,
            decoder.decode(word, address)
        ));
    }

    result
}

/// First address of the location window around `pc`.
///
/// Two words before the PC are shown, fewer when the PC is close to zero.
pub fn location_start(pc: u32) -> u32 {
    pc.saturating_sub(2 * WORD_SIZE)
}
