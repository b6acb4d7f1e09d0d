//! Guard chain - preconditions checked before a command handler runs
//!
//! Guards never raise. A failing guard yields the message to show the user
//! and the command is dropped before any I/O happens.

use crate::core::DeviceState;

pub const DISCONNECTED: &str = "Debugger is disconnected";

/// A precondition on the cached device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Fails unless the device is in the given state.
    Require(DeviceState, &'static str),
    /// Fails if the device is in the given state.
    Exclude(DeviceState, &'static str),
}

impl Guard {
    pub fn check(&self, state: DeviceState) -> Result<(), &'static str> {
        match *self {
            Guard::Require(required, message) if state != required => Err(message),
            Guard::Exclude(excluded, message) if state == excluded => Err(message),
            _ => Ok(()),
        }
    }
}

/// Runs `guards` in order and stops at the first failure.
pub fn evaluate(guards: &[Guard], state: DeviceState) -> Result<(), &'static str> {
    guards.iter().try_for_each(|guard| guard.check(state))
}

/// Checks the argument count, returning the usage text on mismatch.
pub fn check_arity(args: &[&str], expected: usize, usage: &str) -> Result<(), String> {
    if args.len() == expected {
        return Ok(());
    }

    if expected == 0 {
        Err(format!("Command '{}' expects no arguments", usage))
    } else {
        Err(format!(
            "Command expected exactly {} argument{}\n{}",
            expected,
            if expected > 1 { "s" } else { "" },
            usage
        ))
    }
}
