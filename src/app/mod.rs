//! App module - command table, guard chain and dispatcher
//!
//! Everything between a raw input line and the session operations.

mod commands;
mod dispatch;
pub mod guard;

pub use commands::*;
pub use dispatch::*;
