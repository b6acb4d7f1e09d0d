//! UI module - Command Line Interface
//!
//! Provides the reedline-based interactive shell.

pub mod cli;
