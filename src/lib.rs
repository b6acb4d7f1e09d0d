//! rvdbg - interactive client for a minimal RISC-V on-chip debugger
//!
//! The debugger firmware speaks a tiny request/response protocol over a serial
//! link: three byte opcodes, big-endian words and an `OK` status prefix on
//! every accepted command. This crate provides the session layer for that
//! protocol, the guarded command shell on top of it and a small RV32IM
//! disassembler for the assembly views.

pub mod app;
pub mod core;
pub mod disasm;
pub mod ui;
