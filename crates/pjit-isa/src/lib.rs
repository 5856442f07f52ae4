//! Virtual machine instruction set.
//!
//! Programs are sequences of 8-byte little-endian slots over eleven 64-bit
//! registers. This crate decodes slots into the closed [`Op`] set, carries
//! the loader-supplied [`ProgramInfo`], and splits multi-function programs
//! into subprograms.

pub mod asm;
mod insn;
mod op;
pub mod opcode;
mod program;

pub use insn::*;
pub use op::*;
pub use program::*;
