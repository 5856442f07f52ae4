//! 32-bit big-endian PowerPC support for the JIT.
//!
//! - [`encode`]: one function per instruction form, returning the word.
//! - [`decode`]: the inverse, plus a disassembler for listings.
//! - [`sim`]: an interpreter for the same subset, used to execute
//!   generated code in tests and from the CLI.

pub mod decode;
pub mod encode;
mod reg;
pub mod sim;

pub use reg::*;
