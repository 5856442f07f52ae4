//! Code generation from VM programs to 32-bit PowerPC.
//!
//! A compilation drives one [`Codegen`] per pass over a shared
//! [`CodegenContext`]:
//!
//! 1. A dry body pass learns which registers and features are used.
//! 2. Dry prologue and epilogue passes complete the size.
//! 3. Real passes write prologue, body, and epilogue into the image.
//!
//! [`fixup_calls`] patches subprogram call targets after the fact.

mod address;
mod config;
mod context;
mod emitter;
mod error;
mod fixup;
mod layout;
mod prologue;
pub mod registers;
mod resolve;
mod tail_call;
mod translate;

pub use address::AddressTable;
pub use config::{EmitConfig, MAX_TAIL_CALL_CNT, TailCallLayout};
pub use context::{CodegenContext, Seen};
pub use emitter::Codegen;
pub use error::{Result, TranslateError};
pub use fixup::fixup_calls;
pub use layout::{StackLayout, TAIL_CALL_CNT_ENTRY};
pub use prologue::TAIL_CALL_ENTRY;
pub use resolve::{CallKind, CallResolver, CallSite, NoCalls, ResolvePhase, Resolution};
