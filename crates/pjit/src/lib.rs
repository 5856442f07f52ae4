//! JIT compiler from the VM instruction set to 32-bit PowerPC.
//!
//! [`Jit`] drives the passes of [`pjit_emit`] over a program and places the
//! result in memory from an [`ImageAllocator`]. Programs that call their
//! own subprograms go through [`Jit::compile_unit`], which compiles every
//! subprogram first and patches the calls afterwards. [`Runner`] executes
//! images on the reference interpreter from [`pjit_ppc::sim`].
//!
//! ```ignore
//! let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
//! let jit = Jit::new(&alloc);
//! let mut runner = Runner::new();
//! let helpers = runner.bind_builtins();
//! let unit = jit.compile_unit(&program, &helpers)?;
//! runner.load_unit(&unit)?;
//! let r0 = runner.call(unit.entry(), 0)?;
//! ```

mod alloc;
mod error;
mod helpers;
mod image;
mod jit;
pub mod metrics;
pub mod runner;
mod unit;

pub use alloc::{BumpAllocator, IMAGE_ALIGN, ImageAllocator};
pub use error::{Error, Result};
pub use helpers::{HELPER_SLOT, HelperTable};
pub use image::{DESCRIPTOR_WORDS, GeneratedImage};
pub use jit::{CODEGEN_PASSES, Compiled, CompiledProgram, Jit, Phase, Snapshot};
pub use runner::{CODE_BASE, CODE_SIZE, Runner};
pub use unit::CompiledUnit;

pub use pjit_emit::{EmitConfig, MAX_TAIL_CALL_CNT, TailCallLayout, TranslateError};
pub use pjit_isa::{Program, ProgramInfo};
