//! Pass driver.
//!
//! A compilation walks [`Phase`]s in order:
//!
//! ```text
//! Sizing -> Allocated -> Codegen(1) -> Codegen(2) -> Done
//!                                          \
//!                                           -> (pending) Resumed -> FixupOnly -> Done
//! ```
//!
//! Sizing runs the body dry to learn register usage and length, twice when
//! the program chains to others so the tail-call path restores every
//! register the rest of the body uses. The real passes must reproduce the
//! sized length exactly; the second pass only settles forward branch
//! targets. A program whose subprogram calls could not be resolved yet is
//! returned as a [`Snapshot`] and finished later with [`Jit::resume`].

use std::fmt;

use pjit_emit::{
    AddressTable, CallResolver, Codegen, CodegenContext, EmitConfig, ResolvePhase, fixup_calls,
};
use pjit_isa::Program;
use tracing::{debug, info_span, warn};

use crate::alloc::ImageAllocator;
use crate::error::{Error, Result};
use crate::image::{DESCRIPTOR_WORDS, GeneratedImage};
use crate::metrics;

/// Real code generation passes per compilation.
pub const CODEGEN_PASSES: u8 = 2;

/// Where a compilation is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Sizing,
    Allocated,
    Codegen(u8),
    Done,
    Resumed,
    FixupOnly,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sizing => f.write_str("sizing"),
            Self::Allocated => f.write_str("allocated"),
            Self::Codegen(pass) => write!(f, "codegen[{pass}]"),
            Self::Done => f.write_str("done"),
            Self::Resumed => f.write_str("resumed"),
            Self::FixupOnly => f.write_str("fixup-only"),
        }
    }
}

/// A finished, executable program.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    image: GeneratedImage,
    addrs: AddressTable,
    insns: u32,
}

impl CompiledProgram {
    #[inline]
    pub const fn image(&self) -> &GeneratedImage {
        &self.image
    }

    /// Code offset of every VM instruction.
    #[inline]
    pub const fn addrs(&self) -> &AddressTable {
        &self.addrs
    }

    /// Native instruction count, header excluded.
    #[inline]
    pub const fn insns(&self) -> u32 {
        self.insns
    }

    #[inline]
    pub const fn entry(&self) -> u32 {
        self.image.entry()
    }

    pub fn into_image(self) -> GeneratedImage {
        self.image
    }
}

/// Compilation suspended after codegen because some subprogram call
/// targets were not known yet.
///
/// The image is already allocated at its final address and every
/// instruction is in place except the placeholder call targets.
#[derive(Clone, Debug)]
pub struct Snapshot {
    program: Program,
    ctx: CodegenContext,
    addrs: AddressTable,
    image: GeneratedImage,
}

impl Snapshot {
    #[inline]
    pub const fn program(&self) -> &Program {
        &self.program
    }

    #[inline]
    pub const fn image(&self) -> &GeneratedImage {
        &self.image
    }

    /// Entry address; already final, so siblings can call it.
    #[inline]
    pub const fn entry(&self) -> u32 {
        self.image.entry()
    }
}

/// Outcome of a first-phase compilation.
#[derive(Clone, Debug)]
pub enum Compiled {
    Done(CompiledProgram),
    Pending(Snapshot),
}

impl Compiled {
    pub const fn entry(&self) -> u32 {
        match self {
            Self::Done(program) => program.entry(),
            Self::Pending(snapshot) => snapshot.entry(),
        }
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Compiles VM programs into images obtained from an [`ImageAllocator`].
pub struct Jit<A> {
    config: EmitConfig,
    allocator: A,
}

impl<A: ImageAllocator> Jit<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            config: EmitConfig::default(),
            allocator,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EmitConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EmitConfig {
        &self.config
    }

    pub const fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Compile a program whose calls all resolve now.
    ///
    /// # Errors
    ///
    /// Returns the first translation failure, or an allocation or pass
    /// length failure. The program is left to the interpreter.
    pub fn compile(&self, program: &Program, resolver: &dyn CallResolver) -> Result<CompiledProgram> {
        match self.compile_phase(program, resolver, ResolvePhase::Final)? {
            Compiled::Done(compiled) => Ok(compiled),
            // Final resolution rejects deferral during translation.
            Compiled::Pending(_) => Err(Error::ResolutionFailed {
                id: 0,
                reason: "call target deferred after final resolution".to_owned(),
            }),
        }
    }

    /// First-phase compilation of a unit member. Subprogram calls the
    /// resolver defers leave the result [`Compiled::Pending`].
    ///
    /// # Errors
    ///
    /// See [`Jit::compile`].
    pub fn compile_initial(&self, program: &Program, resolver: &dyn CallResolver) -> Result<Compiled> {
        self.compile_phase(program, resolver, ResolvePhase::Initial)
    }

    /// Native instruction count the program compiles to, without
    /// allocating anything.
    ///
    /// # Errors
    ///
    /// Returns translation failures.
    pub fn size(&self, program: &Program, resolver: &dyn CallResolver) -> Result<u32> {
        let mut ctx = CodegenContext::new(*program.info())?;
        let mut addrs = AddressTable::new(program.len());
        self.size_passes(&mut ctx, program, &mut addrs, resolver, ResolvePhase::Initial)
    }

    /// Patch the placeholder call targets of a suspended compilation and
    /// finish it.
    ///
    /// # Errors
    ///
    /// Fails when the resolver still has no address for a callee.
    pub fn resume(&self, snapshot: Snapshot, resolver: &dyn CallResolver) -> Result<CompiledProgram> {
        let Snapshot {
            program,
            ctx,
            addrs,
            mut image,
        } = snapshot;
        let _span = info_span!(
            "resume",
            insns = program.len(),
            subprog = program.info().subprog
        )
        .entered();
        debug!(phase = %Phase::Resumed, entry = image.entry(), "resuming");

        let patched = fixup_calls(image.code_mut(), &program, &addrs, resolver)
            .map_err(Error::from)
            .inspect_err(report_failure)?;
        debug!(phase = %Phase::FixupOnly, patched, "call targets patched");
        metrics::record_fixups(patched);

        Ok(self.finish(image, addrs, ctx.idx))
    }

    fn compile_phase(
        &self,
        program: &Program,
        resolver: &dyn CallResolver,
        phase: ResolvePhase,
    ) -> Result<Compiled> {
        let _span = info_span!(
            "compile",
            insns = program.len(),
            subprog = program.info().subprog
        )
        .entered();
        self.generate(program, resolver, phase)
            .inspect_err(report_failure)
    }

    fn generate(
        &self,
        program: &Program,
        resolver: &dyn CallResolver,
        phase: ResolvePhase,
    ) -> Result<Compiled> {
        let mut ctx = CodegenContext::new(*program.info())?;
        let mut addrs = AddressTable::new(program.len());

        let total = self.size_passes(&mut ctx, program, &mut addrs, resolver, phase)?;

        let header = self.config.function_descriptors;
        let words = total as usize + if header { DESCRIPTOR_WORDS } else { 0 };
        let bytes = (words * 4) as u32;
        let base = self
            .allocator
            .allocate(bytes)
            .ok_or(Error::AllocationFailed { bytes })?;
        let mut image = GeneratedImage::new(base, total as usize, header);
        debug!(phase = %Phase::Allocated, base, bytes, "image allocated");

        for pass in 1..=CODEGEN_PASSES {
            ctx.restart();
            let mut cg = Codegen::new(&mut ctx, &self.config, image.code_mut());
            cg.build_prologue();
            cg.build_body(program, &mut addrs, resolver, phase)?;
            cg.build_epilogue();
            let overflowed = cg.overflowed();
            if overflowed || ctx.idx != total {
                return Err(Error::LengthMismatch {
                    expected: total,
                    actual: ctx.idx,
                });
            }
            debug!(phase = %Phase::Codegen(pass), insns = ctx.idx, "pass complete");
        }

        if ctx.pending_calls {
            debug!(entry = image.entry(), "subprogram calls deferred");
            return Ok(Compiled::Pending(Snapshot {
                program: program.clone(),
                ctx,
                addrs,
                image,
            }));
        }
        Ok(Compiled::Done(self.finish(image, addrs, total)))
    }

    /// Dry passes. Returns the full native instruction count.
    fn size_passes(
        &self,
        ctx: &mut CodegenContext,
        program: &Program,
        addrs: &mut AddressTable,
        resolver: &dyn CallResolver,
        phase: ResolvePhase,
    ) -> Result<u32> {
        Codegen::dry(ctx, &self.config).build_body(program, addrs, resolver, phase)?;
        if ctx.seen.has_tail_call() {
            ctx.restart();
            Codegen::dry(ctx, &self.config).build_body(program, addrs, resolver, phase)?;
        }
        let body = ctx.idx;
        let mut cg = Codegen::dry(ctx, &self.config);
        cg.build_prologue();
        cg.build_epilogue();
        debug!(phase = %Phase::Sizing, body, insns = ctx.idx, "sized");
        Ok(ctx.idx)
    }

    fn finish(&self, image: GeneratedImage, addrs: AddressTable, insns: u32) -> CompiledProgram {
        self.allocator.flush_icache(image.base(), image.len_bytes());
        metrics::record_compiled(image.len_bytes());
        debug!(
            phase = %Phase::Done,
            entry = image.entry(),
            bytes = image.len_bytes(),
            "compiled"
        );
        CompiledProgram {
            image,
            addrs,
            insns,
        }
    }
}

fn report_failure(err: &Error) {
    warn!(kind = err.kind(), error = %err, "compilation failed, leaving program to the interpreter");
    metrics::record_failed(err.kind());
}

#[cfg(test)]
mod tests {
    use pjit_emit::NoCalls;
    use pjit_isa::asm::*;
    use pjit_isa::opcode::alu;
    use pjit_isa::{ProgramInfo, Reg};

    use super::*;
    use crate::alloc::BumpAllocator;

    fn program() -> Program {
        Program::new(
            vec![mov64_imm(Reg::R0, 5), alu64_imm(alu::ADD, Reg::R0, 7), exit()],
            ProgramInfo::new(),
        )
    }

    #[test]
    fn test_compile_allocates_and_flushes() {
        let alloc = BumpAllocator::new(0x1_0000, 0x1000);
        let jit = Jit::new(&alloc);
        let compiled = jit.compile(&program(), &NoCalls).unwrap();
        let image = compiled.image();
        assert_eq!(image.base(), 0x1_0000);
        assert_eq!(image.len_bytes(), compiled.insns() * 4);
        assert_eq!(alloc.flushes(), vec![(0x1_0000, image.len_bytes())]);
    }

    #[test]
    fn test_allocation_failure() {
        let alloc = BumpAllocator::new(0x1_0000, 16);
        let jit = Jit::new(&alloc);
        let err = jit.compile(&program(), &NoCalls).unwrap_err();
        assert!(matches!(err, Error::AllocationFailed { .. }));
        assert_eq!(err.kind(), "allocation_failed");
        assert!(alloc.flushes().is_empty());
    }

    #[test]
    fn test_translation_failure_allocates_nothing() {
        let alloc = BumpAllocator::new(0x1_0000, 0x1000);
        let jit = Jit::new(&alloc);
        let bad = Program::new(
            vec![alu64_imm(alu::DIV, Reg::R0, 0), exit()],
            ProgramInfo::new(),
        );
        let err = jit.compile(&bad, &NoCalls).unwrap_err();
        assert_eq!(err.kind(), "invalid_immediate");
        assert_eq!(alloc.used(), 0);
    }

    #[test]
    fn test_size_matches_codegen() {
        let alloc = BumpAllocator::new(0x1_0000, 0x1000);
        let jit = Jit::new(&alloc);
        let sized = jit.size(&program(), &NoCalls).unwrap();
        let compiled = jit.compile(&program(), &NoCalls).unwrap();
        assert_eq!(sized, compiled.insns());
    }

    #[test]
    fn test_sizing_with_tail_call_body() {
        // A tail call forces a second sizing pass before the entry sequence.
        let [lo, hi] = ld_imm64(Reg::R2, 0x3000_0000);
        let chained = Program::new(
            vec![lo, hi, mov64_imm(Reg::R3, 0), tail_call(), mov64_imm(Reg::R0, 1), exit()],
            ProgramInfo::new(),
        );
        let alloc = BumpAllocator::new(0x1_0000, 0x1000);
        let jit = Jit::new(&alloc);
        let sized = jit.size(&chained, &NoCalls).unwrap();
        let compiled = jit.compile(&chained, &NoCalls).unwrap();
        assert_eq!(sized, compiled.insns());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Codegen(2).to_string(), "codegen[2]");
        assert_eq!(Phase::FixupOnly.to_string(), "fixup-only");
    }
}
