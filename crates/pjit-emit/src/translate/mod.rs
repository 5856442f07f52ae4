//! VM instruction selection.
//!
//! [`Codegen::build_body`] walks the program once per pass, recording each
//! instruction's code offset in the [`AddressTable`] and emitting its
//! PowerPC sequence. Every sequence has a length that depends only on the
//! instruction and on what the context has already seen, never on branch
//! distances, so the sizing pass and the real passes agree.

mod alu;
mod call;
mod jump;
mod mem;

use pjit_isa::{Op, Program, Reg, Width};
use pjit_ppc::Gpr;
use pjit_ppc::encode::li;
use tracing::trace;

use crate::address::AddressTable;
use crate::emitter::Codegen;
use crate::error::{Result, TranslateError};
use crate::registers::{WideReg, wide};
use crate::resolve::{CallResolver, ResolvePhase};

impl Codegen<'_> {
    /// Translate every instruction of `program`.
    ///
    /// Fails on the first instruction that cannot be translated; whatever
    /// was written to the image up to that point is garbage.
    pub fn build_body(
        &mut self,
        program: &Program,
        addrs: &mut AddressTable,
        resolver: &dyn CallResolver,
        phase: ResolvePhase,
    ) -> Result<()> {
        let mut t = Translator {
            cg: self,
            program,
            addrs,
            resolver,
            phase,
            index: 0,
            code: 0,
        };
        t.run()
    }
}

/// State for one body pass.
pub(crate) struct Translator<'t, 'a> {
    cg: &'t mut Codegen<'a>,
    program: &'t Program,
    addrs: &'t mut AddressTable,
    resolver: &'t dyn CallResolver,
    phase: ResolvePhase,
    /// Instruction being translated.
    index: usize,
    code: u8,
}

impl Translator<'_, '_> {
    fn run(&mut self) -> Result<()> {
        let len = self.program.len();
        let mut index = 0;
        while index < len {
            self.index = index;
            self.code = self.program.insns()[index].code;
            self.addrs.set(index, self.cg.offset());

            let op = self
                .program
                .decode(index)
                .map_err(|err| self.unsupported(err.to_string()))?;
            self.translate(op)?;

            if op.slots() == 2 {
                // The second slot of a wide load has no code of its own.
                self.addrs.set(index + 1, self.cg.offset());
            }
            index += op.slots();
        }
        self.addrs.set(len, self.cg.offset());
        trace!(words = self.cg.ctx.idx, "body done");
        Ok(())
    }

    fn translate(&mut self, op: Op) -> Result<()> {
        match op {
            Op::Alu {
                width: Width::W32,
                op,
                dst,
                src,
                off,
            } => self.alu32(op, dst, src, off),
            Op::Alu {
                width: Width::W64,
                op,
                dst,
                src,
                off,
            } => self.alu64(op, dst, src, off),
            Op::End {
                width: Width::W32,
                order,
                dst,
                bits,
            } => self.byte_swap(order, dst, bits),
            Op::End {
                width: Width::W64, ..
            } => Err(self.unsupported("unconditional byte swap")),
            Op::LoadImm64 { dst, imm } => {
                self.load_imm64(dst, imm);
                Ok(())
            }
            Op::Load {
                size,
                dst,
                base,
                off,
            } => {
                self.load(size, dst, base, off);
                Ok(())
            }
            Op::Store {
                size,
                base,
                off,
                src,
            } => {
                self.store(size, base, off, src);
                Ok(())
            }
            Op::Atomic {
                size,
                base,
                off,
                src,
                op,
            } => self.atomic(size, base, off, src, op),
            Op::Ja { off } => self.ja(off),
            Op::Jump {
                width,
                cond,
                dst,
                src,
                off,
            } => self.jump(width, cond, dst, src, off),
            Op::Call(target) => self.call(target),
            Op::TailCall => {
                self.cg.emit_tail_call();
                Ok(())
            }
            Op::Exit => self.exit(),
            Op::Other { .. } => Err(self.unsupported("unknown opcode")),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    #[inline]
    fn emit(&mut self, word: u32) {
        self.cg.emit(word);
    }

    #[inline]
    fn li32(&mut self, rd: Gpr, value: i32) {
        self.cg.li32(rd, value);
    }

    /// Host pair of a VM register, recording it as used.
    #[inline]
    fn reg(&mut self, reg: Reg) -> WideReg {
        self.cg.mark_wide(wide(reg))
    }

    /// Clear the high word after a 32-bit result, unless the verifier has
    /// already inserted explicit zero-extensions.
    fn zext(&mut self, dst: WideReg) {
        if !self.cg.ctx.info.verifier_zext {
            self.emit(li(dst.hi, 0));
        }
    }

    fn unsupported(&self, reason: impl Into<String>) -> TranslateError {
        TranslateError::Unsupported {
            index: self.index,
            code: self.code,
            reason: reason.into(),
        }
    }

    fn invalid_immediate(&self) -> TranslateError {
        TranslateError::InvalidImmediate {
            index: self.index,
            code: self.code,
        }
    }

    /// Raw immediate of the current instruction.
    fn raw_imm(&self) -> i32 {
        self.program.insns()[self.index].imm
    }
}
