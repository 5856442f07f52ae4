//! Instruction sink shared by every emission routine.
//!
//! A [`Codegen`] either counts instructions (the sizing pass) or writes
//! them into an image. Both modes advance the same counter, so every
//! routine produces the same length regardless of mode.

use pjit_ppc::encode::{NOP, b, bc, fits_b, fits_bc, li, lis, ori};
use pjit_ppc::{Cond, Gpr};

use crate::config::EmitConfig;
use crate::context::CodegenContext;
use crate::registers::WideReg;

pub struct Codegen<'a> {
    pub(crate) ctx: &'a mut CodegenContext,
    pub(crate) config: &'a EmitConfig,
    image: Option<&'a mut [u32]>,
    overflow: bool,
}

impl<'a> Codegen<'a> {
    /// Counting-only sink for the sizing pass.
    pub fn dry(ctx: &'a mut CodegenContext, config: &'a EmitConfig) -> Self {
        Self {
            ctx,
            config,
            image: None,
            overflow: false,
        }
    }

    /// Sink writing into `image`, starting at word 0.
    pub fn new(ctx: &'a mut CodegenContext, config: &'a EmitConfig, image: &'a mut [u32]) -> Self {
        Self {
            ctx,
            config,
            image: Some(image),
            overflow: false,
        }
    }

    #[inline]
    pub const fn is_dry(&self) -> bool {
        self.image.is_none()
    }

    #[inline]
    pub fn context(&self) -> &CodegenContext {
        self.ctx
    }

    /// Whether a write fell outside the image. The words were dropped; the
    /// caller treats this as a length mismatch.
    #[inline]
    pub const fn overflowed(&self) -> bool {
        self.overflow
    }

    /// Byte offset of the next instruction.
    #[inline]
    pub const fn offset(&self) -> u32 {
        self.ctx.offset()
    }

    // ========================================================================
    // Raw emission
    // ========================================================================

    #[inline]
    pub(crate) fn emit(&mut self, word: u32) {
        if let Some(image) = self.image.as_deref_mut() {
            match image.get_mut(self.ctx.idx as usize) {
                Some(slot) => *slot = word,
                None => self.overflow = true,
            }
        }
        self.ctx.idx += 1;
    }

    /// Overwrite an already emitted instruction.
    pub(crate) fn patch(&mut self, idx: u32, word: u32) {
        if let Some(slot) = self
            .image
            .as_deref_mut()
            .and_then(|image| image.get_mut(idx as usize))
        {
            *slot = word;
        }
    }

    #[inline]
    pub(crate) fn mark(&mut self, reg: Gpr) {
        self.ctx.seen.mark(reg);
    }

    #[inline]
    pub(crate) fn mark_wide(&mut self, reg: WideReg) -> WideReg {
        self.ctx.seen.mark_wide(reg);
        reg
    }

    // ========================================================================
    // Constants
    // ========================================================================

    /// Load a 32-bit constant in as few instructions as possible.
    pub(crate) fn li32(&mut self, rd: Gpr, value: i32) {
        if let Ok(si) = i16::try_from(value) {
            self.emit(li(rd, si));
            return;
        }
        self.emit(lis(rd, (value >> 16) as i16));
        if value & 0xffff != 0 {
            self.emit(ori(rd, rd, value as u16));
        }
    }

    /// Load a 32-bit constant with exactly two instructions, so the pair
    /// can be rewritten in place later.
    pub(crate) fn li32_fixed(&mut self, rd: Gpr, value: u32) {
        self.emit(lis(rd, (value >> 16) as u16 as i16));
        self.emit(ori(rd, rd, value as u16));
    }

    // ========================================================================
    // Branches
    // ========================================================================

    #[inline]
    fn disp_to(&self, target: u32) -> i32 {
        target.wrapping_sub(self.offset()) as i32
    }

    /// Unconditional branch to a code offset. Returns `false` if the
    /// displacement does not fit; the sizing pass never fails.
    pub(crate) fn jump_to(&mut self, target: u32) -> bool {
        let disp = self.disp_to(target);
        let fits = self.is_dry() || fits_b(disp);
        self.emit(b(disp));
        fits
    }

    /// Conditional branch to a code offset. Always two instructions: a
    /// short `bc` padded with a nop, or an inverted `bc` over a long `b`.
    pub(crate) fn branch_to(&mut self, cond: Cond, target: u32) -> bool {
        let disp = self.disp_to(target);
        if fits_bc(disp) {
            self.emit(bc(cond, disp));
            self.emit(NOP);
            return true;
        }
        self.emit(bc(cond.invert(), 8));
        self.jump_to(target)
    }
}

#[cfg(test)]
mod tests {
    use pjit_isa::ProgramInfo;
    use pjit_ppc::decode::disassemble;

    use super::*;

    fn emit_with<F: FnOnce(&mut Codegen<'_>)>(f: F) -> Vec<u32> {
        let mut ctx = CodegenContext::new(ProgramInfo::new()).unwrap();
        let config = EmitConfig::default();
        let mut image = vec![0; 64];
        let mut cg = Codegen::new(&mut ctx, &config, &mut image);
        f(&mut cg);
        assert!(!cg.overflowed());
        let len = ctx.idx as usize;
        image.truncate(len);
        image
    }

    #[test]
    fn test_li32_lengths() {
        assert_eq!(emit_with(|cg| cg.li32(Gpr::R5, 7)), vec![li(Gpr::R5, 7)]);
        assert_eq!(emit_with(|cg| cg.li32(Gpr::R5, -1)), vec![li(Gpr::R5, -1)]);
        assert_eq!(emit_with(|cg| cg.li32(Gpr::R5, 0x1_0000)), vec![lis(Gpr::R5, 1)]);
        assert_eq!(
            emit_with(|cg| cg.li32(Gpr::R5, 0x1234_5678)),
            vec![lis(Gpr::R5, 0x1234), ori(Gpr::R5, Gpr::R5, 0x5678)]
        );
        assert_eq!(emit_with(|cg| cg.li32_fixed(Gpr::R0, 0)).len(), 2);
    }

    #[test]
    fn test_branch_forms() {
        let near = emit_with(|cg| assert!(cg.branch_to(Cond::EQ, 0x100)));
        assert_eq!(near, vec![bc(Cond::EQ, 0x100), NOP]);

        let far = emit_with(|cg| assert!(cg.branch_to(Cond::EQ, 0x10000)));
        assert_eq!(far, vec![bc(Cond::NE, 8), b(0x10000 - 4)]);
        let listing = disassemble(&far, 0);
        assert!(listing.contains("bne"), "{listing}");
    }

    #[test]
    fn test_dry_counts_without_writing() {
        let mut ctx = CodegenContext::new(ProgramInfo::new()).unwrap();
        let config = EmitConfig::default();
        let mut cg = Codegen::dry(&mut ctx, &config);
        cg.li32(Gpr::R3, 0x1234_5678);
        assert!(cg.branch_to(Cond::LT, 0x4000_0000));
        assert!(cg.jump_to(0x4000_0000));
        assert_eq!(cg.offset(), 20);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut ctx = CodegenContext::new(ProgramInfo::new()).unwrap();
        let config = EmitConfig::default();
        let mut image = vec![0; 1];
        let mut cg = Codegen::new(&mut ctx, &config, &mut image);
        cg.emit(NOP);
        assert!(!cg.overflowed());
        cg.emit(NOP);
        assert!(cg.overflowed());
    }
}
