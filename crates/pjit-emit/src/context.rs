//! Per-compilation state carried across passes.

use pjit_isa::ProgramInfo;
use pjit_ppc::Gpr;

use crate::error::Result;
use crate::layout::StackLayout;
use crate::registers::{NVR_MIN, WideReg};

/// Host registers and features the body touched.
///
/// Filled in by the sizing pass and only ever grown afterwards, so the
/// prologue emitted in later passes saves at least what the body uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Seen {
    regs: u32,
    flags: u8,
}

impl Seen {
    const FUNC: u8 = 1 << 0;
    const TAIL_CALL: u8 = 1 << 1;

    #[inline]
    pub fn mark(&mut self, reg: Gpr) {
        self.regs |= 1 << reg.num();
    }

    #[inline]
    pub fn mark_wide(&mut self, reg: WideReg) {
        self.mark(reg.hi);
        self.mark(reg.lo);
    }

    #[inline]
    pub const fn is_marked(&self, reg: Gpr) -> bool {
        self.regs & (1 << reg.num()) != 0
    }

    /// The body calls out, so LR must be saved.
    #[inline]
    pub fn set_func(&mut self) {
        self.flags |= Self::FUNC;
    }

    #[inline]
    pub const fn has_func(&self) -> bool {
        self.flags & Self::FUNC != 0
    }

    #[inline]
    pub fn set_tail_call(&mut self) {
        self.flags |= Self::TAIL_CALL;
    }

    #[inline]
    pub const fn has_tail_call(&self) -> bool {
        self.flags & Self::TAIL_CALL != 0
    }

    /// Lowest callee-saved register in use; the prologue saves from here
    /// through r31. A single `stmw` covers the whole range, so unused
    /// registers above this one are saved too.
    pub fn lowest_nvr(&self) -> Option<Gpr> {
        (NVR_MIN.num()..32)
            .map(|n| Gpr::from_field(u32::from(n)))
            .find(|&r| self.is_marked(r))
    }
}

/// State shared by the passes of one compilation.
#[derive(Clone, Debug)]
pub struct CodegenContext {
    pub info: ProgramInfo,
    pub layout: StackLayout,
    pub seen: Seen,
    /// Instructions emitted so far in the current pass.
    pub idx: u32,
    /// A subprogram call was emitted with a placeholder address.
    pub pending_calls: bool,
}

impl CodegenContext {
    pub fn new(info: ProgramInfo) -> Result<Self> {
        Ok(Self {
            layout: StackLayout::new(info.stack_depth)?,
            info,
            seen: Seen::default(),
            idx: 0,
            pending_calls: false,
        })
    }

    /// Byte offset of the next instruction.
    #[inline]
    pub const fn offset(&self) -> u32 {
        self.idx * 4
    }

    /// Rewind for another pass, keeping what earlier passes learned.
    pub fn restart(&mut self) {
        self.idx = 0;
        self.pending_calls = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowest_nvr() {
        let mut seen = Seen::default();
        assert_eq!(seen.lowest_nvr(), None);
        seen.mark(Gpr::R3);
        assert_eq!(seen.lowest_nvr(), None);
        seen.mark(Gpr::R31);
        seen.mark(Gpr::R28);
        assert_eq!(seen.lowest_nvr(), Some(Gpr::R28));
        seen.mark(Gpr::R19);
        assert_eq!(seen.lowest_nvr(), Some(Gpr::R19));
    }

    #[test]
    fn test_flags() {
        let mut seen = Seen::default();
        assert!(!seen.has_func());
        seen.set_tail_call();
        assert!(seen.has_tail_call());
        assert!(!seen.has_func());
        seen.set_func();
        assert!(seen.has_func());
    }

    #[test]
    fn test_restart_keeps_seen() {
        let mut ctx = CodegenContext::new(ProgramInfo::new()).unwrap();
        ctx.seen.mark(Gpr::R31);
        ctx.idx = 12;
        ctx.pending_calls = true;
        ctx.restart();
        assert_eq!(ctx.idx, 0);
        assert!(!ctx.pending_calls);
        assert!(ctx.seen.is_marked(Gpr::R31));
    }
}
