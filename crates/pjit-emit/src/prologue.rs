//! Function entry and exit sequences.
//!
//! Entry layout, in words:
//!
//! ```text
//! 0  li r0, 0 / nop          tail-call counter init
//! 1  stw r0, -72(r1) / nop
//! 2  mr r4, r3 / nop         context pointer into R1
//! 3  li r3, 0 / nop
//! 4  ...                     tail-call entry point
//! ```
//!
//! The first four words are always present so that a tail call can enter
//! any program at [`TAIL_CALL_ENTRY`] bytes and keep its counter and R1.

use pjit_isa::Reg;
use pjit_ppc::encode::{BLR, NOP, addi, li, lmw, lwz, mflr, mr, mtlr, stmw, stw, stwu};
use pjit_ppc::Gpr;

use crate::emitter::Codegen;
use crate::layout::{LR_SAVE, TAIL_CALL_CNT_ENTRY};
use crate::registers::{reserved, wide};

/// Byte offset tail calls branch to, past counter and context setup.
pub const TAIL_CALL_ENTRY: u32 = 16;

impl Codegen<'_> {
    /// Emit the entry sequence. Must run after a body pass so the set of
    /// used registers is known.
    pub fn build_prologue(&mut self) {
        let seen = self.ctx.seen;
        let layout = self.ctx.layout;
        let sp = reserved::SP;
        let start = self.offset();

        if seen.has_tail_call() {
            self.emit(li(Gpr::R0, 0));
            self.emit(stw(Gpr::R0, TAIL_CALL_CNT_ENTRY, sp));
        } else {
            self.emit(NOP);
            self.emit(NOP);
        }

        // Subprograms get R1 from their caller; the entry program gets the
        // 32-bit context pointer in r3.
        let r1 = wide(Reg::R1);
        if self.ctx.info.subprog {
            self.emit(NOP);
            self.emit(NOP);
        } else {
            self.emit(mr(r1.lo, r1.hi));
            self.emit(li(r1.hi, 0));
        }
        debug_assert_eq!(self.offset() - start, TAIL_CALL_ENTRY);

        if seen.has_func() {
            self.emit(mflr(Gpr::R0));
            self.emit(stw(Gpr::R0, LR_SAVE, sp));
        }

        self.emit(stwu(sp, -(layout.frame_size() as i16), sp));

        if let Some(first) = seen.lowest_nvr() {
            self.emit(stmw(first, layout.nvr_offset(first), sp));
        }

        let fp = wide(Reg::Fp);
        if seen.is_marked(fp.lo) {
            self.emit(addi(fp.lo, sp, layout.fp_offset()));
            self.emit(li(fp.hi, 0));
        }
    }

    /// Emit the exit sequence: move R0 into the return pair, tear down the
    /// frame, return.
    pub fn build_epilogue(&mut self) {
        let r0 = wide(Reg::R0);
        self.emit(mr(reserved::RET_HI, r0.hi));
        self.emit(mr(reserved::RET_LO, r0.lo));
        self.build_common_epilogue();
        self.emit(BLR);
    }

    /// Frame teardown shared by the epilogue and the tail-call sequence.
    pub(crate) fn build_common_epilogue(&mut self) {
        let seen = self.ctx.seen;
        let layout = self.ctx.layout;
        let sp = reserved::SP;

        if let Some(first) = seen.lowest_nvr() {
            self.emit(lmw(first, layout.nvr_offset(first), sp));
        }
        self.emit(addi(sp, sp, layout.frame_size() as i16));
        if seen.has_func() {
            self.emit(lwz(Gpr::R0, LR_SAVE, sp));
            self.emit(mtlr(Gpr::R0));
        }
    }
}
