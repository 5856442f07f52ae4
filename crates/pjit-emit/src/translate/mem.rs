//! Loads, stores, wide immediates, and atomics.
//!
//! Doublewords are stored big-endian: high word at the lower address.

use pjit_isa::opcode::atomic;
use pjit_isa::{Operand, Reg, Size};
use pjit_ppc::encode::{add, addi, bc, lbz, lhz, li, lwarx, lwz, stb, sth, stw, stwcx_dot};
use pjit_ppc::{Cond, Gpr};

use super::Translator;
use super::alu::Src;
use crate::error::Result;
use crate::registers::TMP;

const R0: Gpr = Gpr::R0;

impl Translator<'_, '_> {
    pub(super) fn load_imm64(&mut self, dst: Reg, imm: u64) {
        let d = self.reg(dst);
        self.li32(d.lo, imm as u32 as i32);
        self.li32(d.hi, (imm >> 32) as u32 as i32);
    }

    pub(super) fn load(&mut self, size: Size, dst: Reg, base: Reg, off: i16) {
        let base = self.reg(base).lo;
        let d = self.reg(dst);
        match size {
            Size::B => self.emit(lbz(d.lo, off, base)),
            Size::H => self.emit(lhz(d.lo, off, base)),
            Size::W => self.emit(lwz(d.lo, off, base)),
            Size::DW => {
                let (base, off) = self.dw_base(base, off);
                // High word first: `base` may be the low half of `dst`.
                self.emit(lwz(d.hi, off, base));
                self.emit(lwz(d.lo, off + 4, base));
                return;
            }
        }
        self.zext(d);
    }

    pub(super) fn store(&mut self, size: Size, base: Reg, off: i16, src: Operand) {
        let base = self.reg(base).lo;
        match (size, self.operand(src)) {
            (Size::B, Src::Reg(s)) => self.emit(stb(s.lo, off, base)),
            (Size::H, Src::Reg(s)) => self.emit(sth(s.lo, off, base)),
            (Size::W, Src::Reg(s)) => self.emit(stw(s.lo, off, base)),
            (Size::DW, Src::Reg(s)) => {
                let (base, off) = self.dw_base(base, off);
                self.emit(stw(s.hi, off, base));
                self.emit(stw(s.lo, off + 4, base));
            }
            (Size::DW, Src::Imm(k)) => {
                let (base, off) = self.dw_base(base, off);
                self.li32(R0, k);
                self.emit(stw(R0, off + 4, base));
                self.emit(li(R0, if k < 0 { -1 } else { 0 }));
                self.emit(stw(R0, off, base));
            }
            (size, Src::Imm(k)) => {
                self.li32(R0, k);
                self.emit(match size {
                    Size::B => stb(R0, off, base),
                    Size::H => sth(R0, off, base),
                    _ => stw(R0, off, base),
                });
            }
        }
    }

    /// Base and offset for a doubleword access. When `off + 4` would not
    /// fit the displacement field, the address goes through TMP.
    fn dw_base(&mut self, base: Gpr, off: i16) -> (Gpr, i16) {
        if off.checked_add(4).is_some() {
            return (base, off);
        }
        self.cg.mark(TMP);
        self.emit(addi(TMP, base, off));
        (TMP, 0)
    }

    pub(super) fn atomic(&mut self, size: Size, base: Reg, off: i16, src: Reg, op: i32) -> Result<()> {
        match size {
            Size::W => {}
            Size::DW => return Err(self.unsupported("64-bit atomic")),
            Size::B | Size::H => return Err(self.unsupported("sub-word atomic")),
        }
        if op != atomic::ADD {
            return Err(self.unsupported("atomic operation"));
        }
        let base = self.reg(base).lo;
        let s = self.reg(src);
        self.cg.mark(TMP);
        self.emit(li(TMP, off));
        self.emit(lwarx(R0, TMP, base));
        self.emit(add(R0, R0, s.lo));
        self.emit(stwcx_dot(R0, TMP, base));
        // Lost the reservation: retry from the load.
        self.emit(bc(Cond::NE, -12));
        Ok(())
    }
}
