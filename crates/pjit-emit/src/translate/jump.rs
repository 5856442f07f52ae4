//! Branches and comparisons.
//!
//! All comparisons leave their result in cr0. A 64-bit comparison first
//! compares the high words and only looks at the low words, unsigned, when
//! those are equal.

use pjit_isa::{JmpCond, Operand, Reg, Width};
use pjit_ppc::encode::{and_dot, andi_dot, bc, cmplw, cmplwi, cmpw, cmpwi, li};
use pjit_ppc::{Cond, Gpr};

use super::Translator;
use super::alu::Src;
use crate::error::Result;
use crate::registers::WideReg;

const R0: Gpr = Gpr::R0;

/// cr0 condition a VM predicate branches on. `Set` tests the result of a
/// recording AND against zero.
const fn branch_cond(cond: JmpCond) -> Cond {
    match cond {
        JmpCond::Eq => Cond::EQ,
        JmpCond::Ne | JmpCond::Set => Cond::NE,
        JmpCond::Gt | JmpCond::Sgt => Cond::GT,
        JmpCond::Ge | JmpCond::Sge => Cond::GE,
        JmpCond::Lt | JmpCond::Slt => Cond::LT,
        JmpCond::Le | JmpCond::Sle => Cond::LE,
    }
}

impl Translator<'_, '_> {
    fn target(&self, off: i16) -> Result<u32> {
        self.addrs
            .target(self.index, off)
            .ok_or_else(|| self.unsupported("branch target outside the program"))
    }

    pub(super) fn ja(&mut self, off: i16) -> Result<()> {
        let target = self.target(off)?;
        if self.cg.jump_to(target) {
            Ok(())
        } else {
            Err(self.unsupported("branch out of range"))
        }
    }

    pub(super) fn exit(&mut self) -> Result<()> {
        // The last instruction falls into the epilogue.
        if self.index + 1 == self.program.len() {
            return Ok(());
        }
        let target = self.addrs.exit();
        if self.cg.jump_to(target) {
            Ok(())
        } else {
            Err(self.unsupported("branch out of range"))
        }
    }

    pub(super) fn jump(
        &mut self,
        width: Width,
        cond: JmpCond,
        dst: Reg,
        src: Operand,
        off: i16,
    ) -> Result<()> {
        let target = self.target(off)?;
        let d = self.reg(dst);
        let src = self.operand(src);
        match width {
            Width::W32 => self.compare32(cond, d.lo, src),
            Width::W64 => self.compare64(cond, d, src),
        }
        if self.cg.branch_to(branch_cond(cond), target) {
            Ok(())
        } else {
            Err(self.unsupported("branch out of range"))
        }
    }

    fn compare32(&mut self, cond: JmpCond, d: Gpr, src: Src) {
        match src {
            Src::Reg(s) => self.emit(if cond == JmpCond::Set {
                and_dot(R0, d, s.lo)
            } else if cond.is_signed() {
                cmpw(d, s.lo)
            } else {
                cmplw(d, s.lo)
            }),
            Src::Imm(k) if cond == JmpCond::Set => self.test_imm32(d, k),
            Src::Imm(k) if cond.is_signed() => match i16::try_from(k) {
                Ok(si) => self.emit(cmpwi(d, si)),
                Err(_) => {
                    self.li32(R0, k);
                    self.emit(cmpw(d, R0));
                }
            },
            Src::Imm(k) => self.cmp_unsigned_imm(d, k),
        }
    }

    fn compare64(&mut self, cond: JmpCond, d: WideReg, src: Src) {
        // `bne .+8` skips the low-word compare when the high words decide.
        let skip = bc(Cond::NE, 8);
        match src {
            Src::Reg(s) if cond == JmpCond::Set => {
                self.emit(and_dot(R0, d.hi, s.hi));
                self.emit(skip);
                self.emit(and_dot(R0, d.lo, s.lo));
            }
            Src::Reg(s) => {
                self.emit(if cond.is_signed() {
                    cmpw(d.hi, s.hi)
                } else {
                    cmplw(d.hi, s.hi)
                });
                self.emit(skip);
                self.emit(cmplw(d.lo, s.lo));
            }
            Src::Imm(k) if cond == JmpCond::Set => {
                if k < 0 {
                    // The sign-extended high word is all ones, so any set
                    // bit in d.hi matches.
                    self.li32(R0, k);
                    self.emit(cmpwi(d.hi, 0));
                    self.emit(skip);
                    self.emit(and_dot(R0, d.lo, R0));
                } else {
                    self.test_imm32(d.lo, k);
                }
            }
            Src::Imm(k) if (0..=0xffff).contains(&k) => {
                self.emit(if cond.is_signed() {
                    cmpwi(d.hi, 0)
                } else {
                    cmplwi(d.hi, 0)
                });
                self.emit(skip);
                self.emit(cmplwi(d.lo, k as u16));
            }
            Src::Imm(k) => {
                let sign: i16 = if k < 0 { -1 } else { 0 };
                if cond.is_signed() {
                    self.emit(cmpwi(d.hi, sign));
                } else {
                    self.emit(li(R0, sign));
                    self.emit(cmplw(d.hi, R0));
                }
                self.li32(R0, k);
                self.emit(skip);
                self.emit(cmplw(d.lo, R0));
            }
        }
    }

    fn test_imm32(&mut self, d: Gpr, k: i32) {
        if (0..=0xffff).contains(&k) {
            self.emit(andi_dot(R0, d, k as u16));
        } else {
            self.li32(R0, k);
            self.emit(and_dot(R0, d, R0));
        }
    }

    fn cmp_unsigned_imm(&mut self, d: Gpr, k: i32) {
        if (0..=0xffff).contains(&k) {
            self.emit(cmplwi(d, k as u16));
        } else {
            self.li32(R0, k);
            self.emit(cmplw(d, R0));
        }
    }
}
