//! Arithmetic, logic, shifts, and byte swaps.
//!
//! 64-bit operations work on register pairs: carries flow from the low
//! word through XER[CA], and shifts move bits across the pair with
//! rotate-and-insert.

use pjit_isa::{AluOp, ByteOrder, Operand, Reg};
use pjit_ppc::Gpr;
use pjit_ppc::encode::{
    add, addc, adde, addi, addis, addme, addze, and, andi_dot, andis_dot, divwu, li, mr, mulhwu,
    mulli, mullw, neg, nor, or, ori, oris, rlwimi, rlwinm, slw, slwi, sraw, srawi, srw, srwi,
    subf, subfc, subfe, subfic, subfze, xor, xori, xoris,
};

use super::Translator;
use crate::error::Result;
use crate::registers::{TMP, WideReg};

const R0: Gpr = Gpr::R0;

impl Translator<'_, '_> {
    pub(super) fn alu32(&mut self, op: AluOp, dst: Reg, src: Operand, off: i16) -> Result<()> {
        if off != 0 && matches!(op, AluOp::Div | AluOp::Mod | AluOp::Mov) {
            return Err(self.unsupported("signed division or sign-extending move"));
        }
        let d = self.reg(dst);
        let dl = d.lo;
        let src = self.operand(src);

        match (op, src) {
            (AluOp::Add, Src::Reg(s)) => self.emit(add(dl, dl, s.lo)),
            (AluOp::Add, Src::Imm(k)) => self.add_imm32(dl, k),
            (AluOp::Sub, Src::Reg(s)) => self.emit(subf(dl, s.lo, dl)),
            (AluOp::Sub, Src::Imm(k)) => self.add_imm32(dl, k.wrapping_neg()),
            (AluOp::Mul, Src::Reg(s)) => self.emit(mullw(dl, dl, s.lo)),
            (AluOp::Mul, Src::Imm(k)) => match i16::try_from(k) {
                Ok(si) => self.emit(mulli(dl, dl, si)),
                Err(_) => {
                    self.li32(R0, k);
                    self.emit(mullw(dl, dl, R0));
                }
            },
            (AluOp::Div | AluOp::Mod, Src::Reg(_)) => {
                return Err(self.unsupported("division by register"));
            }
            (AluOp::Div | AluOp::Mod, Src::Imm(0)) => return Err(self.invalid_immediate()),
            (AluOp::Div, Src::Imm(1)) => {}
            (AluOp::Mod, Src::Imm(1)) => self.emit(li(dl, 0)),
            (AluOp::Div, Src::Imm(k)) => {
                self.li32(R0, k);
                self.emit(divwu(dl, dl, R0));
            }
            (AluOp::Mod, Src::Imm(k)) => {
                self.cg.mark(TMP);
                self.li32(TMP, k);
                self.emit(divwu(R0, dl, TMP));
                self.emit(mullw(R0, TMP, R0));
                self.emit(subf(dl, R0, dl));
            }
            (AluOp::And, Src::Reg(s)) => self.emit(and(dl, dl, s.lo)),
            (AluOp::And, Src::Imm(k)) => self.and_imm32(dl, k),
            (AluOp::Or, Src::Reg(s)) => self.emit(or(dl, dl, s.lo)),
            (AluOp::Or, Src::Imm(k)) => self.or_imm32(dl, k),
            (AluOp::Xor, Src::Reg(s)) => self.emit(xor(dl, dl, s.lo)),
            (AluOp::Xor, Src::Imm(k)) => self.xor_imm32(dl, k),
            (AluOp::Lsh, Src::Reg(s)) => self.emit(slw(dl, dl, s.lo)),
            (AluOp::Rsh, Src::Reg(s)) => self.emit(srw(dl, dl, s.lo)),
            (AluOp::Arsh, Src::Reg(s)) => self.emit(sraw(dl, dl, s.lo)),
            (AluOp::Lsh | AluOp::Rsh | AluOp::Arsh, Src::Imm(k)) => {
                let Ok(n @ 0..32) = u32::try_from(k) else {
                    return Err(self.unsupported("shift amount out of range"));
                };
                if n != 0 {
                    self.emit(match op {
                        AluOp::Lsh => slwi(dl, dl, n),
                        AluOp::Rsh => srwi(dl, dl, n),
                        _ => srawi(dl, dl, n),
                    });
                }
            }
            (AluOp::Neg, _) => self.emit(neg(dl, dl)),
            (AluOp::Mov, Src::Reg(s)) => {
                if self.raw_imm() == 1 {
                    // Explicit zero-extension inserted by the verifier.
                    self.emit(li(d.hi, 0));
                    return Ok(());
                }
                if s != d {
                    self.emit(mr(dl, s.lo));
                }
            }
            (AluOp::Mov, Src::Imm(k)) => self.li32(dl, k),
        }
        self.zext(d);
        Ok(())
    }

    pub(super) fn alu64(&mut self, op: AluOp, dst: Reg, src: Operand, off: i16) -> Result<()> {
        if off != 0 && matches!(op, AluOp::Div | AluOp::Mod | AluOp::Mov) {
            return Err(self.unsupported("signed division or sign-extending move"));
        }
        let d = self.reg(dst);
        let src = self.operand(src);

        match (op, src) {
            (AluOp::Add, Src::Reg(s)) => {
                self.emit(addc(d.lo, d.lo, s.lo));
                self.emit(adde(d.hi, d.hi, s.hi));
            }
            (AluOp::Add, Src::Imm(k)) => self.add_imm64(d, i64::from(k)),
            (AluOp::Sub, Src::Reg(s)) => {
                self.emit(subfc(d.lo, s.lo, d.lo));
                self.emit(subfe(d.hi, s.hi, d.hi));
            }
            (AluOp::Sub, Src::Imm(k)) => self.add_imm64(d, -i64::from(k)),
            (AluOp::Mul, Src::Reg(s)) => {
                self.cg.mark(TMP);
                self.emit(mullw(R0, d.lo, s.hi));
                self.emit(mullw(d.hi, d.hi, s.lo));
                self.emit(mulhwu(TMP, d.lo, s.lo));
                self.emit(mullw(d.lo, d.lo, s.lo));
                self.emit(add(d.hi, d.hi, R0));
                self.emit(add(d.hi, d.hi, TMP));
            }
            (AluOp::Mul, Src::Imm(k)) => {
                // The sign-extended high word of k is 0 or -1, so its
                // cross product is 0 or -lo.
                self.cg.mark(TMP);
                self.li32(R0, k);
                self.emit(mulhwu(TMP, d.lo, R0));
                self.emit(mullw(d.hi, d.hi, R0));
                if k < 0 {
                    self.emit(subf(d.hi, d.lo, d.hi));
                }
                self.emit(mullw(d.lo, d.lo, R0));
                self.emit(add(d.hi, d.hi, TMP));
            }
            (AluOp::Div | AluOp::Mod, Src::Reg(_)) => {
                return Err(self.unsupported("division by register"));
            }
            (AluOp::Div | AluOp::Mod, Src::Imm(0)) => return Err(self.invalid_immediate()),
            (AluOp::Div, Src::Imm(1)) => {}
            (AluOp::Mod, Src::Imm(1)) => {
                self.emit(li(d.lo, 0));
                self.emit(li(d.hi, 0));
            }
            (AluOp::Div | AluOp::Mod, Src::Imm(_)) => {
                return Err(self.unsupported("64-bit division"));
            }
            (AluOp::And, Src::Reg(s)) => {
                self.emit(and(d.lo, d.lo, s.lo));
                self.emit(and(d.hi, d.hi, s.hi));
            }
            (AluOp::And, Src::Imm(k)) => {
                self.and_imm32(d.lo, k);
                if k >= 0 {
                    self.emit(li(d.hi, 0));
                }
            }
            (AluOp::Or, Src::Reg(s)) => {
                self.emit(or(d.lo, d.lo, s.lo));
                self.emit(or(d.hi, d.hi, s.hi));
            }
            (AluOp::Or, Src::Imm(k)) => {
                self.or_imm32(d.lo, k);
                if k < 0 {
                    self.emit(li(d.hi, -1));
                }
            }
            (AluOp::Xor, Src::Reg(s)) => {
                self.emit(xor(d.lo, d.lo, s.lo));
                self.emit(xor(d.hi, d.hi, s.hi));
            }
            (AluOp::Xor, Src::Imm(k)) => {
                self.xor_imm32(d.lo, k);
                if k < 0 {
                    self.emit(nor(d.hi, d.hi, d.hi));
                }
            }
            (AluOp::Lsh | AluOp::Rsh | AluOp::Arsh, Src::Reg(_)) => {
                return Err(self.unsupported("64-bit shift by register"));
            }
            (AluOp::Lsh, Src::Imm(k)) => self.shl64(d, k)?,
            (AluOp::Rsh, Src::Imm(k)) => self.shr64(d, k)?,
            (AluOp::Arsh, Src::Imm(0)) => {}
            (AluOp::Arsh, Src::Imm(_)) => {
                return Err(self.unsupported("64-bit arithmetic shift"));
            }
            (AluOp::Neg, _) => {
                self.emit(subfic(d.lo, d.lo, 0));
                self.emit(subfze(d.hi, d.hi));
            }
            (AluOp::Mov, Src::Reg(s)) => {
                if s != d {
                    self.emit(mr(d.lo, s.lo));
                    self.emit(mr(d.hi, s.hi));
                }
            }
            (AluOp::Mov, Src::Imm(k)) => {
                self.li32(d.lo, k);
                self.emit(li(d.hi, if k < 0 { -1 } else { 0 }));
            }
        }
        Ok(())
    }

    /// Byte-order conversion of the low `bits` of a register.
    pub(super) fn byte_swap(&mut self, order: ByteOrder, dst: Reg, bits: i32) -> Result<()> {
        let d = self.reg(dst);
        match (order, bits) {
            (ByteOrder::Le, 16) => {
                self.emit(rlwinm(R0, d.lo, 8, 16, 23));
                self.emit(rlwimi(R0, d.lo, 24, 24, 31));
                self.emit(mr(d.lo, R0));
                self.zext(d);
            }
            (ByteOrder::Le, 32) => {
                self.swap_word(R0, d.lo);
                self.emit(mr(d.lo, R0));
                self.zext(d);
            }
            (ByteOrder::Le, 64) => {
                self.cg.mark(TMP);
                self.swap_word(R0, d.lo);
                self.swap_word(TMP, d.hi);
                self.emit(mr(d.hi, R0));
                self.emit(mr(d.lo, TMP));
            }
            // Already big-endian: only truncate.
            (ByteOrder::Be, 16) => {
                self.emit(rlwinm(d.lo, d.lo, 0, 16, 31));
                self.zext(d);
            }
            (ByteOrder::Be, 32) => self.zext(d),
            (ByteOrder::Be, 64) => {}
            _ => return Err(self.unsupported("byte swap width")),
        }
        Ok(())
    }

    fn swap_word(&mut self, rd: Gpr, rs: Gpr) {
        self.emit(rlwinm(rd, rs, 8, 0, 31));
        self.emit(rlwimi(rd, rs, 24, 0, 7));
        self.emit(rlwimi(rd, rs, 24, 16, 23));
    }

    // ========================================================================
    // Immediate forms
    // ========================================================================

    fn add_imm32(&mut self, r: Gpr, k: i32) {
        let lo = k as i16;
        let ha = (k.wrapping_sub(i32::from(lo)) >> 16) as i16;
        if ha != 0 {
            self.emit(addis(r, r, ha));
        }
        if lo != 0 {
            self.emit(addi(r, r, lo));
        }
    }

    fn add_imm64(&mut self, d: WideReg, value: i64) {
        if value == 0 {
            return;
        }
        self.li32(R0, value as i32);
        self.emit(addc(d.lo, d.lo, R0));
        match (value >> 32) as i32 {
            0 => self.emit(addze(d.hi, d.hi)),
            -1 => self.emit(addme(d.hi, d.hi)),
            hi => {
                self.li32(R0, hi);
                self.emit(adde(d.hi, d.hi, R0));
            }
        }
    }

    fn and_imm32(&mut self, r: Gpr, k: i32) {
        if (0..=0xffff).contains(&k) {
            self.emit(andi_dot(r, r, k as u16));
        } else if k & 0xffff == 0 {
            self.emit(andis_dot(r, r, (k >> 16) as u16));
        } else {
            self.li32(R0, k);
            self.emit(and(r, r, R0));
        }
    }

    fn or_imm32(&mut self, r: Gpr, k: i32) {
        if k & 0xffff != 0 {
            self.emit(ori(r, r, k as u16));
        }
        if k >> 16 != 0 {
            self.emit(oris(r, r, (k >> 16) as u16));
        }
    }

    fn xor_imm32(&mut self, r: Gpr, k: i32) {
        if k & 0xffff != 0 {
            self.emit(xori(r, r, k as u16));
        }
        if k >> 16 != 0 {
            self.emit(xoris(r, r, (k >> 16) as u16));
        }
    }

    fn shl64(&mut self, d: WideReg, k: i32) -> Result<()> {
        match k {
            0 => {}
            1..=31 => {
                let n = k as u32;
                self.emit(slwi(d.hi, d.hi, n));
                self.emit(rlwimi(d.hi, d.lo, n, 32 - n, 31));
                self.emit(slwi(d.lo, d.lo, n));
            }
            32 => {
                self.emit(mr(d.hi, d.lo));
                self.emit(li(d.lo, 0));
            }
            33..=63 => {
                self.emit(slwi(d.hi, d.lo, k as u32 - 32));
                self.emit(li(d.lo, 0));
            }
            _ => return Err(self.unsupported("shift amount out of range")),
        }
        Ok(())
    }

    fn shr64(&mut self, d: WideReg, k: i32) -> Result<()> {
        match k {
            0 => {}
            1..=31 => {
                let n = k as u32;
                self.emit(srwi(d.lo, d.lo, n));
                self.emit(rlwimi(d.lo, d.hi, 32 - n, 0, n - 1));
                self.emit(srwi(d.hi, d.hi, n));
            }
            32 => {
                self.emit(mr(d.lo, d.hi));
                self.emit(li(d.hi, 0));
            }
            33..=63 => {
                self.emit(srwi(d.lo, d.hi, k as u32 - 32));
                self.emit(li(d.hi, 0));
            }
            _ => return Err(self.unsupported("shift amount out of range")),
        }
        Ok(())
    }

    /// Resolve a register operand to its pair, marking it used.
    pub(super) fn operand(&mut self, src: Operand) -> Src {
        match src {
            Operand::Reg(r) => Src::Reg(self.reg(r)),
            Operand::Imm(k) => Src::Imm(k),
        }
    }
}

/// Second operand after register mapping.
#[derive(Clone, Copy, Debug)]
pub(super) enum Src {
    Reg(WideReg),
    Imm(i32),
}
