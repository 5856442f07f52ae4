//! Single-instruction execution.

use super::{Cpu, Machine, Result, SimError};
use crate::decode::{ArithOp, ImmOp, Insn, LogicOp, MemOp, decode};
use crate::reg::{CrBit, Gpr, Spr};

/// `a + b + carry_in` with carry out of bit 31.
#[inline]
const fn add_carry(a: u32, b: u32, carry_in: bool) -> (u32, bool) {
    let sum = a as u64 + b as u64 + carry_in as u64;
    (sum as u32, sum > u32::MAX as u64)
}

/// Mask with bits `mb..=me` set, counting from the most significant bit,
/// wrapping when `mb > me`.
#[inline]
const fn rotate_mask(mb: u32, me: u32) -> u32 {
    let from_mb = u32::MAX >> mb;
    let to_me = u32::MAX << (31 - me);
    if mb <= me { from_mb & to_me } else { from_mb | to_me }
}

/// Algebraic right shift with the carry rule of `sraw`/`srawi`.
#[inline]
const fn shift_right_algebraic(value: u32, n: u32) -> (u32, bool) {
    let negative = (value as i32) < 0;
    if n > 31 {
        return (if negative { u32::MAX } else { 0 }, negative);
    }
    let lost = if n == 0 { 0 } else { value & ((1 << n) - 1) };
    (((value as i32) >> n) as u32, negative && lost != 0)
}

#[inline]
const fn sext16(imm: u16) -> u32 {
    imm as i16 as i32 as u32
}

impl Cpu {
    #[inline]
    const fn get(&self, r: Gpr) -> u32 {
        self.gpr[r as usize]
    }

    #[inline]
    fn set(&mut self, r: Gpr, value: u32) {
        self.gpr[r as usize] = value;
    }

    /// `(ra|0)`: base register where `r0` reads as zero.
    #[inline]
    const fn base(&self, ra: Gpr) -> u32 {
        match ra {
            Gpr::R0 => 0,
            _ => self.get(ra),
        }
    }

    fn compare<T: Ord>(&mut self, a: T, b: T) {
        self.cr0 = [a < b, a > b, a == b, false];
    }

    /// Evaluate a `BO`/`BI` pair, decrementing CTR when `BO` asks for it.
    fn branch_taken(&mut self, bo: u8, bi: u8, allow_ctr: bool) -> Option<bool> {
        let ctr_ok = if bo & 0x04 == 0 {
            if !allow_ctr {
                return None;
            }
            self.ctr = self.ctr.wrapping_sub(1);
            (self.ctr != 0) != (bo & 0x02 != 0)
        } else {
            true
        };
        let cond_ok = if bo & 0x10 != 0 {
            true
        } else {
            let bit = match bi {
                0 => CrBit::Lt,
                1 => CrBit::Gt,
                2 => CrBit::Eq,
                3 => CrBit::So,
                // Only cr0 is modeled.
                _ => return None,
            };
            self.cr_bit(bit) == (bo & 0x08 != 0)
        };
        Some(ctr_ok && cond_ok)
    }
}

impl Machine {
    /// Execute the instruction at pc.
    pub fn step(&mut self) -> Result<()> {
        let pc = self.cpu.pc;
        let word = self.mem.read_u32(pc)?;
        let illegal = SimError::IllegalInstruction { pc, word };
        let insn = decode(word).ok_or(illegal.clone())?;
        let mut next = pc.wrapping_add(4);
        let cpu = &mut self.cpu;

        match insn {
            Insn::Imm { op, rt, ra, imm } => match op {
                ImmOp::Addi => cpu.set(rt, cpu.base(ra).wrapping_add(sext16(imm))),
                ImmOp::Addis => cpu.set(rt, cpu.base(ra).wrapping_add(u32::from(imm) << 16)),
                ImmOp::Subfic => {
                    let (value, ca) = add_carry(!cpu.get(ra), sext16(imm), true);
                    cpu.set(rt, value);
                    cpu.ca = ca;
                }
                ImmOp::Mulli => cpu.set(rt, cpu.get(ra).wrapping_mul(sext16(imm))),
                // Logical forms: `rt` holds the source, `ra` the destination.
                ImmOp::Ori => cpu.set(ra, cpu.get(rt) | u32::from(imm)),
                ImmOp::Oris => cpu.set(ra, cpu.get(rt) | (u32::from(imm) << 16)),
                ImmOp::Xori => cpu.set(ra, cpu.get(rt) ^ u32::from(imm)),
                ImmOp::Xoris => cpu.set(ra, cpu.get(rt) ^ (u32::from(imm) << 16)),
                ImmOp::AndiDot => {
                    let value = cpu.get(rt) & u32::from(imm);
                    cpu.set(ra, value);
                    cpu.record(value);
                }
                ImmOp::AndisDot => {
                    let value = cpu.get(rt) & (u32::from(imm) << 16);
                    cpu.set(ra, value);
                    cpu.record(value);
                }
            },
            Insn::Arith { op, rt, ra, rb } => {
                let a = cpu.get(ra);
                let b = cpu.get(rb);
                let value = match op {
                    ArithOp::Add => a.wrapping_add(b),
                    ArithOp::Subf => b.wrapping_sub(a),
                    ArithOp::Neg => a.wrapping_neg(),
                    ArithOp::Mullw => a.wrapping_mul(b),
                    ArithOp::Mulhwu => ((u64::from(a) * u64::from(b)) >> 32) as u32,
                    // Quotient is undefined on division by zero.
                    ArithOp::Divwu => a.checked_div(b).unwrap_or(0),
                    ArithOp::Addc
                    | ArithOp::Adde
                    | ArithOp::Addze
                    | ArithOp::Addme
                    | ArithOp::Subfc
                    | ArithOp::Subfe
                    | ArithOp::Subfze => {
                        let (x, y, carry_in) = match op {
                            ArithOp::Addc => (a, b, false),
                            ArithOp::Adde => (a, b, cpu.ca),
                            ArithOp::Addze => (a, 0, cpu.ca),
                            ArithOp::Addme => (a, u32::MAX, cpu.ca),
                            ArithOp::Subfc => (!a, b, true),
                            ArithOp::Subfe => (!a, b, cpu.ca),
                            _ => (!a, 0, cpu.ca),
                        };
                        let (value, ca) = add_carry(x, y, carry_in);
                        cpu.ca = ca;
                        value
                    }
                };
                cpu.set(rt, value);
            }
            Insn::Logic { op, ra, rs, rb, rc } => {
                let s = cpu.get(rs);
                let b = cpu.get(rb);
                let value = match op {
                    LogicOp::And => s & b,
                    LogicOp::Or => s | b,
                    LogicOp::Xor => s ^ b,
                    LogicOp::Nor => !(s | b),
                    LogicOp::Slw => s.checked_shl(b & 0x3f).unwrap_or(0),
                    LogicOp::Srw => s.checked_shr(b & 0x3f).unwrap_or(0),
                    LogicOp::Sraw => {
                        let (value, ca) = shift_right_algebraic(s, b & 0x3f);
                        cpu.ca = ca;
                        value
                    }
                };
                cpu.set(ra, value);
                if rc {
                    cpu.record(value);
                }
            }
            Insn::Srawi { ra, rs, sh } => {
                let (value, ca) = shift_right_algebraic(cpu.get(rs), sh);
                cpu.set(ra, value);
                cpu.ca = ca;
            }
            Insn::Rlwinm { ra, rs, sh, mb, me } => {
                cpu.set(ra, cpu.get(rs).rotate_left(sh) & rotate_mask(mb, me));
            }
            Insn::Rlwimi { ra, rs, sh, mb, me } => {
                let mask = rotate_mask(mb, me);
                let value = (cpu.get(rs).rotate_left(sh) & mask) | (cpu.get(ra) & !mask);
                cpu.set(ra, value);
            }
            Insn::Cmpi {
                signed: true,
                ra,
                imm,
            } => cpu.compare(cpu.get(ra) as i32, i32::from(imm as i16)),
            Insn::Cmpi {
                signed: false,
                ra,
                imm,
            } => cpu.compare(cpu.get(ra), u32::from(imm)),
            Insn::Cmp {
                signed: true,
                ra,
                rb,
            } => cpu.compare(cpu.get(ra) as i32, cpu.get(rb) as i32),
            Insn::Cmp {
                signed: false,
                ra,
                rb,
            } => cpu.compare(cpu.get(ra), cpu.get(rb)),
            Insn::Mem { op, rt, d, ra } => {
                let ea = cpu.base(ra).wrapping_add(d as i32 as u32);
                match op {
                    MemOp::Lbz => {
                        let value = self.mem.read_u8(ea)?;
                        self.cpu.set(rt, u32::from(value));
                    }
                    MemOp::Lhz => {
                        let value = self.mem.read_u16(ea)?;
                        self.cpu.set(rt, u32::from(value));
                    }
                    MemOp::Lwz => {
                        let value = self.mem.read_u32(ea)?;
                        self.cpu.set(rt, value);
                    }
                    MemOp::Stb => self.mem.write_u8(ea, self.cpu.get(rt) as u8)?,
                    MemOp::Sth => self.mem.write_u16(ea, self.cpu.get(rt) as u16)?,
                    MemOp::Stw => self.mem.write_u32(ea, self.cpu.get(rt))?,
                    MemOp::Stwu => {
                        if ra == Gpr::R0 {
                            return Err(illegal);
                        }
                        self.mem.write_u32(ea, self.cpu.get(rt))?;
                        self.cpu.set(ra, ea);
                    }
                    MemOp::Lmw => {
                        for (i, n) in (rt.num()..32).enumerate() {
                            let value = self.mem.read_u32(ea.wrapping_add(4 * i as u32))?;
                            self.cpu.gpr[n as usize] = value;
                        }
                    }
                    MemOp::Stmw => {
                        for (i, n) in (rt.num()..32).enumerate() {
                            let value = self.cpu.gpr[n as usize];
                            self.mem.write_u32(ea.wrapping_add(4 * i as u32), value)?;
                        }
                    }
                }
            }
            Insn::Lwarx { rt, ra, rb } => {
                let ea = cpu.base(ra).wrapping_add(cpu.get(rb));
                let value = self.mem.read_u32(ea)?;
                self.cpu.set(rt, value);
                self.cpu.reservation = Some(ea);
            }
            Insn::StwcxDot { rs, ra, rb } => {
                let ea = cpu.base(ra).wrapping_add(cpu.get(rb));
                let stored = self.cpu.reservation.take() == Some(ea);
                if stored {
                    self.mem.write_u32(ea, self.cpu.get(rs))?;
                }
                self.cpu.cr0 = [false, false, stored, false];
            }
            Insn::B { disp, aa, lk } => {
                if lk {
                    cpu.lr = next;
                }
                next = if aa {
                    disp as u32
                } else {
                    pc.wrapping_add(disp as u32)
                };
            }
            Insn::Bc { bo, bi, disp, lk } => {
                let taken = cpu.branch_taken(bo, bi, true).ok_or(illegal)?;
                if lk {
                    cpu.lr = next;
                }
                if taken {
                    next = pc.wrapping_add(disp as u32);
                }
            }
            Insn::Bclr { bo, bi, lk } => {
                let taken = cpu.branch_taken(bo, bi, true).ok_or(illegal)?;
                let target = cpu.lr & !3;
                if lk {
                    cpu.lr = next;
                }
                if taken {
                    next = target;
                }
            }
            Insn::Bcctr { bo, bi, lk } => {
                let taken = cpu.branch_taken(bo, bi, false).ok_or(illegal)?;
                if lk {
                    cpu.lr = next;
                }
                if taken {
                    next = cpu.ctr & !3;
                }
            }
            Insn::Mfspr { rt, spr } => {
                let value = match spr {
                    Spr::Lr => cpu.lr,
                    Spr::Ctr => cpu.ctr,
                    Spr::Xer => u32::from(cpu.ca) << 29,
                };
                cpu.set(rt, value);
            }
            Insn::Mtspr { spr, rs } => {
                let value = cpu.get(rs);
                match spr {
                    Spr::Lr => cpu.lr = value,
                    Spr::Ctr => cpu.ctr = value,
                    Spr::Xer => cpu.ca = value & (1 << 29) != 0,
                }
            }
            Insn::Tw { to, ra, rb } => {
                let a = cpu.get(ra);
                let b = cpu.get(rb);
                let trap = (to & 0x10 != 0 && (a as i32) < (b as i32))
                    || (to & 0x08 != 0 && (a as i32) > (b as i32))
                    || (to & 0x04 != 0 && a == b)
                    || (to & 0x02 != 0 && a < b)
                    || (to & 0x01 != 0 && a > b);
                if trap {
                    return Err(SimError::Trap { pc });
                }
            }
        }

        self.cpu.pc = next;
        Ok(())
    }
}
