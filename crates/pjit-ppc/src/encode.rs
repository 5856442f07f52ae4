//! Instruction word encoders.
//!
//! Every function returns one big-endian instruction word. Operand order
//! follows assembler syntax (`addi rt, ra, si`). Immediates are truncated
//! to their field width; range checks are the caller's job.

use crate::reg::{BO_ALWAYS, Cond, Gpr, Spr};

/// `nop` (`ori r0, r0, 0`).
pub const NOP: u32 = 0x6000_0000;
/// `tw 31, r0, r0`: unconditional trap.
pub const TRAP: u32 = 0x7fe0_0008;
/// `blr`.
pub const BLR: u32 = 0x4e80_0020;
/// `bctr`.
pub const BCTR: u32 = 0x4e80_0420;
/// `bctrl`.
pub const BCTRL: u32 = 0x4e80_0421;

/// Primary opcodes.
pub mod opcd {
    pub const MULLI: u32 = 7;
    pub const SUBFIC: u32 = 8;
    pub const CMPLI: u32 = 10;
    pub const CMPI: u32 = 11;
    pub const ADDI: u32 = 14;
    pub const ADDIS: u32 = 15;
    pub const BC: u32 = 16;
    pub const B: u32 = 18;
    pub const XL: u32 = 19;
    pub const RLWIMI: u32 = 20;
    pub const RLWINM: u32 = 21;
    pub const ORI: u32 = 24;
    pub const ORIS: u32 = 25;
    pub const XORI: u32 = 26;
    pub const XORIS: u32 = 27;
    pub const ANDI: u32 = 28;
    pub const ANDIS: u32 = 29;
    pub const X: u32 = 31;
    pub const LWZ: u32 = 32;
    pub const LBZ: u32 = 34;
    pub const STW: u32 = 36;
    pub const STWU: u32 = 37;
    pub const STB: u32 = 38;
    pub const LHZ: u32 = 40;
    pub const STH: u32 = 44;
    pub const LMW: u32 = 46;
    pub const STMW: u32 = 47;
}

/// Extended opcodes under primary opcode 31 (bits [30:21] or [30:22]).
pub mod xo {
    pub const CMP: u32 = 0;
    pub const SUBFC: u32 = 8;
    pub const ADDC: u32 = 10;
    pub const MULHWU: u32 = 11;
    pub const LWARX: u32 = 20;
    pub const SLW: u32 = 24;
    pub const AND: u32 = 28;
    pub const CMPL: u32 = 32;
    pub const SUBF: u32 = 40;
    pub const NEG: u32 = 104;
    pub const NOR: u32 = 124;
    pub const SUBFE: u32 = 136;
    pub const ADDE: u32 = 138;
    pub const STWCX: u32 = 150;
    pub const SUBFZE: u32 = 200;
    pub const ADDZE: u32 = 202;
    pub const ADDME: u32 = 234;
    pub const MULLW: u32 = 235;
    pub const ADD: u32 = 266;
    pub const XOR: u32 = 316;
    pub const MFSPR: u32 = 339;
    pub const OR: u32 = 444;
    pub const DIVWU: u32 = 459;
    pub const MTSPR: u32 = 467;
    pub const SRW: u32 = 536;
    pub const SRAW: u32 = 792;
    pub const SRAWI: u32 = 824;
    pub const TW: u32 = 4;

    /// Extended opcodes under primary opcode 19.
    pub const BCLR: u32 = 16;
    pub const BCCTR: u32 = 528;
}

#[inline]
const fn d_form(op: u32, rt: u32, ra: u32, imm: u32) -> u32 {
    (op << 26) | (rt << 21) | (ra << 16) | (imm & 0xffff)
}

#[inline]
const fn x_form(rt: u32, ra: u32, rb: u32, xo: u32, rc: u32) -> u32 {
    (opcd::X << 26) | (rt << 21) | (ra << 16) | (rb << 11) | (xo << 1) | rc
}

#[inline]
const fn m_form(op: u32, rs: Gpr, ra: Gpr, sh: u32, mb: u32, me: u32) -> u32 {
    (op << 26)
        | (rs.field() << 21)
        | (ra.field() << 16)
        | ((sh & 0x1f) << 11)
        | ((mb & 0x1f) << 6)
        | ((me & 0x1f) << 1)
}

// ==================== Immediate arithmetic ====================

/// `addi rt, ra, si`. `ra = r0` reads as literal zero.
#[inline]
pub const fn addi(rt: Gpr, ra: Gpr, si: i16) -> u32 {
    d_form(opcd::ADDI, rt.field(), ra.field(), si as u16 as u32)
}

/// `addis rt, ra, si`.
#[inline]
pub const fn addis(rt: Gpr, ra: Gpr, si: i16) -> u32 {
    d_form(opcd::ADDIS, rt.field(), ra.field(), si as u16 as u32)
}

/// `li rt, si`.
#[inline]
pub const fn li(rt: Gpr, si: i16) -> u32 {
    addi(rt, Gpr::R0, si)
}

/// `lis rt, si`.
#[inline]
pub const fn lis(rt: Gpr, si: i16) -> u32 {
    addis(rt, Gpr::R0, si)
}

/// `subfic rt, ra, si` (`rt = si - ra`, sets CA).
#[inline]
pub const fn subfic(rt: Gpr, ra: Gpr, si: i16) -> u32 {
    d_form(opcd::SUBFIC, rt.field(), ra.field(), si as u16 as u32)
}

/// `mulli rt, ra, si`.
#[inline]
pub const fn mulli(rt: Gpr, ra: Gpr, si: i16) -> u32 {
    d_form(opcd::MULLI, rt.field(), ra.field(), si as u16 as u32)
}

// ==================== Immediate logical ====================

/// `ori ra, rs, ui`.
#[inline]
pub const fn ori(ra: Gpr, rs: Gpr, ui: u16) -> u32 {
    d_form(opcd::ORI, rs.field(), ra.field(), ui as u32)
}

/// `oris ra, rs, ui`.
#[inline]
pub const fn oris(ra: Gpr, rs: Gpr, ui: u16) -> u32 {
    d_form(opcd::ORIS, rs.field(), ra.field(), ui as u32)
}

/// `xori ra, rs, ui`.
#[inline]
pub const fn xori(ra: Gpr, rs: Gpr, ui: u16) -> u32 {
    d_form(opcd::XORI, rs.field(), ra.field(), ui as u32)
}

/// `xoris ra, rs, ui`.
#[inline]
pub const fn xoris(ra: Gpr, rs: Gpr, ui: u16) -> u32 {
    d_form(opcd::XORIS, rs.field(), ra.field(), ui as u32)
}

/// `andi. ra, rs, ui` (always records to cr0).
#[inline]
pub const fn andi_dot(ra: Gpr, rs: Gpr, ui: u16) -> u32 {
    d_form(opcd::ANDI, rs.field(), ra.field(), ui as u32)
}

/// `andis. ra, rs, ui` (always records to cr0).
#[inline]
pub const fn andis_dot(ra: Gpr, rs: Gpr, ui: u16) -> u32 {
    d_form(opcd::ANDIS, rs.field(), ra.field(), ui as u32)
}

// ==================== Register arithmetic (XO-form) ====================

macro_rules! xo_arith {
    ($($(#[$meta:meta])* $name:ident => $xo:expr;)*) => {
        $(
            $(#[$meta])*
            #[inline]
            pub const fn $name(rt: Gpr, ra: Gpr, rb: Gpr) -> u32 {
                x_form(rt.field(), ra.field(), rb.field(), $xo, 0)
            }
        )*
    };
}

xo_arith! {
    /// `add rt, ra, rb`.
    add => xo::ADD;
    /// `addc rt, ra, rb` (sets CA).
    addc => xo::ADDC;
    /// `adde rt, ra, rb` (`ra + rb + CA`).
    adde => xo::ADDE;
    /// `subf rt, ra, rb` (`rb - ra`).
    subf => xo::SUBF;
    /// `subfc rt, ra, rb` (`rb - ra`, sets CA).
    subfc => xo::SUBFC;
    /// `subfe rt, ra, rb` (`!ra + rb + CA`).
    subfe => xo::SUBFE;
    /// `mullw rt, ra, rb`.
    mullw => xo::MULLW;
    /// `mulhwu rt, ra, rb`.
    mulhwu => xo::MULHWU;
    /// `divwu rt, ra, rb`.
    divwu => xo::DIVWU;
}

/// `addze rt, ra` (`ra + CA`).
#[inline]
pub const fn addze(rt: Gpr, ra: Gpr) -> u32 {
    x_form(rt.field(), ra.field(), 0, xo::ADDZE, 0)
}

/// `addme rt, ra` (`ra + CA - 1`).
#[inline]
pub const fn addme(rt: Gpr, ra: Gpr) -> u32 {
    x_form(rt.field(), ra.field(), 0, xo::ADDME, 0)
}

/// `subfze rt, ra` (`!ra + CA`).
#[inline]
pub const fn subfze(rt: Gpr, ra: Gpr) -> u32 {
    x_form(rt.field(), ra.field(), 0, xo::SUBFZE, 0)
}

/// `neg rt, ra`.
#[inline]
pub const fn neg(rt: Gpr, ra: Gpr) -> u32 {
    x_form(rt.field(), ra.field(), 0, xo::NEG, 0)
}

// ==================== Register logical (X-form) ====================

macro_rules! x_logical {
    ($($(#[$meta:meta])* $name:ident => $xo:expr, $rc:expr;)*) => {
        $(
            $(#[$meta])*
            #[inline]
            pub const fn $name(ra: Gpr, rs: Gpr, rb: Gpr) -> u32 {
                x_form(rs.field(), ra.field(), rb.field(), $xo, $rc)
            }
        )*
    };
}

x_logical! {
    /// `and ra, rs, rb`.
    and => xo::AND, 0;
    /// `and. ra, rs, rb`.
    and_dot => xo::AND, 1;
    /// `or ra, rs, rb`.
    or => xo::OR, 0;
    /// `xor ra, rs, rb`.
    xor => xo::XOR, 0;
    /// `nor ra, rs, rb`.
    nor => xo::NOR, 0;
    /// `slw ra, rs, rb`.
    slw => xo::SLW, 0;
    /// `srw ra, rs, rb`.
    srw => xo::SRW, 0;
    /// `sraw ra, rs, rb` (sets CA).
    sraw => xo::SRAW, 0;
}

/// `mr ra, rs`.
#[inline]
pub const fn mr(ra: Gpr, rs: Gpr) -> u32 {
    or(ra, rs, rs)
}

/// `srawi ra, rs, sh` (sets CA).
#[inline]
pub const fn srawi(ra: Gpr, rs: Gpr, sh: u32) -> u32 {
    x_form(rs.field(), ra.field(), sh & 0x1f, xo::SRAWI, 0)
}

// ==================== Rotates ====================

/// `rlwinm ra, rs, sh, mb, me`.
#[inline]
pub const fn rlwinm(ra: Gpr, rs: Gpr, sh: u32, mb: u32, me: u32) -> u32 {
    m_form(opcd::RLWINM, rs, ra, sh, mb, me)
}

/// `rlwimi ra, rs, sh, mb, me`.
#[inline]
pub const fn rlwimi(ra: Gpr, rs: Gpr, sh: u32, mb: u32, me: u32) -> u32 {
    m_form(opcd::RLWIMI, rs, ra, sh, mb, me)
}

/// `slwi ra, rs, n` for `n` in 0..32.
#[inline]
pub const fn slwi(ra: Gpr, rs: Gpr, n: u32) -> u32 {
    rlwinm(ra, rs, n, 0, 31 - n)
}

/// `srwi ra, rs, n` for `n` in 0..32.
#[inline]
pub const fn srwi(ra: Gpr, rs: Gpr, n: u32) -> u32 {
    if n == 0 {
        rlwinm(ra, rs, 0, 0, 31)
    } else {
        rlwinm(ra, rs, 32 - n, n, 31)
    }
}

// ==================== Compares ====================

/// `cmpwi cr0, ra, si`.
#[inline]
pub const fn cmpwi(ra: Gpr, si: i16) -> u32 {
    d_form(opcd::CMPI, 0, ra.field(), si as u16 as u32)
}

/// `cmplwi cr0, ra, ui`.
#[inline]
pub const fn cmplwi(ra: Gpr, ui: u16) -> u32 {
    d_form(opcd::CMPLI, 0, ra.field(), ui as u32)
}

/// `cmpw cr0, ra, rb`.
#[inline]
pub const fn cmpw(ra: Gpr, rb: Gpr) -> u32 {
    x_form(0, ra.field(), rb.field(), xo::CMP, 0)
}

/// `cmplw cr0, ra, rb`.
#[inline]
pub const fn cmplw(ra: Gpr, rb: Gpr) -> u32 {
    x_form(0, ra.field(), rb.field(), xo::CMPL, 0)
}

// ==================== Loads and stores ====================

macro_rules! d_mem {
    ($($(#[$meta:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$meta])*
            #[inline]
            pub const fn $name(rt: Gpr, d: i16, ra: Gpr) -> u32 {
                d_form($op, rt.field(), ra.field(), d as u16 as u32)
            }
        )*
    };
}

d_mem! {
    /// `lwz rt, d(ra)`.
    lwz => opcd::LWZ;
    /// `lhz rt, d(ra)`.
    lhz => opcd::LHZ;
    /// `lbz rt, d(ra)`.
    lbz => opcd::LBZ;
    /// `stw rs, d(ra)`.
    stw => opcd::STW;
    /// `sth rs, d(ra)`.
    sth => opcd::STH;
    /// `stb rs, d(ra)`.
    stb => opcd::STB;
    /// `stwu rs, d(ra)`: store and write the effective address to `ra`.
    stwu => opcd::STWU;
    /// `lmw rt, d(ra)`: load `rt..=r31`.
    lmw => opcd::LMW;
    /// `stmw rs, d(ra)`: store `rs..=r31`.
    stmw => opcd::STMW;
}

/// `lwarx rt, ra, rb`.
#[inline]
pub const fn lwarx(rt: Gpr, ra: Gpr, rb: Gpr) -> u32 {
    x_form(rt.field(), ra.field(), rb.field(), xo::LWARX, 0)
}

/// `stwcx. rs, ra, rb`.
#[inline]
pub const fn stwcx_dot(rs: Gpr, ra: Gpr, rb: Gpr) -> u32 {
    x_form(rs.field(), ra.field(), rb.field(), xo::STWCX, 1)
}

// ==================== Branches ====================

/// `b` to a byte displacement relative to this instruction.
#[inline]
pub const fn b(disp: i32) -> u32 {
    (opcd::B << 26) | (disp as u32 & 0x03ff_fffc)
}

/// `bc` to a byte displacement relative to this instruction.
#[inline]
pub const fn bc(cond: Cond, disp: i32) -> u32 {
    (opcd::BC << 26)
        | ((cond.bo as u32) << 21)
        | ((cond.bi() as u32) << 16)
        | (disp as u32 & 0xfffc)
}

/// Whether `disp` fits the 26-bit displacement of `b`.
#[inline]
pub const fn fits_b(disp: i32) -> bool {
    disp >= -0x0200_0000 && disp < 0x0200_0000 && disp & 3 == 0
}

/// Whether `disp` fits the 16-bit displacement of `bc`.
#[inline]
pub const fn fits_bc(disp: i32) -> bool {
    disp >= -0x8000 && disp < 0x8000 && disp & 3 == 0
}

// ==================== Special registers ====================

#[inline]
const fn spr_field(spr: Spr) -> u32 {
    let n = spr as u32;
    ((n & 0x1f) << 5) | (n >> 5)
}

/// `mfspr rt, spr`.
#[inline]
pub const fn mfspr(rt: Gpr, spr: Spr) -> u32 {
    (opcd::X << 26) | (rt.field() << 21) | (spr_field(spr) << 11) | (xo::MFSPR << 1)
}

/// `mtspr spr, rs`.
#[inline]
pub const fn mtspr(spr: Spr, rs: Gpr) -> u32 {
    (opcd::X << 26) | (rs.field() << 21) | (spr_field(spr) << 11) | (xo::MTSPR << 1)
}

#[inline]
pub const fn mflr(rt: Gpr) -> u32 {
    mfspr(rt, Spr::Lr)
}

#[inline]
pub const fn mtlr(rs: Gpr) -> u32 {
    mtspr(Spr::Lr, rs)
}

#[inline]
pub const fn mtctr(rs: Gpr) -> u32 {
    mtspr(Spr::Ctr, rs)
}

/// `bclr` with an arbitrary condition; `blr` is the always form.
#[inline]
pub const fn bclr(bo: u8, bi: u8, lk: bool) -> u32 {
    (opcd::XL << 26) | ((bo as u32) << 21) | ((bi as u32) << 16) | (xo::BCLR << 1) | lk as u32
}

/// `bcctr` with an arbitrary condition; `bctr` is the always form.
#[inline]
pub const fn bcctr(bo: u8, bi: u8, lk: bool) -> u32 {
    (opcd::XL << 26) | ((bo as u32) << 21) | ((bi as u32) << 16) | (xo::BCCTR << 1) | lk as u32
}

const _: () = assert!(bclr(BO_ALWAYS, 0, false) == BLR);
const _: () = assert!(bcctr(BO_ALWAYS, 0, false) == BCTR);
const _: () = assert!(bcctr(BO_ALWAYS, 0, true) == BCTRL);
const _: () = assert!(ori(Gpr::R0, Gpr::R0, 0) == NOP);

#[cfg(test)]
mod tests {
    use super::*;

    // Expected words cross-checked against GNU as output.

    #[test]
    fn test_d_form() {
        assert_eq!(addi(Gpr::R3, Gpr::R1, 16), 0x3861_0010);
        assert_eq!(li(Gpr::R3, -1), 0x3860_ffff);
        assert_eq!(lis(Gpr::R0, 0x1234), 0x3c00_1234);
        assert_eq!(stwu(Gpr::R1, -112, Gpr::R1), 0x9421_ff90);
        assert_eq!(lwz(Gpr::R0, 4, Gpr::R1), 0x8001_0004);
        assert_eq!(stmw(Gpr::R28, -16, Gpr::R1), 0xbf81_fff0);
        assert_eq!(ori(Gpr::R0, Gpr::R0, 0x5678), 0x6000_5678);
        assert_eq!(andi_dot(Gpr::R0, Gpr::R3, 0xff), 0x7060_00ff);
    }

    #[test]
    fn test_x_form() {
        assert_eq!(add(Gpr::R3, Gpr::R4, Gpr::R5), 0x7c64_2a14);
        assert_eq!(mr(Gpr::R4, Gpr::R3), 0x7c64_1b78);
        assert_eq!(cmplw(Gpr::R3, Gpr::R4), 0x7c03_2040);
        assert_eq!(cmpw(Gpr::R3, Gpr::R4), 0x7c03_2000);
        assert_eq!(mullw(Gpr::R3, Gpr::R3, Gpr::R4), 0x7c63_21d6);
        assert_eq!(divwu(Gpr::R3, Gpr::R3, Gpr::R4), 0x7c63_2396);
        assert_eq!(stwcx_dot(Gpr::R0, Gpr::R3, Gpr::R4), 0x7c03_212d);
    }

    #[test]
    fn test_special_registers() {
        assert_eq!(mflr(Gpr::R0), 0x7c08_02a6);
        assert_eq!(mtlr(Gpr::R0), 0x7c08_03a6);
        assert_eq!(mtctr(Gpr::R0), 0x7c09_03a6);
    }

    #[test]
    fn test_rotates() {
        // slwi r3, r3, 2 == rlwinm r3, r3, 2, 0, 29
        assert_eq!(slwi(Gpr::R3, Gpr::R3, 2), 0x5463_103a);
        // srwi r3, r3, 8 == rlwinm r3, r3, 24, 8, 31
        assert_eq!(srwi(Gpr::R3, Gpr::R3, 8), 0x5463_c23e);
    }

    #[test]
    fn test_branches() {
        assert_eq!(b(8), 0x4800_0008);
        assert_eq!(b(-4), 0x4bff_fffc);
        assert_eq!(bc(Cond::EQ, 8), 0x4182_0008);
        assert_eq!(bc(Cond::NE, -12), 0x4082_fff4);
        assert!(fits_bc(0x7ffc));
        assert!(!fits_bc(0x8000));
        assert!(fits_b(-0x0200_0000));
        assert!(!fits_b(0x0200_0000));
    }
}
