//! Instruction constructors for building programs in code.

use crate::insn::{Insn, Reg};
use crate::opcode::{alu, atomic, class, jmp, mode, pseudo, size, source};

#[inline]
pub const fn alu64_imm(op: u8, dst: Reg, imm: i32) -> Insn {
    Insn::new(class::ALU64 | op | source::K, dst as u8, 0, 0, imm)
}

#[inline]
pub const fn alu64_reg(op: u8, dst: Reg, src: Reg) -> Insn {
    Insn::new(class::ALU64 | op | source::X, dst as u8, src as u8, 0, 0)
}

#[inline]
pub const fn alu32_imm(op: u8, dst: Reg, imm: i32) -> Insn {
    Insn::new(class::ALU | op | source::K, dst as u8, 0, 0, imm)
}

#[inline]
pub const fn alu32_reg(op: u8, dst: Reg, src: Reg) -> Insn {
    Insn::new(class::ALU | op | source::X, dst as u8, src as u8, 0, 0)
}

#[inline]
pub const fn mov64_imm(dst: Reg, imm: i32) -> Insn {
    alu64_imm(alu::MOV, dst, imm)
}

#[inline]
pub const fn mov64_reg(dst: Reg, src: Reg) -> Insn {
    alu64_reg(alu::MOV, dst, src)
}

/// Byte-order conversion; `order` is [`alu::TO_LE`] or [`alu::TO_BE`].
#[inline]
pub const fn endian(order: u8, dst: Reg, bits: i32) -> Insn {
    Insn::new(class::ALU | alu::END | order, dst as u8, 0, 0, bits)
}

/// Wide immediate load, occupying two slots.
#[inline]
pub const fn ld_imm64(dst: Reg, imm: u64) -> [Insn; 2] {
    [
        Insn::new(class::LD | size::DW | mode::IMM, dst as u8, 0, 0, imm as u32 as i32),
        Insn::new(0, 0, 0, 0, (imm >> 32) as u32 as i32),
    ]
}

/// `dst = *(size *)(base + off)`; `sz` is one of the [`size`] constants.
#[inline]
pub const fn ldx(sz: u8, dst: Reg, base: Reg, off: i16) -> Insn {
    Insn::new(class::LDX | sz | mode::MEM, dst as u8, base as u8, off, 0)
}

#[inline]
pub const fn stx(sz: u8, base: Reg, off: i16, src: Reg) -> Insn {
    Insn::new(class::STX | sz | mode::MEM, base as u8, src as u8, off, 0)
}

#[inline]
pub const fn st(sz: u8, base: Reg, off: i16, imm: i32) -> Insn {
    Insn::new(class::ST | sz | mode::MEM, base as u8, 0, off, imm)
}

#[inline]
pub const fn atomic_add(sz: u8, base: Reg, off: i16, src: Reg) -> Insn {
    Insn::new(class::STX | sz | mode::ATOMIC, base as u8, src as u8, off, atomic::ADD)
}

#[inline]
pub const fn ja(off: i16) -> Insn {
    Insn::new(class::JMP | jmp::JA, 0, 0, off, 0)
}

#[inline]
pub const fn jmp_imm(op: u8, dst: Reg, imm: i32, off: i16) -> Insn {
    Insn::new(class::JMP | op | source::K, dst as u8, 0, off, imm)
}

#[inline]
pub const fn jmp_reg(op: u8, dst: Reg, src: Reg, off: i16) -> Insn {
    Insn::new(class::JMP | op | source::X, dst as u8, src as u8, off, 0)
}

#[inline]
pub const fn jmp32_imm(op: u8, dst: Reg, imm: i32, off: i16) -> Insn {
    Insn::new(class::JMP32 | op | source::K, dst as u8, 0, off, imm)
}

#[inline]
pub const fn jmp32_reg(op: u8, dst: Reg, src: Reg, off: i16) -> Insn {
    Insn::new(class::JMP32 | op | source::X, dst as u8, src as u8, off, 0)
}

#[inline]
pub const fn call_helper(id: i32) -> Insn {
    Insn::new(class::JMP | jmp::CALL, 0, pseudo::HELPER, 0, id)
}

/// Call the subprogram starting `rel + 1` slots after this one.
#[inline]
pub const fn call_local(rel: i32) -> Insn {
    Insn::new(class::JMP | jmp::CALL, 0, pseudo::CALL, 0, rel)
}

#[inline]
pub const fn tail_call() -> Insn {
    Insn::new(class::JMP | jmp::TAIL_CALL, 0, 0, 0, 0)
}

#[inline]
pub const fn exit() -> Insn {
    Insn::new(class::JMP | jmp::EXIT, 0, 0, 0, 0)
}
