//! Opcode field constants.
//!
//! An opcode byte is `class | size | mode` for memory instructions and
//! `class | op | source` for arithmetic and jump instructions.

/// Instruction class (bits [2:0]).
pub mod class {
    pub const LD: u8 = 0x00;
    pub const LDX: u8 = 0x01;
    pub const ST: u8 = 0x02;
    pub const STX: u8 = 0x03;
    pub const ALU: u8 = 0x04;
    pub const JMP: u8 = 0x05;
    pub const JMP32: u8 = 0x06;
    pub const ALU64: u8 = 0x07;
}

/// Memory access size (bits [4:3]).
pub mod size {
    pub const W: u8 = 0x00;
    pub const H: u8 = 0x08;
    pub const B: u8 = 0x10;
    pub const DW: u8 = 0x18;
}

/// Memory addressing mode (bits [7:5]).
pub mod mode {
    pub const IMM: u8 = 0x00;
    pub const ABS: u8 = 0x20;
    pub const IND: u8 = 0x40;
    pub const MEM: u8 = 0x60;
    pub const MEMSX: u8 = 0x80;
    pub const ATOMIC: u8 = 0xc0;
}

/// Operand source (bit 3).
pub mod source {
    pub const K: u8 = 0x00;
    pub const X: u8 = 0x08;
}

/// Arithmetic operation (bits [7:4]).
pub mod alu {
    pub const ADD: u8 = 0x00;
    pub const SUB: u8 = 0x10;
    pub const MUL: u8 = 0x20;
    pub const DIV: u8 = 0x30;
    pub const OR: u8 = 0x40;
    pub const AND: u8 = 0x50;
    pub const LSH: u8 = 0x60;
    pub const RSH: u8 = 0x70;
    pub const NEG: u8 = 0x80;
    pub const MOD: u8 = 0x90;
    pub const XOR: u8 = 0xa0;
    pub const MOV: u8 = 0xb0;
    pub const ARSH: u8 = 0xc0;
    pub const END: u8 = 0xd0;

    /// Byte-order conversion targets, stored in the source bit of `END`.
    pub const TO_LE: u8 = 0x00;
    pub const TO_BE: u8 = 0x08;
}

/// Jump operation (bits [7:4]).
pub mod jmp {
    pub const JA: u8 = 0x00;
    pub const JEQ: u8 = 0x10;
    pub const JGT: u8 = 0x20;
    pub const JGE: u8 = 0x30;
    pub const JSET: u8 = 0x40;
    pub const JNE: u8 = 0x50;
    pub const JSGT: u8 = 0x60;
    pub const JSGE: u8 = 0x70;
    pub const CALL: u8 = 0x80;
    pub const EXIT: u8 = 0x90;
    pub const JLT: u8 = 0xa0;
    pub const JLE: u8 = 0xb0;
    pub const JSLT: u8 = 0xc0;
    pub const JSLE: u8 = 0xd0;
    /// Internal opcode the loader substitutes for the tail-call helper.
    pub const TAIL_CALL: u8 = 0xf0;
}

/// Atomic operation selector carried in the immediate field.
pub mod atomic {
    pub const ADD: i32 = 0x00;
    pub const OR: i32 = 0x40;
    pub const AND: i32 = 0x50;
    pub const XOR: i32 = 0xa0;
    pub const FETCH: i32 = 0x01;
    pub const XCHG: i32 = 0xe0 | FETCH;
    pub const CMPXCHG: i32 = 0xf0 | FETCH;
}

/// Source register values with special meaning for `CALL`.
pub mod pseudo {
    /// Call a helper by id.
    pub const HELPER: u8 = 0;
    /// Call another subprogram of the same unit.
    pub const CALL: u8 = 1;
    /// Call a kernel function by BTF id.
    pub const KFUNC_CALL: u8 = 2;
}

#[inline]
pub const fn class_of(code: u8) -> u8 {
    code & 0x07
}

#[inline]
pub const fn size_of(code: u8) -> u8 {
    code & 0x18
}

#[inline]
pub const fn mode_of(code: u8) -> u8 {
    code & 0xe0
}

#[inline]
pub const fn op_of(code: u8) -> u8 {
    code & 0xf0
}

#[inline]
pub const fn source_of(code: u8) -> u8 {
    code & 0x08
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_extraction() {
        // ALU64 | ADD | X
        let code = class::ALU64 | alu::ADD | source::X;
        assert_eq!(class_of(code), class::ALU64);
        assert_eq!(op_of(code), alu::ADD);
        assert_eq!(source_of(code), source::X);

        // STX | DW | MEM
        let code = class::STX | size::DW | mode::MEM;
        assert_eq!(class_of(code), class::STX);
        assert_eq!(size_of(code), size::DW);
        assert_eq!(mode_of(code), mode::MEM);
    }
}
