//! Raw instruction record and register ids.

use std::fmt;

/// Size of one encoded instruction slot in bytes.
pub const INSN_SIZE: usize = 8;

/// Number of architectural registers (R0..R9 plus the frame pointer).
pub const NUM_REGS: usize = 11;

/// VM register id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Reg {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    /// Read-only frame pointer.
    Fp = 10,
}

impl Reg {
    pub const ALL: [Self; NUM_REGS] = [
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::R9,
        Self::Fp,
    ];

    /// Register for a 4-bit field value, if it names one.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        if (value as usize) < NUM_REGS {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", *self as u8)
    }
}

/// One 8-byte instruction slot, exactly as it appears in the program.
///
/// Byte 1 packs the destination register in its low nibble and the
/// source register in its high nibble.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Insn {
    pub code: u8,
    pub dst: u8,
    pub src: u8,
    pub off: i16,
    pub imm: i32,
}

impl Insn {
    #[inline]
    pub const fn new(code: u8, dst: u8, src: u8, off: i16, imm: i32) -> Self {
        Self {
            code,
            dst,
            src,
            off,
            imm,
        }
    }

    /// Decode one little-endian slot.
    #[inline]
    pub const fn from_bytes(bytes: [u8; INSN_SIZE]) -> Self {
        Self {
            code: bytes[0],
            dst: bytes[1] & 0x0f,
            src: bytes[1] >> 4,
            off: i16::from_le_bytes([bytes[2], bytes[3]]),
            imm: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    /// Encode back into a little-endian slot.
    #[inline]
    pub const fn to_bytes(self) -> [u8; INSN_SIZE] {
        let off = self.off.to_le_bytes();
        let imm = self.imm.to_le_bytes();
        [
            self.code,
            (self.src << 4) | (self.dst & 0x0f),
            off[0],
            off[1],
            imm[0],
            imm[1],
            imm[2],
            imm[3],
        ]
    }
}
