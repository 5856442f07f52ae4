//! Registers, condition-register bits, and branch conditions.

use std::fmt;

/// General-purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Gpr {
    R0 = 0, R1 = 1, R2 = 2, R3 = 3,
    R4 = 4, R5 = 5, R6 = 6, R7 = 7,
    R8 = 8, R9 = 9, R10 = 10, R11 = 11,
    R12 = 12, R13 = 13, R14 = 14, R15 = 15,
    R16 = 16, R17 = 17, R18 = 18, R19 = 19,
    R20 = 20, R21 = 21, R22 = 22, R23 = 23,
    R24 = 24, R25 = 25, R26 = 26, R27 = 27,
    R28 = 28, R29 = 29, R30 = 30, R31 = 31,
}

impl Gpr {
    /// Stack pointer.
    pub const SP: Self = Self::R1;

    const ALL: [Self; 32] = [
        Self::R0, Self::R1, Self::R2, Self::R3,
        Self::R4, Self::R5, Self::R6, Self::R7,
        Self::R8, Self::R9, Self::R10, Self::R11,
        Self::R12, Self::R13, Self::R14, Self::R15,
        Self::R16, Self::R17, Self::R18, Self::R19,
        Self::R20, Self::R21, Self::R22, Self::R23,
        Self::R24, Self::R25, Self::R26, Self::R27,
        Self::R28, Self::R29, Self::R30, Self::R31,
    ];

    /// Register named by a 5-bit instruction field.
    #[inline]
    pub const fn from_field(field: u32) -> Self {
        Self::ALL[(field & 0x1f) as usize]
    }

    #[inline]
    pub const fn num(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn field(self) -> u32 {
        self as u32
    }

    /// Whether the register survives calls under the host ABI.
    #[inline]
    pub const fn is_nonvolatile(self) -> bool {
        self as u8 >= 14
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", *self as u8)
    }
}

/// Special-purpose registers reachable through `mfspr`/`mtspr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Spr {
    Xer = 1,
    Lr = 8,
    Ctr = 9,
}

impl Spr {
    #[inline]
    pub const fn from_num(num: u32) -> Option<Self> {
        match num {
            1 => Some(Self::Xer),
            8 => Some(Self::Lr),
            9 => Some(Self::Ctr),
            _ => None,
        }
    }
}

/// Bits of condition-register field 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CrBit {
    Lt = 0,
    Gt = 1,
    Eq = 2,
    So = 3,
}

/// `BO` field: branch if the tested bit is clear.
pub const BO_FALSE: u8 = 4;
/// `BO` field: branch if the tested bit is set.
pub const BO_TRUE: u8 = 12;
/// `BO` field: branch always.
pub const BO_ALWAYS: u8 = 20;

/// A conditional branch predicate on cr0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cond {
    pub bo: u8,
    pub bit: CrBit,
}

impl Cond {
    pub const EQ: Self = Self::when(CrBit::Eq);
    pub const NE: Self = Self::unless(CrBit::Eq);
    pub const LT: Self = Self::when(CrBit::Lt);
    pub const GE: Self = Self::unless(CrBit::Lt);
    pub const GT: Self = Self::when(CrBit::Gt);
    pub const LE: Self = Self::unless(CrBit::Gt);

    #[inline]
    pub const fn when(bit: CrBit) -> Self {
        Self { bo: BO_TRUE, bit }
    }

    #[inline]
    pub const fn unless(bit: CrBit) -> Self {
        Self { bo: BO_FALSE, bit }
    }

    /// Predicate that holds exactly when `self` does not.
    #[inline]
    pub const fn invert(self) -> Self {
        Self {
            bo: if self.bo == BO_TRUE { BO_FALSE } else { BO_TRUE },
            bit: self.bit,
        }
    }

    /// `BI` field for cr0.
    #[inline]
    pub const fn bi(self) -> u8 {
        self.bit as u8
    }

    /// Extended mnemonic suffix (`eq`, `ne`, `lt`, ...).
    pub const fn mnemonic(self) -> &'static str {
        match (self.bo, self.bit) {
            (BO_TRUE, CrBit::Lt) => "lt",
            (BO_TRUE, CrBit::Gt) => "gt",
            (BO_TRUE, CrBit::Eq) => "eq",
            (BO_TRUE, CrBit::So) => "so",
            (_, CrBit::Lt) => "ge",
            (_, CrBit::Gt) => "le",
            (_, CrBit::Eq) => "ne",
            (_, CrBit::So) => "ns",
        }
    }
}
