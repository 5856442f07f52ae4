//! VM to PowerPC register mapping.
//!
//! Every 64-bit VM register lives in a fixed pair of 32-bit GPRs, high
//! word first. The high register is always one below the low register.
//!
//! Arguments and return values line up with the host ABI, so helper calls
//! need no shuffling:
//! - R1..R5 sit in the argument registers r3..r12.
//! - R0 sits in r30:r31 and is copied to r3:r4 only on exit.
//! - R6..R9 and FP use callee-saved registers, so they survive calls.

use pjit_isa::{NUM_REGS, Reg};
use pjit_ppc::Gpr;

/// Registers the translation never maps to a VM register.
pub mod reserved {
    use pjit_ppc::Gpr;

    /// Implicit scratch. Never used as a base register, since `r0` in the
    /// base field of a D-form access reads as literal zero.
    pub const SCRATCH: Gpr = Gpr::R0;
    /// Stack pointer.
    pub const SP: Gpr = Gpr::R1;
    /// Second scratch for sequences that need two temporaries.
    pub const TMP: Gpr = Gpr::R19;
    /// Return value pair under the host ABI.
    pub const RET_HI: Gpr = Gpr::R3;
    pub const RET_LO: Gpr = Gpr::R4;
}

pub use reserved::TMP;

/// Lowest callee-saved register the generated code may touch.
pub const NVR_MIN: Gpr = Gpr::R19;

/// A VM register's host pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WideReg {
    pub hi: Gpr,
    pub lo: Gpr,
}

impl WideReg {
    const fn new(hi: Gpr, lo: Gpr) -> Self {
        Self { hi, lo }
    }
}

/// Register mapping from VM registers to host pairs.
#[derive(Clone, Debug)]
pub struct RegMap {
    pairs: [WideReg; NUM_REGS],
}

/// The one mapping every compilation uses.
pub const REG_MAP: RegMap = RegMap {
    pairs: [
        WideReg::new(Gpr::R30, Gpr::R31), // R0
        WideReg::new(Gpr::R3, Gpr::R4),   // R1
        WideReg::new(Gpr::R5, Gpr::R6),   // R2
        WideReg::new(Gpr::R7, Gpr::R8),   // R3
        WideReg::new(Gpr::R9, Gpr::R10),  // R4
        WideReg::new(Gpr::R11, Gpr::R12), // R5
        WideReg::new(Gpr::R28, Gpr::R29), // R6
        WideReg::new(Gpr::R26, Gpr::R27), // R7
        WideReg::new(Gpr::R24, Gpr::R25), // R8
        WideReg::new(Gpr::R22, Gpr::R23), // R9
        WideReg::new(Gpr::R20, Gpr::R21), // FP
    ],
};

impl RegMap {
    #[inline]
    pub const fn get(&self, reg: Reg) -> WideReg {
        self.pairs[reg.index()]
    }

    /// All host registers holding VM state.
    pub fn host_regs(&self) -> impl Iterator<Item = Gpr> + '_ {
        self.pairs.iter().flat_map(|pair| [pair.hi, pair.lo])
    }
}

/// Host pair for a VM register.
#[inline]
pub const fn wide(reg: Reg) -> WideReg {
    REG_MAP.get(reg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_adjacent() {
        for reg in Reg::ALL {
            let pair = wide(reg);
            assert_eq!(pair.hi.num() + 1, pair.lo.num(), "{reg}");
        }
    }

    #[test]
    fn test_no_collisions() {
        let mut seen = 0u32;
        for r in REG_MAP.host_regs() {
            assert_eq!(seen & (1 << r.num()), 0, "{r} mapped twice");
            seen |= 1 << r.num();
        }
        for r in [reserved::SCRATCH, reserved::SP, Gpr::R2, Gpr::R13, TMP] {
            assert_eq!(seen & (1 << r.num()), 0, "{r} is reserved");
        }
    }

    #[test]
    fn test_abi_alignment() {
        // Arguments land in r3..r12 without moves.
        assert_eq!(wide(Reg::R1), WideReg::new(Gpr::R3, Gpr::R4));
        assert_eq!(wide(Reg::R5), WideReg::new(Gpr::R11, Gpr::R12));
        // Registers that must survive calls are callee-saved.
        for reg in [Reg::R0, Reg::R6, Reg::R7, Reg::R8, Reg::R9, Reg::Fp] {
            assert!(wide(reg).hi.is_nonvolatile());
            assert!(wide(reg).hi >= NVR_MIN);
        }
        assert!(TMP >= NVR_MIN);
    }
}
