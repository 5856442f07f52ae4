//! Stack frame layout.
//!
//! ```text
//!        [ caller frame     ]
//!        [ NVR save area    ]  64 bytes, r16..r31, only the used tail is written
//!        [ tail-call count  ]  16 bytes of locals: temp word at +0, counter at +8
//! fp ->  [ VM stack         ]  stack depth rounded up to 16
//!        [ frame header     ]  16 bytes: back chain, LR save, parameter area
//! sp ->
//! ```
//!
//! The VM stack grows down from `fp`, so `fp` sits directly above it.

use pjit_ppc::Gpr;

use crate::error::{Result, TranslateError};

/// Back chain, LR save word, and the helper parameter area.
pub const FRAME_HEADER: u32 = 16;
/// Temp word and the tail-call counter.
pub const LOCALS: u32 = 16;
/// Room for r16..r31.
pub const NVR_SAVE_AREA: u32 = 64;
pub const STACK_ALIGN: u32 = 16;

/// LR save slot, relative to the caller's stack pointer.
pub const LR_SAVE: i16 = 4;
/// Fifth helper argument, relative to the caller's stack pointer.
pub const PARAM_AREA: i16 = 8;

/// Tail-call counter relative to the stack pointer before the frame is
/// allocated. Independent of the stack depth, so the entry sequence can
/// initialize it before `stwu` and a tail-called program can skip that.
pub const TAIL_CALL_CNT_ENTRY: i16 = -((NVR_SAVE_AREA + LOCALS - 8) as i16);

/// Frame geometry for one program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackLayout {
    stack_size: u32,
}

impl StackLayout {
    /// Layout for a program with `stack_depth` bytes of VM stack.
    pub fn new(stack_depth: u32) -> Result<Self> {
        let stack_size = stack_depth
            .checked_next_multiple_of(STACK_ALIGN)
            .ok_or(TranslateError::StackTooLarge { depth: stack_depth })?;
        let layout = Self { stack_size };
        // The epilogue adds the frame size back with a signed 16-bit immediate.
        if layout.frame_size() > i16::MAX as u32 {
            return Err(TranslateError::StackTooLarge { depth: stack_depth });
        }
        Ok(layout)
    }

    #[inline]
    pub const fn stack_size(&self) -> u32 {
        self.stack_size
    }

    #[inline]
    pub const fn frame_size(&self) -> u32 {
        FRAME_HEADER + self.stack_size + LOCALS + NVR_SAVE_AREA
    }

    /// Distance from the new stack pointer to the top of the VM stack.
    #[inline]
    pub const fn fp_offset(&self) -> i16 {
        (FRAME_HEADER + self.stack_size) as i16
    }

    /// Temp word used by the byte-order and division sequences.
    #[inline]
    pub const fn temp_offset(&self) -> i16 {
        self.fp_offset()
    }

    #[inline]
    pub const fn tail_call_cnt_offset(&self) -> i16 {
        self.fp_offset() + 8
    }

    /// Save slot for a callee-saved register.
    #[inline]
    pub const fn nvr_offset(&self, reg: Gpr) -> i16 {
        (self.frame_size() - 4 * (32 - reg.num() as u32)) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_geometry() {
        let layout = StackLayout::new(20).unwrap();
        assert_eq!(layout.stack_size(), 32);
        assert_eq!(layout.frame_size(), 16 + 32 + 16 + 64);
        assert_eq!(layout.fp_offset(), 48);
        assert_eq!(layout.tail_call_cnt_offset(), 56);
        assert_eq!(layout.nvr_offset(Gpr::R31), layout.frame_size() as i16 - 4);
        assert_eq!(layout.nvr_offset(Gpr::R19), layout.frame_size() as i16 - 52);
    }

    #[test]
    fn test_counter_is_depth_independent() {
        for depth in [0, 8, 512, 4096] {
            let layout = StackLayout::new(depth).unwrap();
            let from_entry = i32::from(layout.tail_call_cnt_offset()) - layout.frame_size() as i32;
            assert_eq!(from_entry, i32::from(TAIL_CALL_CNT_ENTRY));
        }
    }

    #[test]
    fn test_stack_too_large() {
        assert_eq!(StackLayout::new(32 * 1024 - 112).unwrap().frame_size(), 32752);
        assert_eq!(
            StackLayout::new(32 * 1024 - 96),
            Err(TranslateError::StackTooLarge { depth: 32 * 1024 - 96 })
        );
        assert!(StackLayout::new(u32::MAX).is_err());
    }
}
