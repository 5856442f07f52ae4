//! Translation errors.

use thiserror::Error;

/// Why a program could not be translated. Every variant aborts the
/// compilation; the caller is expected to fall back to interpretation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("instruction {index}: unsupported opcode {code:#04x}: {reason}")]
    Unsupported {
        index: usize,
        code: u8,
        reason: String,
    },
    #[error("instruction {index}: opcode {code:#04x} divides by immediate zero")]
    InvalidImmediate { index: usize, code: u8 },
    #[error("instruction {index}: cannot resolve call target: {reason}")]
    ResolutionFailed { index: usize, reason: String },
    #[error("stack depth {depth} does not fit in a frame")]
    StackTooLarge { depth: u32 },
}

impl TranslateError {
    /// Short label for logs and metrics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unsupported { .. } => "unsupported",
            Self::InvalidImmediate { .. } => "invalid_immediate",
            Self::ResolutionFailed { .. } => "resolution_failed",
            Self::StackTooLarge { .. } => "stack_too_large",
        }
    }

    /// Instruction the error points at, if any.
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::Unsupported { index, .. }
            | Self::InvalidImmediate { index, .. }
            | Self::ResolutionFailed { index, .. } => Some(*index),
            Self::StackTooLarge { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;
