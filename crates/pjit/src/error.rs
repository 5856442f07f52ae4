use pjit_emit::TranslateError;
use pjit_isa::ProgramError;
use pjit_ppc::sim::SimError;
use thiserror::Error;

/// JIT errors.
///
/// Every variant leaves the program uncompiled; callers fall back to
/// interpreting it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("translation failed: {0}")]
    Translate(#[from] TranslateError),
    #[error("could not allocate {bytes} bytes for the image")]
    AllocationFailed { bytes: u32 },
    #[error("subprogram {id}: {reason}")]
    ResolutionFailed { id: usize, reason: String },
    #[error("code length changed between passes: expected {expected} instructions, got {actual}")]
    LengthMismatch { expected: u32, actual: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid program: {0}")]
    Program(#[from] ProgramError),
    #[error("execution failed: {0}")]
    Execution(#[from] SimError),
}

impl Error {
    /// Short label used for the failure metric.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Translate(err) => err.kind(),
            Self::AllocationFailed { .. } => "allocation_failed",
            Self::ResolutionFailed { .. } => "resolution_failed",
            Self::LengthMismatch { .. } => "length_mismatch",
            Self::Io(_) => "io",
            Self::Program(_) => "program",
            Self::Execution(_) => "execution",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
