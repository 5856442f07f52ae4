//! Programs and the facts the loader attaches to them.

use std::fmt::Write as _;

use thiserror::Error;

use crate::insn::{INSN_SIZE, Insn};
use crate::op::{CallTarget, DecodeError, Op, decode};

/// Program loading errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("program is empty")]
    Empty,
    #[error("program length {len} is not a multiple of {INSN_SIZE}")]
    Misaligned { len: usize },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("instruction {index}: call target {target} is not a subprogram entry")]
    BadCallTarget { index: usize, target: i64 },
}

/// Facts established about a program before it reaches the compiler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    /// Bytes of VM stack the program addresses below the frame pointer.
    pub stack_depth: u32,
    /// Program is entered through a subprogram call with its arguments
    /// already in place.
    pub subprog: bool,
    /// Every 32-bit result is already followed by an explicit zero
    /// extension, so the compiler need not clear upper halves itself.
    pub verifier_zext: bool,
}

impl ProgramInfo {
    pub const fn new() -> Self {
        Self {
            stack_depth: 0,
            subprog: false,
            verifier_zext: false,
        }
    }

    #[must_use]
    pub const fn with_stack_depth(mut self, stack_depth: u32) -> Self {
        self.stack_depth = stack_depth;
        self
    }

    #[must_use]
    pub const fn with_subprog(mut self, subprog: bool) -> Self {
        self.subprog = subprog;
        self
    }

    #[must_use]
    pub const fn with_verifier_zext(mut self, verifier_zext: bool) -> Self {
        self.verifier_zext = verifier_zext;
        self
    }
}

/// An ordered instruction sequence plus its [`ProgramInfo`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    insns: Vec<Insn>,
    info: ProgramInfo,
}

impl Program {
    pub const fn new(insns: Vec<Insn>, info: ProgramInfo) -> Self {
        Self { insns, info }
    }

    /// Parse raw little-endian instruction slots.
    pub fn from_bytes(bytes: &[u8], info: ProgramInfo) -> Result<Self, ProgramError> {
        if bytes.is_empty() {
            return Err(ProgramError::Empty);
        }
        if bytes.len() % INSN_SIZE != 0 {
            return Err(ProgramError::Misaligned { len: bytes.len() });
        }
        let insns = bytes
            .chunks_exact(INSN_SIZE)
            .map(|chunk| {
                let mut slot = [0u8; INSN_SIZE];
                slot.copy_from_slice(chunk);
                Insn::from_bytes(slot)
            })
            .collect();
        Ok(Self { insns, info })
    }

    /// Serialize back to raw slots.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.insns.iter().flat_map(|insn| insn.to_bytes()).collect()
    }

    #[inline]
    pub fn insns(&self) -> &[Insn] {
        &self.insns
    }

    #[inline]
    pub const fn info(&self) -> &ProgramInfo {
        &self.info
    }

    #[must_use]
    pub fn with_info(mut self, info: ProgramInfo) -> Self {
        self.info = info;
        self
    }

    /// Number of instruction slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.insns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    #[inline]
    pub fn decode(&self, index: usize) -> Result<Op, DecodeError> {
        decode(&self.insns, index)
    }

    /// Walk operations in program order, yielding each with its slot index.
    pub fn ops(&self) -> Ops<'_> {
        Ops {
            insns: &self.insns,
            index: 0,
        }
    }

    /// Whether any instruction calls another subprogram.
    pub fn has_local_calls(&self) -> bool {
        self.ops()
            .any(|(_, op)| matches!(op, Ok(Op::Call(CallTarget::Local(_)))))
    }

    /// Split a multi-function program at subprogram-call targets.
    ///
    /// Returns the subprograms in address order; index 0 is the entry
    /// program. Every local call in the result carries the callee's
    /// subprogram id as its immediate. Callees are marked as callable
    /// subprograms; the stack depth applies to each of them.
    pub fn split(&self) -> Result<Vec<Self>, ProgramError> {
        if self.insns.is_empty() {
            return Err(ProgramError::Empty);
        }

        let mut calls = Vec::new();
        let mut starts = vec![0usize];
        for (index, op) in self.ops() {
            if let Op::Call(CallTarget::Local(rel)) = op? {
                let target = index as i64 + 1 + i64::from(rel);
                if target <= 0 || target >= self.insns.len() as i64 {
                    return Err(ProgramError::BadCallTarget { index, target });
                }
                calls.push((index, target as usize));
                starts.push(target as usize);
            }
        }
        starts.sort_unstable();
        starts.dedup();

        let mut insns = self.insns.clone();
        for (index, target) in calls {
            let id = starts.binary_search(&target).map_err(|_| ProgramError::BadCallTarget {
                index,
                target: target as i64,
            })?;
            insns[index].imm = id as i32;
        }

        let programs = starts
            .iter()
            .enumerate()
            .map(|(id, &start)| {
                let end = starts.get(id + 1).copied().unwrap_or(insns.len());
                Self {
                    insns: insns[start..end].to_vec(),
                    info: self.info.with_subprog(id != 0),
                }
            })
            .collect();
        Ok(programs)
    }

    /// Render one line per operation.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (index, op) in self.ops() {
            let _ = match op {
                Ok(op) => writeln!(out, "{index:5}: {op}"),
                Err(err) => writeln!(out, "{index:5}: <{err}>"),
            };
        }
        out
    }
}

/// Iterator returned by [`Program::ops`].
pub struct Ops<'a> {
    insns: &'a [Insn],
    index: usize,
}

impl Iterator for Ops<'_> {
    type Item = (usize, Result<Op, DecodeError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.insns.len() {
            return None;
        }
        let index = self.index;
        let op = decode(self.insns, index);
        self.index += op.as_ref().map_or(1, Op::slots);
        Some((index, op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm;
    use crate::insn::Reg;

    #[test]
    fn test_from_bytes() {
        let prog = Program::new(vec![asm::mov64_imm(Reg::R0, 5), asm::exit()], ProgramInfo::new());
        let bytes = prog.to_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(Program::from_bytes(&bytes, ProgramInfo::new()).unwrap(), prog);
        assert_eq!(
            Program::from_bytes(&bytes[..12], ProgramInfo::new()),
            Err(ProgramError::Misaligned { len: 12 })
        );
        assert_eq!(Program::from_bytes(&[], ProgramInfo::new()), Err(ProgramError::Empty));
    }

    #[test]
    fn test_ops_skip_wide_immediate() {
        let [lo, hi] = asm::ld_imm64(Reg::R1, 1);
        let prog = Program::new(vec![lo, hi, asm::exit()], ProgramInfo::new());
        let indices: Vec<usize> = prog.ops().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_split_rewrites_call_targets() {
        // 0: call +2 -> 3
        // 1: exit-bound mov
        // 2: exit
        // 3: mov (callee)
        // 4: exit
        let prog = Program::new(
            vec![
                asm::call_local(2),
                asm::mov64_imm(Reg::R0, 1),
                asm::exit(),
                asm::mov64_imm(Reg::R0, 2),
                asm::exit(),
            ],
            ProgramInfo::new().with_stack_depth(32),
        );
        assert!(prog.has_local_calls());
        let parts = prog.split().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 3);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[0].insns()[0].imm, 1);
        assert!(!parts[0].info().subprog);
        assert!(parts[1].info().subprog);
        assert_eq!(parts[1].info().stack_depth, 32);
    }

    #[test]
    fn test_split_rejects_bad_target() {
        let prog = Program::new(vec![asm::call_local(-1), asm::exit()], ProgramInfo::new());
        assert_eq!(
            prog.split(),
            Err(ProgramError::BadCallTarget { index: 0, target: 0 })
        );
    }
}
