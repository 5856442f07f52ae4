//! Structured view of an instruction.
//!
//! [`decode`] turns raw slots into the closed [`Op`] set. Encodings the
//! structured view has no variant for land in [`Op::Other`], so consumers
//! match exhaustively and still have a single arm for everything else.

use std::fmt;

use thiserror::Error;

use crate::insn::{Insn, Reg};
use crate::opcode::{alu, class, class_of, jmp, mode, mode_of, op_of, pseudo, size, size_of, source, source_of};

/// Operand width of an arithmetic or jump instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Width {
    W32,
    W64,
}

/// Second operand: a register or the sign-extended immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Reg(Reg),
    Imm(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Or,
    And,
    Lsh,
    Rsh,
    Neg,
    Mod,
    Xor,
    Mov,
    Arsh,
}

impl AluOp {
    const fn from_code(code: u8) -> Option<Self> {
        Some(match op_of(code) {
            alu::ADD => Self::Add,
            alu::SUB => Self::Sub,
            alu::MUL => Self::Mul,
            alu::DIV => Self::Div,
            alu::OR => Self::Or,
            alu::AND => Self::And,
            alu::LSH => Self::Lsh,
            alu::RSH => Self::Rsh,
            alu::NEG => Self::Neg,
            alu::MOD => Self::Mod,
            alu::XOR => Self::Xor,
            alu::MOV => Self::Mov,
            alu::ARSH => Self::Arsh,
            _ => return None,
        })
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::Div => "/=",
            Self::Or => "|=",
            Self::And => "&=",
            Self::Lsh => "<<=",
            Self::Rsh => ">>=",
            Self::Neg => "= -",
            Self::Mod => "%=",
            Self::Xor => "^=",
            Self::Mov => "=",
            Self::Arsh => "s>>=",
        }
    }
}

/// Memory access size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Size {
    B,
    H,
    W,
    DW,
}

impl Size {
    const fn from_code(code: u8) -> Self {
        match size_of(code) {
            size::B => Self::B,
            size::H => Self::H,
            size::W => Self::W,
            _ => Self::DW,
        }
    }

    #[inline]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::B => 1,
            Self::H => 2,
            Self::W => 4,
            Self::DW => 8,
        }
    }

    const fn c_type(self) -> &'static str {
        match self {
            Self::B => "u8",
            Self::H => "u16",
            Self::W => "u32",
            Self::DW => "u64",
        }
    }
}

/// Target of a byte-order conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Le,
    Be,
}

/// Conditional jump predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JmpCond {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Sgt,
    Sge,
    Slt,
    Sle,
    Set,
}

impl JmpCond {
    const fn from_code(code: u8) -> Option<Self> {
        Some(match op_of(code) {
            jmp::JEQ => Self::Eq,
            jmp::JNE => Self::Ne,
            jmp::JGT => Self::Gt,
            jmp::JGE => Self::Ge,
            jmp::JLT => Self::Lt,
            jmp::JLE => Self::Le,
            jmp::JSGT => Self::Sgt,
            jmp::JSGE => Self::Sge,
            jmp::JSLT => Self::Slt,
            jmp::JSLE => Self::Sle,
            jmp::JSET => Self::Set,
            _ => return None,
        })
    }

    /// Whether the predicate orders operands as signed integers.
    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Sgt | Self::Sge | Self::Slt | Self::Sle)
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Sgt => "s>",
            Self::Sge => "s>=",
            Self::Slt => "s<",
            Self::Sle => "s<=",
            Self::Set => "&",
        }
    }
}

/// What a `CALL` instruction invokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// Helper function id.
    Helper(i32),
    /// Another subprogram. Before splitting this is the relative
    /// instruction offset; after [`crate::Program::split`] it is the
    /// callee's subprogram id.
    Local(i32),
    /// Kernel function by BTF id.
    Kfunc(i32),
}

/// Decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Alu {
        width: Width,
        op: AluOp,
        dst: Reg,
        src: Operand,
        /// Nonzero selects the signed division or sign-extending move
        /// variants.
        off: i16,
    },
    End {
        width: Width,
        order: ByteOrder,
        dst: Reg,
        bits: i32,
    },
    /// Two-slot wide immediate load.
    LoadImm64 { dst: Reg, imm: u64 },
    Load {
        size: Size,
        dst: Reg,
        base: Reg,
        off: i16,
    },
    Store {
        size: Size,
        base: Reg,
        off: i16,
        src: Operand,
    },
    Atomic {
        size: Size,
        base: Reg,
        off: i16,
        src: Reg,
        op: i32,
    },
    Ja { off: i16 },
    Jump {
        width: Width,
        cond: JmpCond,
        dst: Reg,
        src: Operand,
        off: i16,
    },
    Call(CallTarget),
    TailCall,
    Exit,
    /// Any encoding without a structured variant.
    Other { code: u8 },
}

impl Op {
    /// Number of instruction slots this operation occupies.
    #[inline]
    pub const fn slots(&self) -> usize {
        match self {
            Self::LoadImm64 { .. } => 2,
            _ => 1,
        }
    }

    /// Relative branch offset for operations that branch inside the program.
    #[inline]
    pub const fn branch_offset(&self) -> Option<i16> {
        match self {
            Self::Ja { off } | Self::Jump { off, .. } => Some(*off),
            _ => None,
        }
    }
}

/// Instruction decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("instruction {index}: register field {value} out of range")]
    InvalidRegister { index: usize, value: u8 },
    #[error("instruction {index}: wide immediate load is missing its second slot")]
    Truncated { index: usize },
}

fn reg(index: usize, value: u8) -> Result<Reg, DecodeError> {
    Reg::from_u8(value).ok_or(DecodeError::InvalidRegister { index, value })
}

fn operand(insn: &Insn, index: usize) -> Result<Operand, DecodeError> {
    if source_of(insn.code) == source::X {
        Ok(Operand::Reg(reg(index, insn.src)?))
    } else {
        Ok(Operand::Imm(insn.imm))
    }
}

/// Decode the operation starting at slot `index`.
pub fn decode(insns: &[Insn], index: usize) -> Result<Op, DecodeError> {
    let insn = &insns[index];
    let code = insn.code;

    let op = match class_of(code) {
        class::ALU | class::ALU64 => {
            let width = if class_of(code) == class::ALU64 {
                Width::W64
            } else {
                Width::W32
            };
            let dst = reg(index, insn.dst)?;
            if op_of(code) == alu::END {
                let order = if source_of(code) == alu::TO_BE {
                    ByteOrder::Be
                } else {
                    ByteOrder::Le
                };
                Op::End {
                    width,
                    order,
                    dst,
                    bits: insn.imm,
                }
            } else if let Some(op) = AluOp::from_code(code) {
                Op::Alu {
                    width,
                    op,
                    dst,
                    src: operand(insn, index)?,
                    off: insn.off,
                }
            } else {
                Op::Other { code }
            }
        }
        class::LD => {
            if code == class::LD | size::DW | mode::IMM {
                let Some(next) = insns.get(index + 1) else {
                    return Err(DecodeError::Truncated { index });
                };
                let imm = u64::from(insn.imm as u32) | (u64::from(next.imm as u32) << 32);
                Op::LoadImm64 {
                    dst: reg(index, insn.dst)?,
                    imm,
                }
            } else {
                Op::Other { code }
            }
        }
        class::LDX if mode_of(code) == mode::MEM => Op::Load {
            size: Size::from_code(code),
            dst: reg(index, insn.dst)?,
            base: reg(index, insn.src)?,
            off: insn.off,
        },
        class::ST if mode_of(code) == mode::MEM => Op::Store {
            size: Size::from_code(code),
            base: reg(index, insn.dst)?,
            off: insn.off,
            src: Operand::Imm(insn.imm),
        },
        class::STX if mode_of(code) == mode::MEM => Op::Store {
            size: Size::from_code(code),
            base: reg(index, insn.dst)?,
            off: insn.off,
            src: Operand::Reg(reg(index, insn.src)?),
        },
        class::STX if mode_of(code) == mode::ATOMIC => Op::Atomic {
            size: Size::from_code(code),
            base: reg(index, insn.dst)?,
            off: insn.off,
            src: reg(index, insn.src)?,
            op: insn.imm,
        },
        class::JMP | class::JMP32 => {
            let width = if class_of(code) == class::JMP {
                Width::W64
            } else {
                Width::W32
            };
            match (width, op_of(code)) {
                (Width::W64, jmp::JA) => Op::Ja { off: insn.off },
                (Width::W64, jmp::EXIT) => Op::Exit,
                (Width::W64, jmp::TAIL_CALL) => Op::TailCall,
                (Width::W64, jmp::CALL) => Op::Call(match insn.src {
                    pseudo::HELPER => CallTarget::Helper(insn.imm),
                    pseudo::CALL => CallTarget::Local(insn.imm),
                    pseudo::KFUNC_CALL => CallTarget::Kfunc(insn.imm),
                    _ => return Ok(Op::Other { code }),
                }),
                _ => match JmpCond::from_code(code) {
                    Some(cond) => Op::Jump {
                        width,
                        cond,
                        dst: reg(index, insn.dst)?,
                        src: operand(insn, index)?,
                        off: insn.off,
                    },
                    None => Op::Other { code },
                },
            }
        }
        _ => Op::Other { code },
    };
    Ok(op)
}

fn wreg(width: Width, r: Reg) -> String {
    match width {
        Width::W64 => r.to_string(),
        Width::W32 => format!("w{}", r as u8),
    }
}

fn woperand(width: Width, o: Operand) -> String {
    match o {
        Operand::Reg(r) => wreg(width, r),
        Operand::Imm(imm) => format!("{imm:#x}"),
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Alu {
                width,
                op: AluOp::Neg,
                dst,
                ..
            } => write!(f, "{0} = -{0}", wreg(width, dst)),
            Self::Alu {
                width, op, dst, src, ..
            } => write!(f, "{} {} {}", wreg(width, dst), op.symbol(), woperand(width, src)),
            Self::End {
                order, dst, bits, ..
            } => {
                let order = match order {
                    ByteOrder::Le => "le",
                    ByteOrder::Be => "be",
                };
                write!(f, "{dst} = {order}{bits} {dst}")
            }
            Self::LoadImm64 { dst, imm } => write!(f, "{dst} = {imm:#x} ll"),
            Self::Load {
                size,
                dst,
                base,
                off,
            } => write!(f, "{dst} = *({} *)({base} {off:+})", size.c_type()),
            Self::Store {
                size,
                base,
                off,
                src,
            } => write!(
                f,
                "*({} *)({base} {off:+}) = {}",
                size.c_type(),
                woperand(Width::W64, src)
            ),
            Self::Atomic {
                size,
                base,
                off,
                src,
                op,
            } => write!(
                f,
                "lock *({} *)({base} {off:+}) op({op:#x}) {src}",
                size.c_type()
            ),
            Self::Ja { off } => write!(f, "goto {off:+}"),
            Self::Jump {
                width,
                cond,
                dst,
                src,
                off,
            } => write!(
                f,
                "if {} {} {} goto {off:+}",
                wreg(width, dst),
                cond.symbol(),
                woperand(width, src)
            ),
            Self::Call(CallTarget::Helper(id)) => write!(f, "call {id}"),
            Self::Call(CallTarget::Local(target)) => write!(f, "call pc{target:+}"),
            Self::Call(CallTarget::Kfunc(id)) => write!(f, "call kfunc {id}"),
            Self::TailCall => f.write_str("tail_call"),
            Self::Exit => f.write_str("exit"),
            Self::Other { code } => write!(f, "unknown {code:#04x}"),
        }
    }
}
