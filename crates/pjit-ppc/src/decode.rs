//! Decoder and disassembler for the encoded subset.

use std::fmt;

use crate::encode::{opcd, xo};
use crate::reg::{BO_ALWAYS, BO_FALSE, BO_TRUE, Cond, CrBit, Gpr, Spr};

/// Register-register arithmetic (XO-form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Addc,
    Adde,
    Addze,
    Addme,
    Subf,
    Subfc,
    Subfe,
    Subfze,
    Neg,
    Mullw,
    Mulhwu,
    Divwu,
}

impl ArithOp {
    const fn from_xo(xo: u32) -> Option<Self> {
        Some(match xo {
            xo::ADD => Self::Add,
            xo::ADDC => Self::Addc,
            xo::ADDE => Self::Adde,
            xo::ADDZE => Self::Addze,
            xo::ADDME => Self::Addme,
            xo::SUBF => Self::Subf,
            xo::SUBFC => Self::Subfc,
            xo::SUBFE => Self::Subfe,
            xo::SUBFZE => Self::Subfze,
            xo::NEG => Self::Neg,
            xo::MULLW => Self::Mullw,
            xo::MULHWU => Self::Mulhwu,
            xo::DIVWU => Self::Divwu,
            _ => return None,
        })
    }

    const fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Addc => "addc",
            Self::Adde => "adde",
            Self::Addze => "addze",
            Self::Addme => "addme",
            Self::Subf => "subf",
            Self::Subfc => "subfc",
            Self::Subfe => "subfe",
            Self::Subfze => "subfze",
            Self::Neg => "neg",
            Self::Mullw => "mullw",
            Self::Mulhwu => "mulhwu",
            Self::Divwu => "divwu",
        }
    }

    /// Single-operand forms ignore `rb`.
    const fn is_unary(self) -> bool {
        matches!(self, Self::Addze | Self::Addme | Self::Subfze | Self::Neg)
    }
}

/// Register-register logical and shift operations (X-form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Xor,
    Nor,
    Slw,
    Srw,
    Sraw,
}

impl LogicOp {
    const fn from_xo(xo: u32) -> Option<Self> {
        Some(match xo {
            xo::AND => Self::And,
            xo::OR => Self::Or,
            xo::XOR => Self::Xor,
            xo::NOR => Self::Nor,
            xo::SLW => Self::Slw,
            xo::SRW => Self::Srw,
            xo::SRAW => Self::Sraw,
            _ => return None,
        })
    }

    const fn mnemonic(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Nor => "nor",
            Self::Slw => "slw",
            Self::Srw => "srw",
            Self::Sraw => "sraw",
        }
    }
}

/// D-form immediate operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmOp {
    Addi,
    Addis,
    Subfic,
    Mulli,
    Ori,
    Oris,
    Xori,
    Xoris,
    AndiDot,
    AndisDot,
}

impl ImmOp {
    const fn mnemonic(self) -> &'static str {
        match self {
            Self::Addi => "addi",
            Self::Addis => "addis",
            Self::Subfic => "subfic",
            Self::Mulli => "mulli",
            Self::Ori => "ori",
            Self::Oris => "oris",
            Self::Xori => "xori",
            Self::Xoris => "xoris",
            Self::AndiDot => "andi.",
            Self::AndisDot => "andis.",
        }
    }

    /// Logical forms name the destination in the `ra` slot.
    const fn is_logical(self) -> bool {
        matches!(
            self,
            Self::Ori | Self::Oris | Self::Xori | Self::Xoris | Self::AndiDot | Self::AndisDot
        )
    }
}

/// Load/store kinds (D-form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemOp {
    Lbz,
    Lhz,
    Lwz,
    Stb,
    Sth,
    Stw,
    Stwu,
    Lmw,
    Stmw,
}

impl MemOp {
    const fn mnemonic(self) -> &'static str {
        match self {
            Self::Lbz => "lbz",
            Self::Lhz => "lhz",
            Self::Lwz => "lwz",
            Self::Stb => "stb",
            Self::Sth => "sth",
            Self::Stw => "stw",
            Self::Stwu => "stwu",
            Self::Lmw => "lmw",
            Self::Stmw => "stmw",
        }
    }
}

/// A decoded instruction.
///
/// Register fields keep their architectural meaning: for D-form
/// arithmetic and loads/stores, `ra = r0` means literal zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insn {
    Imm { op: ImmOp, rt: Gpr, ra: Gpr, imm: u16 },
    Arith { op: ArithOp, rt: Gpr, ra: Gpr, rb: Gpr },
    Logic { op: LogicOp, ra: Gpr, rs: Gpr, rb: Gpr, rc: bool },
    Srawi { ra: Gpr, rs: Gpr, sh: u32 },
    Rlwinm { ra: Gpr, rs: Gpr, sh: u32, mb: u32, me: u32 },
    Rlwimi { ra: Gpr, rs: Gpr, sh: u32, mb: u32, me: u32 },
    Cmpi { signed: bool, ra: Gpr, imm: u16 },
    Cmp { signed: bool, ra: Gpr, rb: Gpr },
    Mem { op: MemOp, rt: Gpr, d: i16, ra: Gpr },
    Lwarx { rt: Gpr, ra: Gpr, rb: Gpr },
    StwcxDot { rs: Gpr, ra: Gpr, rb: Gpr },
    B { disp: i32, aa: bool, lk: bool },
    Bc { bo: u8, bi: u8, disp: i32, lk: bool },
    Bclr { bo: u8, bi: u8, lk: bool },
    Bcctr { bo: u8, bi: u8, lk: bool },
    Mfspr { rt: Gpr, spr: Spr },
    Mtspr { spr: Spr, rs: Gpr },
    Tw { to: u8, ra: Gpr, rb: Gpr },
}

#[inline]
const fn field(word: u32, shift: u32) -> u32 {
    (word >> shift) & 0x1f
}

/// Decode one instruction word, or `None` outside the supported subset.
pub fn decode(word: u32) -> Option<Insn> {
    let rt = Gpr::from_field(field(word, 21));
    let ra = Gpr::from_field(field(word, 16));
    let rb = Gpr::from_field(field(word, 11));
    let imm = word as u16;
    let d = imm as i16;

    let imm_op = |op| Some(Insn::Imm { op, rt, ra, imm });
    let mem_op = |op| Some(Insn::Mem { op, rt, d, ra });

    match word >> 26 {
        opcd::ADDI => imm_op(ImmOp::Addi),
        opcd::ADDIS => imm_op(ImmOp::Addis),
        opcd::SUBFIC => imm_op(ImmOp::Subfic),
        opcd::MULLI => imm_op(ImmOp::Mulli),
        opcd::ORI => imm_op(ImmOp::Ori),
        opcd::ORIS => imm_op(ImmOp::Oris),
        opcd::XORI => imm_op(ImmOp::Xori),
        opcd::XORIS => imm_op(ImmOp::Xoris),
        opcd::ANDI => imm_op(ImmOp::AndiDot),
        opcd::ANDIS => imm_op(ImmOp::AndisDot),
        opcd::CMPI | opcd::CMPLI => {
            // cr0 with L = 0 only.
            if field(word, 21) != 0 {
                return None;
            }
            Some(Insn::Cmpi {
                signed: word >> 26 == opcd::CMPI,
                ra,
                imm,
            })
        }
        opcd::LBZ => mem_op(MemOp::Lbz),
        opcd::LHZ => mem_op(MemOp::Lhz),
        opcd::LWZ => mem_op(MemOp::Lwz),
        opcd::STB => mem_op(MemOp::Stb),
        opcd::STH => mem_op(MemOp::Sth),
        opcd::STW => mem_op(MemOp::Stw),
        opcd::STWU => mem_op(MemOp::Stwu),
        opcd::LMW => mem_op(MemOp::Lmw),
        opcd::STMW => mem_op(MemOp::Stmw),
        opcd::RLWINM | opcd::RLWIMI => {
            if word & 1 != 0 {
                return None;
            }
            let (rs, ra) = (rt, ra);
            let sh = field(word, 11);
            let mb = field(word, 6);
            let me = field(word, 1);
            Some(if word >> 26 == opcd::RLWINM {
                Insn::Rlwinm { ra, rs, sh, mb, me }
            } else {
                Insn::Rlwimi { ra, rs, sh, mb, me }
            })
        }
        opcd::B => {
            let disp = ((word & 0x03ff_fffc) as i32) << 6 >> 6;
            Some(Insn::B {
                disp,
                aa: word & 2 != 0,
                lk: word & 1 != 0,
            })
        }
        opcd::BC => {
            if word & 2 != 0 {
                return None;
            }
            Some(Insn::Bc {
                bo: field(word, 21) as u8,
                bi: field(word, 16) as u8,
                disp: i32::from((word & 0xfffc) as u16 as i16),
                lk: word & 1 != 0,
            })
        }
        opcd::XL => {
            let bo = field(word, 21) as u8;
            let bi = field(word, 16) as u8;
            let lk = word & 1 != 0;
            match (word >> 1) & 0x3ff {
                xo::BCLR => Some(Insn::Bclr { bo, bi, lk }),
                xo::BCCTR => Some(Insn::Bcctr { bo, bi, lk }),
                _ => None,
            }
        }
        opcd::X => decode_x(word, rt, ra, rb),
        _ => None,
    }
}

fn decode_x(word: u32, rt: Gpr, ra: Gpr, rb: Gpr) -> Option<Insn> {
    let rc = word & 1 != 0;
    let xo10 = (word >> 1) & 0x3ff;
    // XO-form arithmetic has OE in bit 10 and a 9-bit extended opcode.
    let xo9 = (word >> 1) & 0x1ff;

    if let Some(op) = LogicOp::from_xo(xo10) {
        return Some(Insn::Logic {
            op,
            ra,
            rs: rt,
            rb,
            rc,
        });
    }

    match xo10 {
        xo::SRAWI if !rc => {
            return Some(Insn::Srawi {
                ra,
                rs: rt,
                sh: rb.field(),
            });
        }
        xo::CMP | xo::CMPL if !rc && rt.field() == 0 => {
            return Some(Insn::Cmp {
                signed: xo10 == xo::CMP,
                ra,
                rb,
            });
        }
        xo::LWARX if !rc => return Some(Insn::Lwarx { rt, ra, rb }),
        xo::STWCX if rc => return Some(Insn::StwcxDot { rs: rt, ra, rb }),
        xo::TW => {
            return Some(Insn::Tw {
                to: rt.num(),
                ra,
                rb,
            });
        }
        xo::MFSPR | xo::MTSPR => {
            let raw = (word >> 11) & 0x3ff;
            let spr = Spr::from_num(((raw & 0x1f) << 5) | (raw >> 5))?;
            return Some(if xo10 == xo::MFSPR {
                Insn::Mfspr { rt, spr }
            } else {
                Insn::Mtspr { spr, rs: rt }
            });
        }
        _ => {}
    }

    if rc || word & (1 << 10) != 0 {
        return None;
    }
    ArithOp::from_xo(xo9).map(|op| Insn::Arith { op, rt, ra, rb })
}

fn cond_name(bo: u8, bi: u8) -> Option<&'static str> {
    let bit = match bi {
        0 => CrBit::Lt,
        1 => CrBit::Gt,
        2 => CrBit::Eq,
        3 => CrBit::So,
        _ => return None,
    };
    match bo {
        BO_TRUE => Some(Cond::when(bit).mnemonic()),
        BO_FALSE => Some(Cond::unless(bit).mnemonic()),
        _ => None,
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Imm {
                op: ImmOp::Ori,
                rt: Gpr::R0,
                ra: Gpr::R0,
                imm: 0,
            } => f.write_str("nop"),
            Self::Imm {
                op: ImmOp::Addi,
                rt,
                ra: Gpr::R0,
                imm,
            } => write!(f, "li {rt}, {}", imm as i16),
            Self::Imm {
                op: ImmOp::Addis,
                rt,
                ra: Gpr::R0,
                imm,
            } => write!(f, "lis {rt}, {:#x}", imm),
            Self::Imm { op, rt, ra, imm } if op.is_logical() => {
                write!(f, "{} {ra}, {rt}, {imm:#x}", op.mnemonic())
            }
            Self::Imm { op, rt, ra, imm } => {
                write!(f, "{} {rt}, {ra}, {}", op.mnemonic(), imm as i16)
            }
            Self::Arith { op, rt, ra, .. } if op.is_unary() => {
                write!(f, "{} {rt}, {ra}", op.mnemonic())
            }
            Self::Arith { op, rt, ra, rb } => write!(f, "{} {rt}, {ra}, {rb}", op.mnemonic()),
            Self::Logic {
                op: LogicOp::Or,
                ra,
                rs,
                rb,
                rc: false,
            } if rs == rb => write!(f, "mr {ra}, {rs}"),
            Self::Logic { op, ra, rs, rb, rc } => write!(
                f,
                "{}{} {ra}, {rs}, {rb}",
                op.mnemonic(),
                if rc { "." } else { "" }
            ),
            Self::Srawi { ra, rs, sh } => write!(f, "srawi {ra}, {rs}, {sh}"),
            Self::Rlwinm { ra, rs, sh, mb, me } => {
                write!(f, "rlwinm {ra}, {rs}, {sh}, {mb}, {me}")
            }
            Self::Rlwimi { ra, rs, sh, mb, me } => {
                write!(f, "rlwimi {ra}, {rs}, {sh}, {mb}, {me}")
            }
            Self::Cmpi { signed: true, ra, imm } => write!(f, "cmpwi {ra}, {}", imm as i16),
            Self::Cmpi { signed: false, ra, imm } => write!(f, "cmplwi {ra}, {imm}"),
            Self::Cmp { signed, ra, rb } => {
                write!(f, "{} {ra}, {rb}", if signed { "cmpw" } else { "cmplw" })
            }
            Self::Mem { op, rt, d, ra } => write!(f, "{} {rt}, {d}({ra})", op.mnemonic()),
            Self::Lwarx { rt, ra, rb } => write!(f, "lwarx {rt}, {ra}, {rb}"),
            Self::StwcxDot { rs, ra, rb } => write!(f, "stwcx. {rs}, {ra}, {rb}"),
            Self::B { disp, aa, lk } => write!(
                f,
                "b{}{} .{disp:+}",
                if lk { "l" } else { "" },
                if aa { "a" } else { "" }
            ),
            Self::Bc { bo, bi, disp, lk } => match cond_name(bo, bi) {
                Some(name) => write!(f, "b{name}{} .{disp:+}", if lk { "l" } else { "" }),
                None => write!(f, "bc {bo}, {bi}, .{disp:+}"),
            },
            Self::Bclr {
                bo: BO_ALWAYS,
                lk,
                ..
            } => write!(f, "blr{}", if lk { "l" } else { "" }),
            Self::Bclr { bo, bi, lk } => write!(f, "bclr{} {bo}, {bi}", if lk { "l" } else { "" }),
            Self::Bcctr {
                bo: BO_ALWAYS,
                lk,
                ..
            } => write!(f, "bctr{}", if lk { "l" } else { "" }),
            Self::Bcctr { bo, bi, lk } => {
                write!(f, "bcctr{} {bo}, {bi}", if lk { "l" } else { "" })
            }
            Self::Mfspr { rt, spr: Spr::Lr } => write!(f, "mflr {rt}"),
            Self::Mfspr { rt, spr } => write!(f, "mfspr {rt}, {}", spr as u16),
            Self::Mtspr { spr: Spr::Lr, rs } => write!(f, "mtlr {rs}"),
            Self::Mtspr { spr: Spr::Ctr, rs } => write!(f, "mtctr {rs}"),
            Self::Mtspr { spr, rs } => write!(f, "mtspr {}, {rs}", spr as u16),
            Self::Tw { to: 31, ra: Gpr::R0, rb: Gpr::R0 } => f.write_str("trap"),
            Self::Tw { to, ra, rb } => write!(f, "tw {to}, {ra}, {rb}"),
        }
    }
}

/// Render a code buffer, one instruction per line, with byte offsets
/// relative to `base`.
pub fn disassemble(words: &[u32], base: u32) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    for (i, &word) in words.iter().enumerate() {
        let addr = base.wrapping_add(i as u32 * 4);
        let _ = match decode(word) {
            Some(insn) => writeln!(out, "{addr:08x}:  {word:08x}  {insn}"),
            None => writeln!(out, "{addr:08x}:  {word:08x}  .long {word:#010x}"),
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{self, NOP, TRAP};

    fn text(word: u32) -> String {
        decode(word).map(|i| i.to_string()).unwrap_or_default()
    }

    #[test]
    fn test_disassembles_common_forms() {
        assert_eq!(text(NOP), "nop");
        assert_eq!(text(TRAP), "trap");
        assert_eq!(text(encode::BLR), "blr");
        assert_eq!(text(encode::BCTRL), "bctrl");
        assert_eq!(text(encode::li(Gpr::R3, -2)), "li r3, -2");
        assert_eq!(text(encode::mr(Gpr::R4, Gpr::R3)), "mr r4, r3");
        assert_eq!(text(encode::stwu(Gpr::R1, -96, Gpr::R1)), "stwu r1, -96(r1)");
        assert_eq!(text(encode::mflr(Gpr::R0)), "mflr r0");
        assert_eq!(text(encode::mtctr(Gpr::R0)), "mtctr r0");
        assert_eq!(text(encode::bc(Cond::GE, 12)), "bge .+12");
        assert_eq!(text(encode::b(-8)), "b .-8");
        assert_eq!(text(encode::addze(Gpr::R30, Gpr::R30)), "addze r30, r30");
        assert_eq!(text(encode::and_dot(Gpr::R0, Gpr::R3, Gpr::R5)), "and. r0, r3, r5");
        assert_eq!(text(encode::cmplwi(Gpr::R3, 7)), "cmplwi r3, 7");
        assert_eq!(text(encode::andi_dot(Gpr::R0, Gpr::R4, 0xff)), "andi. r0, r4, 0xff");
    }

    #[test]
    fn test_decode_fields() {
        assert_eq!(
            decode(encode::rlwimi(Gpr::R3, Gpr::R4, 8, 16, 23)),
            Some(Insn::Rlwimi {
                ra: Gpr::R3,
                rs: Gpr::R4,
                sh: 8,
                mb: 16,
                me: 23,
            })
        );
        assert_eq!(
            decode(encode::subfe(Gpr::R3, Gpr::R5, Gpr::R3)),
            Some(Insn::Arith {
                op: ArithOp::Subfe,
                rt: Gpr::R3,
                ra: Gpr::R5,
                rb: Gpr::R3,
            })
        );
        assert_eq!(decode(0), None);
    }

    #[test]
    fn test_disassemble_listing() {
        let listing = disassemble(&[NOP, encode::BLR], 0x1000);
        assert_eq!(
            listing,
            "00001000:  60000000  nop\n00001004:  4e800020  blr\n"
        );
    }
}
