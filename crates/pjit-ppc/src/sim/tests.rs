use super::*;
use crate::encode::*;
use crate::reg::{Cond, Gpr::*};

const CODE: u32 = 0x1000;
const STACK_TOP: u32 = 0x2_0000;

fn machine(words: &[u32]) -> Machine {
    let mut m = Machine::new().with_max_steps(10_000);
    m.load_code(CODE, words).unwrap();
    m.mem.map(STACK_TOP - 0x1000, 0x1000);
    m
}

fn run(words: &[u32]) -> (Machine, u64) {
    let mut m = machine(words);
    let ret = m.call(CODE, STACK_TOP - 16, 0).unwrap();
    (m, ret)
}

#[test]
fn test_carry_chain() {
    // r3:r4 = 0x0000_0000_ffff_ffff + 1
    let (m, ret) = run(&[
        li(R4, -1),
        li(R3, 0),
        li(R5, 1),
        addc(R4, R4, R5),
        addze(R3, R3),
        BLR,
    ]);
    assert_eq!(ret, 0x1_0000_0000);
    assert!(!m.cpu.ca);
}

#[test]
fn test_negate_pair() {
    for (value, expected) in [(1u64, u64::MAX), (0, 0), (u64::MAX, 1), (1 << 32, 0xffff_ffff_0000_0000)] {
        let mut m = machine(&[subfic(R4, R4, 0), subfze(R3, R3), BLR]);
        m.cpu.set_pair(3, 4, value);
        m.cpu.gpr[1] = STACK_TOP - 16;
        m.cpu.lr = RETURN_ADDR;
        m.cpu.pc = CODE;
        assert_eq!(m.run().unwrap(), expected, "neg {value:#x}");
    }
}

#[test]
fn test_subtract_with_borrow() {
    // 0x1_0000_0000 - 1 = 0xffff_ffff
    let (_, ret) = run(&[
        li(R3, 1),
        li(R4, 0),
        li(R5, 0),
        li(R6, 1),
        subfc(R4, R6, R4),
        subfe(R3, R5, R3),
        BLR,
    ]);
    assert_eq!(ret, 0xffff_ffff);
}

#[test]
fn test_byte_swap_with_rotates() {
    let (m, _) = run(&[
        lis(R5, 0x1122),
        ori(R5, R5, 0x3344),
        rlwinm(R0, R5, 8, 0, 31),
        rlwimi(R0, R5, 24, 0, 7),
        rlwimi(R0, R5, 24, 16, 23),
        mr(R4, R0),
        BLR,
    ]);
    assert_eq!(m.cpu.gpr[4], 0x4433_2211);
}

#[test]
fn test_shifts() {
    let (m, _) = run(&[
        li(R5, -16),
        srawi(R6, R5, 2),
        li(R7, 40),
        slw(R8, R5, R7),
        srwi(R9, R5, 28),
        BLR,
    ]);
    assert_eq!(m.cpu.gpr[6], (-4i32) as u32);
    assert_eq!(m.cpu.gpr[8], 0);
    assert_eq!(m.cpu.gpr[9], 0xf);
}

#[test]
fn test_multiply_high_and_divide() {
    let (m, _) = run(&[
        li(R5, -1),
        li(R6, 2),
        mulhwu(R7, R5, R6),
        mullw(R8, R5, R6),
        li(R9, 7),
        divwu(R10, R9, R6),
        li(R11, 0),
        divwu(R12, R9, R11),
        BLR,
    ]);
    assert_eq!(m.cpu.gpr[7], 1);
    assert_eq!(m.cpu.gpr[8], 0xffff_fffe);
    assert_eq!(m.cpu.gpr[10], 3);
    assert_eq!(m.cpu.gpr[12], 0);
}

#[test]
fn test_conditional_branches() {
    // r4 = (r5 <s r6) ? 1 : 2 with r5 = -1, r6 = 1
    let (_, ret) = run(&[
        li(R3, 0),
        li(R5, -1),
        li(R6, 1),
        cmpw(R5, R6),
        bc(Cond::LT, 12),
        li(R4, 2),
        BLR,
        li(R4, 1),
        BLR,
    ]);
    assert_eq!(ret, 1);

    // Unsigned: 0xffff_ffff is not below 1.
    let (_, ret) = run(&[
        li(R3, 0),
        li(R5, -1),
        cmplwi(R5, 1),
        bc(Cond::LT, 12),
        li(R4, 2),
        BLR,
        li(R4, 1),
        BLR,
    ]);
    assert_eq!(ret, 2);
}

#[test]
fn test_frame_and_multiple_words() {
    let (m, _) = run(&[
        li(R30, 7),
        li(R31, 9),
        stwu(R1, -32, R1),
        stmw(R30, 24, R1),
        li(R30, 0),
        li(R31, 0),
        lmw(R30, 24, R1),
        lwz(R5, 0, R1),
        addi(R1, R1, 32),
        BLR,
    ]);
    assert_eq!(m.cpu.gpr[30], 7);
    assert_eq!(m.cpu.gpr[31], 9);
    // Back chain holds the caller's stack pointer.
    assert_eq!(m.cpu.gpr[5], STACK_TOP - 16);
    assert_eq!(m.cpu.gpr[1], STACK_TOP - 16);
}

#[test]
fn test_reservation_loop() {
    let counter = STACK_TOP - 0x100;
    let mut m = machine(&[
        lis(R5, (counter >> 16) as i16),
        ori(R5, R5, counter as u16),
        li(R6, 0),
        li(R7, 5),
        lwarx(R0, R6, R5),
        add(R0, R0, R7),
        stwcx_dot(R0, R6, R5),
        bc(Cond::NE, -12),
        BLR,
    ]);
    m.mem.write_u32(counter, 10).unwrap();
    m.call(CODE, STACK_TOP - 16, 0).unwrap();
    assert_eq!(m.mem.read_u32(counter).unwrap(), 15);
}

#[test]
fn test_native_call_through_ctr() {
    let helper = 0x4000_0000;
    let mut m = machine(&[
        mflr(R0),
        stw(R0, 4, R1),
        stwu(R1, -16, R1),
        li(R3, 0),
        li(R4, 20),
        li(R5, 0),
        li(R6, 22),
        lis(R0, (helper >> 16) as i16),
        ori(R0, R0, helper as u16),
        mtctr(R0),
        BCTRL,
        addi(R1, R1, 16),
        lwz(R0, 4, R1),
        mtlr(R0),
        BLR,
    ]);
    m.register_native(helper, |_, args| args[0] + args[1]);
    assert_eq!(m.call(CODE, STACK_TOP - 16, 0).unwrap(), 42);
}

#[test]
fn test_trap_and_limits() {
    let mut m = machine(&[TRAP]);
    assert_eq!(
        m.call(CODE, STACK_TOP - 16, 0),
        Err(SimError::Trap { pc: CODE })
    );

    let mut m = machine(&[b(0)]).with_max_steps(100);
    assert_eq!(
        m.call(CODE, STACK_TOP - 16, 0),
        Err(SimError::StepLimit { limit: 100 })
    );

    let mut m = machine(&[0]);
    assert_eq!(
        m.call(CODE, STACK_TOP - 16, 0),
        Err(SimError::IllegalInstruction { pc: CODE, word: 0 })
    );

    let mut m = machine(&[lwz(R3, 0, R0)]);
    assert_eq!(
        m.call(CODE, STACK_TOP - 16, 0),
        Err(SimError::Fault { addr: 0 })
    );
}
