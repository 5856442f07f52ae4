//! Compile programs and execute them on the interpreter.

use pjit::{
    BumpAllocator, CODE_BASE, CODE_SIZE, Compiled, EmitConfig, Error, HelperTable, Jit, Program,
    ProgramInfo, Runner, TranslateError,
};
use pjit_emit::{CallKind, CallSite, NoCalls, Resolution};
use pjit_isa::asm::*;
use pjit_isa::opcode::{alu, jmp, size};
use pjit_isa::{Insn, Reg};
use pjit_ppc::decode::{Insn as Word, MemOp, decode};

fn program(insns: &[Insn]) -> Program {
    Program::new(insns.to_vec(), ProgramInfo::new().with_stack_depth(64))
}

fn run_unit(program: &Program, config: EmitConfig) -> u64 {
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc).with_config(config);
    let mut runner = Runner::new();
    let helpers = runner.bind_builtins();
    let unit = jit.compile_unit(program, &helpers).unwrap();
    runner.load_unit(&unit).unwrap();
    runner.call(unit.entry(), 0).unwrap()
}

fn run(insns: &[Insn]) -> u64 {
    run_unit(&program(insns), EmitConfig::default())
}

/// Register numbers of every `stmw`/`lmw` in `words`.
fn block_saves(words: &[u32]) -> Vec<(MemOp, u8)> {
    words
        .iter()
        .filter_map(|&w| match decode(w) {
            Some(Word::Mem { op, rt, .. }) if matches!(op, MemOp::Stmw | MemOp::Lmw) => {
                Some((op, rt.num()))
            }
            _ => None,
        })
        .collect()
}

/// `main` calls a subprogram that doubles R1, then adds one.
fn two_subprograms() -> Program {
    program(&[
        mov64_imm(Reg::R1, 20),
        call_local(2),
        alu64_imm(alu::ADD, Reg::R0, 1),
        exit(),
        mov64_reg(Reg::R0, Reg::R1),
        alu64_imm(alu::MUL, Reg::R0, 2),
        exit(),
    ])
}

#[test]
fn test_add_immediate_returns_twelve() {
    let r0 = run(&[mov64_imm(Reg::R0, 5), alu64_imm(alu::ADD, Reg::R0, 7), exit()]);
    assert_eq!(r0, 12);
    assert_eq!(r0 >> 32, 0);
}

#[test]
fn test_add64_carry_into_high_half() {
    let [lo, hi] = ld_imm64(Reg::R0, 0xffff_ffff);
    let r0 = run(&[
        lo,
        hi,
        mov64_imm(Reg::R1, 1),
        alu64_reg(alu::ADD, Reg::R0, Reg::R1),
        exit(),
    ]);
    assert_eq!(r0, 0x1_0000_0000);
}

#[test]
fn test_sizing_matches_codegen() {
    let [lo, hi] = ld_imm64(Reg::R2, 0x1234_5678_9abc_def0);
    let program = program(&[
        lo,
        hi,
        mov64_imm(Reg::R0, 0),
        jmp_imm(jmp::JEQ, Reg::R2, 0, 3),
        alu64_imm(alu::ADD, Reg::R0, 1),
        alu64_imm(alu::RSH, Reg::R2, 1),
        ja(-4),
        mov64_reg(Reg::R6, Reg::R0),
        stx(size::DW, Reg::Fp, -8, Reg::R6),
        ldx(size::DW, Reg::R0, Reg::Fp, -8),
        exit(),
    ]);
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc);
    let sized = jit.size(&program, &NoCalls).unwrap();
    let compiled = jit.compile(&program, &NoCalls).unwrap();
    assert_eq!(sized, compiled.insns());
    assert_eq!(compiled.image().code().len(), sized as usize);
    // Bit length of the constant.
    assert_eq!(run_unit(&program, EmitConfig::default()), 61);
}

#[test]
fn test_branch_targets_follow_address_table() {
    // Forward then backward: skip over the add, then loop once.
    let program = program(&[
        mov64_imm(Reg::R0, 0),
        mov64_imm(Reg::R1, 2),
        ja(1),
        alu64_imm(alu::ADD, Reg::R0, 100),
        alu64_imm(alu::ADD, Reg::R0, 1),
        alu64_imm(alu::SUB, Reg::R1, 1),
        jmp_imm(jmp::JNE, Reg::R1, 0, -3),
        exit(),
    ]);
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let compiled = Jit::new(&alloc).compile(&program, &NoCalls).unwrap();

    let code = compiled.image().code();
    let addrs = compiled.addrs();
    let targets = |index: usize| -> Vec<u32> {
        let (start, end) = (addrs.get(index) as usize / 4, addrs.get(index + 1) as usize / 4);
        (start..end)
            .filter_map(|i| match decode(code[i]) {
                Some(Word::B { disp, .. } | Word::Bc { disp, .. }) => {
                    Some((4 * i as i64 + i64::from(disp)) as u32)
                }
                _ => None,
            })
            .collect()
    };
    // `ja +1` is a single unconditional branch to instruction 4.
    assert_eq!(addrs.get(3) - addrs.get(2), 4);
    assert_eq!(targets(2), vec![addrs.get(4)]);
    // The backward conditional at 6 lands on instruction 4.
    assert!(targets(6).contains(&addrs.get(4)));

    assert_eq!(run_unit(&program, EmitConfig::default()), 2);
}

#[test]
fn test_branch_offsets_at_displacement_limits() {
    const FILLER: usize = i16::MAX as usize;
    let back = FILLER + 2;

    let mut insns = vec![
        mov64_imm(Reg::R0, 0),
        jmp_imm(jmp::JEQ, Reg::R0, 0, i16::MAX),
    ];
    insns.extend(std::iter::repeat_n(alu64_imm(alu::ADD, Reg::R0, 1), FILLER));
    // Taken once: back to the first filler instruction.
    insns.push(jmp_imm(jmp::JEQ, Reg::R0, 0, i16::MIN));
    insns.push(exit());
    let program = program(&insns);

    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let compiled = Jit::new(&alloc).compile(&program, &NoCalls).unwrap();
    let code = compiled.image().code();
    let addrs = compiled.addrs();
    let targets = |index: usize| -> Vec<u32> {
        let (start, end) = (addrs.get(index) as usize / 4, addrs.get(index + 1) as usize / 4);
        (start..end)
            .filter_map(|i| match decode(code[i]) {
                Some(Word::B { disp, .. } | Word::Bc { disp, .. }) => {
                    Some((4 * i as i64 + i64::from(disp)) as u32)
                }
                _ => None,
            })
            .collect()
    };
    assert!(targets(1).contains(&addrs.get(back)));
    assert!(targets(back).contains(&addrs.get(2)));

    let mut runner = Runner::new();
    runner.load(compiled.image()).unwrap();
    assert_eq!(runner.call(compiled.entry(), 0).unwrap(), FILLER as u64);
}

#[test]
fn test_nonvolatile_saves_cover_used_registers_only() {
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc);

    let compiled = jit
        .compile(&program(&[mov64_imm(Reg::R0, 1), exit()]), &NoCalls)
        .unwrap();
    assert_eq!(
        block_saves(compiled.image().code()),
        vec![(MemOp::Stmw, 30), (MemOp::Lmw, 30)]
    );

    let compiled = jit
        .compile(
            &program(&[
                mov64_imm(Reg::R6, 3),
                mov64_reg(Reg::R0, Reg::R6),
                exit(),
            ]),
            &NoCalls,
        )
        .unwrap();
    assert_eq!(
        block_saves(compiled.image().code()),
        vec![(MemOp::Stmw, 28), (MemOp::Lmw, 28)]
    );

    // Only volatile registers: nothing to save.
    let compiled = jit
        .compile(
            &program(&[mov64_imm(Reg::R2, 3), mov64_reg(Reg::R3, Reg::R2), exit()]),
            &NoCalls,
        )
        .unwrap();
    assert!(block_saves(compiled.image().code()).is_empty());
}

#[test]
fn test_subprogram_fixup_rewrites_only_call_target() {
    let parts = two_subprograms().split().unwrap();
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc);

    let deferred = |site: &CallSite| match site.kind {
        CallKind::Subprog(_) => Some(Resolution::Deferred),
        CallKind::Helper(_) => None,
    };
    let Compiled::Pending(snapshot) = jit.compile_initial(&parts[0], &deferred).unwrap() else {
        panic!("main should wait for its callee");
    };
    let before = snapshot.image().clone();
    // Pending images are not flushed yet.
    assert!(alloc.flushes().is_empty());

    let callee = jit.compile(&parts[1], &NoCalls).unwrap();
    let callee_entry = callee.entry();
    let resolved = move |site: &CallSite| match site.kind {
        CallKind::Subprog(1) => Some(Resolution::Resolved {
            addr: callee_entry,
            fixed: false,
        }),
        _ => None,
    };
    let main = jit.resume(snapshot, &resolved).unwrap();

    assert_eq!(main.image().len_bytes(), before.len_bytes());
    let changed: Vec<usize> = before
        .words()
        .iter()
        .zip(main.image().words())
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();
    let site = main.addrs().get(1) as usize / 4;
    assert_eq!(changed, vec![site, site + 1]);
    assert_eq!(alloc.flushes().len(), 2);

    let mut runner = Runner::new();
    runner.load(main.image()).unwrap();
    runner.load(callee.image()).unwrap();
    assert_eq!(runner.call(main.entry(), 0).unwrap(), 41);
}

#[test]
fn test_compile_unit_resolves_subprograms() {
    assert_eq!(run_unit(&two_subprograms(), EmitConfig::default()), 41);
}

#[test]
fn test_recursive_subprogram() {
    // fact(5) through a self-calling subprogram.
    let program = program(&[
        mov64_imm(Reg::R1, 5),
        call_local(1),
        exit(),
        // fact(R1): R1 <= 1 ? 1 : R1 * fact(R1 - 1)
        jmp_imm(jmp::JGT, Reg::R1, 1, 2),
        mov64_imm(Reg::R0, 1),
        exit(),
        mov64_reg(Reg::R6, Reg::R1),
        alu64_imm(alu::SUB, Reg::R1, 1),
        call_local(-6),
        alu64_reg(alu::MUL, Reg::R0, Reg::R6),
        exit(),
    ]);
    assert_eq!(run_unit(&program, EmitConfig::default()), 120);
}

#[test]
fn test_helper_with_five_arguments() {
    let program = program(&[
        mov64_imm(Reg::R1, 1),
        mov64_imm(Reg::R2, 2),
        mov64_imm(Reg::R3, 3),
        mov64_imm(Reg::R4, 4),
        mov64_imm(Reg::R5, 5),
        call_helper(40),
        exit(),
    ]);
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc);
    let helpers = HelperTable::with_slots(0x5000_0000, [40]);
    let unit = jit.compile_unit(&program, &helpers).unwrap();

    let mut runner = Runner::new();
    runner.bind_helper(0x5000_0000, |_, args| {
        args.iter().enumerate().map(|(i, a)| a << (8 * i)).sum()
    });
    runner.load_unit(&unit).unwrap();
    assert_eq!(runner.call(unit.entry(), 0).unwrap(), 0x05_0403_0201);
}

#[test]
fn test_descriptor_header() {
    let config = EmitConfig::default().with_function_descriptors(true);
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc).with_config(config);
    let compiled = jit
        .compile(&program(&[mov64_imm(Reg::R0, 9), exit()]), &NoCalls)
        .unwrap();
    let image = compiled.image();
    assert!(image.has_descriptor());
    assert_eq!(image.base(), CODE_BASE);
    assert_eq!(image.entry(), CODE_BASE + 8);
    assert_eq!(image.words()[0], image.entry());
    assert_eq!(image.env(), Some(0));
    assert_eq!(alloc.flushes(), vec![(CODE_BASE, image.len_bytes())]);

    let mut runner = Runner::new();
    runner.load(image).unwrap();
    assert_eq!(runner.call(compiled.entry(), 0).unwrap(), 9);
}

#[test]
fn test_context_pointer_in_r1() {
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc);
    let compiled = jit
        .compile(
            &program(&[
                ldx(size::W, Reg::R0, Reg::R1, 4),
                st(size::W, Reg::R1, 0, 77),
                exit(),
            ]),
            &NoCalls,
        )
        .unwrap();

    let ctx = 0x2000_0000;
    let mut runner = Runner::new();
    runner.map(ctx, 16);
    runner.memory_mut().write_u32(ctx + 4, 0xdead_beef).unwrap();
    runner.load(compiled.image()).unwrap();
    assert_eq!(runner.call(compiled.entry(), ctx).unwrap(), 0xdead_beef);
    assert_eq!(runner.memory().read_u32(ctx).unwrap(), 77);
}

#[test]
fn test_failures_are_typed() {
    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc);

    let err = jit
        .compile(&program(&[mov64_imm(Reg::R0, 1), alu64_imm(alu::MOD, Reg::R0, 0), exit()]), &NoCalls)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Translate(TranslateError::InvalidImmediate { index: 1, .. })
    ));

    let err = jit
        .compile(&program(&[alu64_reg(alu::DIV, Reg::R0, Reg::R1), exit()]), &NoCalls)
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported");

    let err = jit
        .compile(&program(&[call_helper(1), exit()]), &NoCalls)
        .unwrap_err();
    assert_eq!(err.kind(), "resolution_failed");

    let huge = Program::new(
        vec![exit()],
        ProgramInfo::new().with_stack_depth(40_000),
    );
    let err = jit.compile(&huge, &NoCalls).unwrap_err();
    assert_eq!(err.kind(), "stack_too_large");

    // Nothing was allocated for any of them.
    assert_eq!(alloc.used(), 0);
}
