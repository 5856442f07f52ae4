//! Compile command.

use std::path::{Path, PathBuf};

use pjit::runner::builtin_table;
use pjit::{BumpAllocator, CODE_BASE, CODE_SIZE, CompiledUnit, HelperTable, Jit, Program, Result};
use pjit_ppc::decode::disassemble;
use rayon::prelude::*;
use tracing::{error, info};

use super::load_program;
use crate::cli::{CompileArgs, EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Alignment, Status, Table};

/// Handle the `compile` command.
pub fn cmd_compile(
    inputs: &[PathBuf],
    dump: bool,
    jobs: usize,
    options: &CompileArgs,
    silent: bool,
) -> i32 {
    let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool,
        Err(err) => {
            error!(error = %err, "failed to start compile workers");
            return EXIT_FAILURE;
        }
    };
    info!(files = inputs.len(), jobs, "compiling");

    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc).with_config(options.config());
    let helpers = builtin_table();

    let progress = terminal::progress_bar(inputs.len() as u64, "compiling", !silent && inputs.len() > 1);
    let results: Vec<_> = pool.install(|| {
        inputs
            .par_iter()
            .map(|path| {
                let result = compile_file(&jit, path, options, &helpers);
                progress.inc(1);
                (path, result)
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut table = Table::new(&[
        ("program", Alignment::Left),
        ("vm insns", Alignment::Right),
        ("subprogs", Alignment::Right),
        ("native insns", Alignment::Right),
        ("bytes", Alignment::Right),
        ("entry", Alignment::Right),
    ]);
    let mut failed = 0;
    for (path, result) in &results {
        match result {
            Ok((program, unit)) => {
                let native: u32 = unit.programs().iter().map(|p| p.insns()).sum();
                table.push(vec![
                    path.display().to_string(),
                    program.len().to_string(),
                    unit.len().to_string(),
                    native.to_string(),
                    unit.len_bytes().to_string(),
                    format!("{:#010x}", unit.entry()),
                ]);
                if dump {
                    print_dump(path, program, unit);
                }
            }
            Err(err) => {
                failed += 1;
                terminal::status(Status::Failed, format_args!("{}: {err}", path.display()));
            }
        }
    }

    if !silent {
        table.print();
    }
    if failed > 0 {
        terminal::status(
            Status::Warn,
            format_args!("{failed} of {} programs failed to compile", results.len()),
        );
        return EXIT_FAILURE;
    }
    if !silent {
        terminal::status(Status::Done, format_args!("compiled {} programs", results.len()));
    }
    EXIT_SUCCESS
}

fn compile_file(
    jit: &Jit<&BumpAllocator>,
    path: &Path,
    options: &CompileArgs,
    helpers: &HelperTable,
) -> Result<(Program, CompiledUnit)> {
    let program = load_program(path, options.info())?;
    let unit = jit.compile_unit(&program, helpers)?;
    Ok((program, unit))
}

fn print_dump(path: &Path, program: &Program, unit: &CompiledUnit) {
    terminal::header(format_args!("{}: VM", path.display()));
    print!("{}", program.disassemble());
    for (id, compiled) in unit.programs().iter().enumerate() {
        let image = compiled.image();
        terminal::header(format_args!("{}: subprogram {id} at {:#010x}", path.display(), image.entry()));
        print!("{}", disassemble(image.code(), image.entry()));
    }
}
