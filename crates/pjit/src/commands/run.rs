//! Run command.

use std::path::Path;

use pjit::runner::CTX_BASE;
use pjit::{BumpAllocator, CODE_BASE, CODE_SIZE, Jit, Result, Runner};
use tracing::{error, info};

use super::load_program;
use crate::cli::{CompileArgs, EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal::{self, Status};

/// Handle the `run` command.
pub fn cmd_run(input: &Path, ctx_size: u32, max_steps: u64, options: &CompileArgs) -> i32 {
    info!(input = %input.display(), "running");
    match run(input, ctx_size, max_steps, options) {
        Ok((r0, steps)) => {
            println!("{r0}");
            terminal::status(Status::Info, format_args!("R0 = {r0:#018x} after {steps} instructions"));
            EXIT_SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run failed");
            EXIT_FAILURE
        }
    }
}

fn run(input: &Path, ctx_size: u32, max_steps: u64, options: &CompileArgs) -> Result<(u64, u64)> {
    let program = load_program(input, options.info())?;

    let mut runner = Runner::new().with_max_steps(max_steps);
    let helpers = runner.bind_builtins();

    let alloc = BumpAllocator::new(CODE_BASE, CODE_SIZE);
    let jit = Jit::new(&alloc).with_config(options.config());
    let unit = jit.compile_unit(&program, &helpers)?;
    runner.load_unit(&unit)?;

    let ctx = if ctx_size == 0 {
        0
    } else {
        runner.map(CTX_BASE, ctx_size);
        CTX_BASE
    };
    let r0 = runner.call(unit.entry(), ctx)?;
    Ok((r0, runner.steps()))
}
