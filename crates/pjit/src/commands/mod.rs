//! Command implementations.

mod compile;
mod run;

use std::path::Path;

use pjit::{Program, ProgramInfo, Result};

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Compile { .. } => handle_compile(cli),
        Commands::Run { .. } => handle_run(cli),
    }
}

fn handle_compile(cli: &Cli) -> i32 {
    let Commands::Compile {
        inputs,
        dump,
        jobs,
        options,
    } = &cli.command
    else {
        unreachable!("compile command variant mismatch");
    };
    compile::cmd_compile(inputs, *dump, *jobs, options, cli.silent)
}

fn handle_run(cli: &Cli) -> i32 {
    let Commands::Run {
        input,
        ctx_size,
        max_steps,
        options,
    } = &cli.command
    else {
        unreachable!("run command variant mismatch");
    };
    run::cmd_run(input, *ctx_size, *max_steps, options)
}

/// Read a raw program file.
fn load_program(path: &Path, info: ProgramInfo) -> Result<Program> {
    let bytes = std::fs::read(path)?;
    Ok(Program::from_bytes(&bytes, info)?)
}
