//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pjit::{EmitConfig, MAX_TAIL_CALL_CNT, ProgramInfo};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "pjit")]
#[command(about = "VM bytecode to 32-bit PowerPC JIT compiler")]
#[command(version)]
pub struct Cli {
    /// Print compile counters and image sizes on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Log per-pass compiler detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only report errors; hides the progress bar and result table
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile program files and report image sizes
    Compile {
        /// Raw program files (little-endian 8-byte instructions)
        #[arg(value_name = "PROGRAM", required = true)]
        inputs: Vec<PathBuf>,

        /// Print VM and native disassembly
        #[arg(long)]
        dump: bool,

        /// Number of parallel compile jobs (0 = auto)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        #[command(flatten)]
        options: CompileArgs,
    },
    /// Compile a program and execute it on the PowerPC interpreter
    Run {
        /// Raw program file
        #[arg(value_name = "PROGRAM")]
        input: PathBuf,

        /// Bytes of zeroed context memory passed in R1 (0 = pass null)
        #[arg(long, default_value = "0")]
        ctx_size: u32,

        /// Stop after this many native instructions
        #[arg(long, default_value = "10000000")]
        max_steps: u64,

        #[command(flatten)]
        options: CompileArgs,
    },
}

/// Code generation options shared by every command.
#[derive(Args, Clone, Copy, Debug)]
pub struct CompileArgs {
    /// Stack bytes the program uses below R10
    #[arg(long, default_value = "512")]
    pub stack_depth: u32,

    /// Program already zero-extends every 32-bit result
    #[arg(long)]
    pub verifier_zext: bool,

    /// Prefix images with a function descriptor
    #[arg(long)]
    pub descriptors: bool,

    /// Maximum tail-call chain depth
    #[arg(long, default_value_t = MAX_TAIL_CALL_CNT)]
    pub max_tail_calls: u16,
}

impl CompileArgs {
    pub const fn info(&self) -> ProgramInfo {
        ProgramInfo::new()
            .with_stack_depth(self.stack_depth)
            .with_verifier_zext(self.verifier_zext)
    }

    pub const fn config(&self) -> EmitConfig {
        EmitConfig::new()
            .with_function_descriptors(self.descriptors)
            .with_max_tail_calls(self.max_tail_calls)
    }
}
