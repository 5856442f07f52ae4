//! pjit CLI - VM bytecode to 32-bit PowerPC JIT

mod cli;
mod commands;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let metrics_handle = if cli.metrics {
        pjit::metrics::CliRecorder::new().install()
    } else {
        None
    };
    pjit::metrics::init();

    let default_level = if cli.verbose {
        "pjit=debug"
    } else if cli.silent {
        "pjit=error"
    } else {
        "pjit=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_level.parse().expect("valid directive")),
        )
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = commands::run_command(&cli);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }

    std::process::exit(exit_code);
}
