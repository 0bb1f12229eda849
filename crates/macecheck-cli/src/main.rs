mod cli;
mod dispatch;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use macecheck_core::Verdict;
use tracing_subscriber::EnvFilter;

/// Exit status when a comparison fails or an output dump is empty.
const EXIT_VALIDATION_FAILED: u8 = 1;
/// Exit status for configuration, artifact and precondition errors.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(&cli.log) {
        eprintln!("{err:#}");
        return ExitCode::from(EXIT_ERROR);
    }

    match check(&cli) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            tracing::error!(error = ?err, "validation aborted");
            eprintln!("{err:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_tracing(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter).context("invalid --log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Runs the validation and returns the process exit status.
fn check(cli: &Cli) -> Result<u8> {
    let job = dispatch::job(cli)?;
    tracing::info!(platform = %cli.platform, runtime = %cli.mace_runtime, "validating");

    let verdicts = dispatch::run(cli, &job, |verdict| {
        for line in verdict.report() {
            println!("{line}");
        }
    })?;

    Ok(exit_code(&verdicts, job.nodes.outputs.len()))
}

/// Zero only when all `expected` outputs were compared and passed.
fn exit_code(verdicts: &[Verdict], expected: usize) -> u8 {
    if verdicts.len() == expected && verdicts.iter().all(Verdict::passed) {
        0
    } else {
        EXIT_VALIDATION_FAILED
    }
}
