//! lintweave CLI
//!
//! Runs the configured lint engines over a folder once (`lint`) or keeps them
//! running against a watched folder (`serve`).

mod cli;
mod commands;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(has_findings) => {
            if has_findings {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match &cli.command {
        Commands::Lint { dir, engines } => commands::lint::run_lint(&cli, dir, engines),
        Commands::Serve { dir, poll } => {
            commands::serve::run_serve(&cli, dir, *poll).map(|_| false)
        }
        Commands::Init { force } => commands::init::run_init(*force).map(|_| false),
    }
}
