//! cert-helper binary entrypoint.
//!
//! This is the main entry point for the `cert-helper` command-line tool.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cert_cli::cli::{Cli, Commands};
use cert_cli::commands::{CaCommand, CertCommand};
use cert_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), cert_cli::CliError> {
    let config = cli.load_config()?;
    cert_pki::encoding::ensure_dir(&config.output_dir)?;
    debug!(output_dir = %config.output_dir.display(), "using trust store");

    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Ca { command } => {
            CaCommand::new(&config).execute(&mut stdout, &format, command)?;
        }
        Commands::Cert { command } => {
            CertCommand::new(&config).execute(&mut stdout, &format, command)?;
        }
    }

    Ok(())
}
