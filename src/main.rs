use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use relyt_ctl::RelytError;
use relyt_ctl::cli::Cli;
use relyt_ctl::commands;
use relyt_ctl::convergence::{CancellationToken, listen_for_shutdown};

/// Exit status used when the operator interrupts a wait (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    listen_for_shutdown(cancel.clone());

    let reconciler = match commands::connect(&cli, cancel) {
        Ok(reconciler) => reconciler,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match commands::execute(&reconciler, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(RelytError::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(_) => ExitCode::FAILURE,
    }
}
