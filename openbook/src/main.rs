//! openbook - Opening book generator
//!
//! A batch process that:
//! 1. Loads or creates a persistent opening book
//! 2. Repeatedly expands the most promising frontier positions using an
//!    external searcher, or imports variations from another book
//! 3. Periodically saves the book plus a config sidecar
//! 4. Verifies book integrity via the `checkbook` subcommand

use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

mod bonus;
mod check;
mod cli;
mod expand;
mod gen;
mod trace;

use crate::cli::{Cli, Command};

/// Process-wide stop flag, set from the signal handler and polled by every
/// worker at loop boundaries.
static SHOULD_STOP: AtomicBool = AtomicBool::new(false);

pub(crate) fn stop_flag() -> &'static AtomicBool {
    &SHOULD_STOP
}

fn install_signal_handler() -> Result<()> {
    // The whole cancellation design relies on the flag being lock-free;
    // refuse to run on a platform where it is not.
    assert!(
        AtomicBool::is_lock_free(),
        "stop flag is not lock-free; signal-based termination cannot work"
    );
    ctrlc::set_handler(|| {
        SHOULD_STOP.store(true, Ordering::Release);
    })
    .context("failed to install signal handler")?;
    Ok(())
}

/// Initialize tracing to stdout and, optionally, a log file.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        registry
            .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
            .init();
    } else {
        registry.init();
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Argument errors exit with 1; --help/--version print and exit 0.
            if e.use_stderr() {
                eprintln!("{e}");
                return ExitCode::from(1);
            }
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    let result = match cli.command {
        Command::Genbook(args) => {
            let config = book_config::load_config();
            if let Err(e) = init_tracing(&config.common.log_level, args.log_file.as_deref()) {
                eprintln!("{e:#}");
                return ExitCode::from(1);
            }
            install_signal_handler()
                .and_then(|_| gen::run_genbook(&args, &config))
        }
        Command::Checkbook(args) => {
            if let Err(e) = init_tracing("info", None) {
                eprintln!("{e:#}");
                return ExitCode::from(1);
            }
            check::run_checkbook(&args)
        }
    };

    match result {
        Ok(()) => {
            info!("DONE");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "fatal error");
            ExitCode::from(2)
        }
    }
}
