//! Command-line interface for the book generator.
//!
//! CLI arguments take highest priority; the rest of the configuration
//! comes from genbook.toml (see `book-config`).

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "openbook")]
#[command(about = "Opening book generator")]
#[command(
    long_about = "Expands a persistent opening book by repeatedly searching the most
promising frontier positions, and verifies the integrity of existing books.

Configuration is loaded from genbook.toml with environment variable
overrides. CLI arguments take highest priority."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate or continue expanding an opening book
    Genbook(GenbookArgs),
    /// Check the integrity of an opening book
    Checkbook(CheckbookArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenbookArgs {
    /// Book file to write to or continue expanding
    #[arg(long)]
    pub book_file: PathBuf,

    /// Log file to write to, in addition to stdout
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Number of iterations to expand the book
    #[arg(long, default_value_t = 0)]
    pub num_iters: u32,

    /// Number of iterations per save to the book file
    #[arg(long, default_value_t = 10)]
    pub save_every: u32,

    /// HTML directory to export to at the end (not supported in this build)
    #[arg(long)]
    pub html_dir: Option<PathBuf>,

    /// Other book file whose lines should be copied into this book
    #[arg(long)]
    pub trace_book_file: Option<PathBuf>,

    /// Require >= this many visits when copying from the trace book
    #[arg(long, default_value_t = 0.0)]
    pub trace_book_min_visits: f64,

    /// Allow changing cost/bonus parameters of an existing book
    #[arg(long, default_value_t = false)]
    pub allow_changing_book_params: bool,

    /// SGF file with BONUS-marked positions
    #[arg(long)]
    pub bonus_file: Option<PathBuf>,

    /// Denser debug output for html export (not supported in this build)
    #[arg(long, default_value_t = false)]
    pub html_dev_mode: bool,

    /// Require >= this many visits to export a position to html
    #[arg(long, default_value_t = 0.0)]
    pub html_min_visits: f64,
}

#[derive(Args, Debug, Clone)]
pub struct CheckbookArgs {
    /// Book file to check
    #[arg(long)]
    pub book_file: PathBuf,
}
