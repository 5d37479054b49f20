//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use dumpany_core::DEFAULT_CONCURRENCY;

/// Retries after the first attempt unless `--max-retries` says otherwise.
pub const DEFAULT_MAX_RETRIES: u8 = 2;

/// Default spacing between registry requests in milliseconds.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 500;

/// Archive every filed document for UK Companies House companies.
///
/// Dumpany walks each company's filing history, names every filing by date,
/// company and document type, and downloads the PDFs it does not already
/// have. Re-running is always safe: finished files are skipped.
#[derive(Parser, Debug)]
#[command(name = "dumpany")]
#[command(author, version, about)]
pub struct Args {
    /// Company numbers (comma or space separated); prompts when omitted
    #[arg(value_name = "COMPANY")]
    pub companies: Vec<String>,

    /// Start without asking for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Root folder for company folders (overrides DUMP_DIR)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent downloads per company (1-16)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: u8,

    /// Retries after the first attempt for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Filings requested per listing page (1-100)
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub page_size: u32,

    /// Minimum delay between registry requests in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, default_value_t = DEFAULT_MIN_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub min_interval: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Total attempts per request, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        u32::from(self.max_retries) + 1
    }
}
