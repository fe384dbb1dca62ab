#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use clap::Parser;

/// Apply artificial CPU, memory, and storage load for a bounded duration.
///
/// Size and duration values are captured as raw strings and validated by
/// `validation::validate`, so every argument failure exits with code 1 and
/// a single error line.
#[derive(Debug, Parser)]
#[command(name = "pressurize", version, about)]
pub struct Cli {
    /// Duration to apply load (e.g. 30s, 5m, 1h)
    #[arg(long)]
    pub timeout: Option<String>,

    /// Number of CPU cores to load (0 = use all cores)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub cpu: i64,

    /// Memory load, absolute or percent of free (e.g. 1GB, 512MB, 95%)
    #[arg(long)]
    pub memory: Option<String>,

    /// Storage load, absolute or percent of free (e.g. 500MB, 80%)
    #[arg(long)]
    pub storage: Option<String>,
}
