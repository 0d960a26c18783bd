//! Command-line interface for oeis-solver.
//!
//! Available commands:
//!
//! - **build-index**: ingest the raw OEIS exports into the SQLite index
//! - **match**: exact prefix/subsequence lookup
//! - **transform**: Superseeker-lite search through operator chains
//! - **combo**: integer/rational linear combinations of stored sequences
//! - **analyze**: the full pipeline with per-stage diagnostics
//! - **stats**: index statistics
//!
//! ## Usage
//!
//! ```text
//! # Build the local index from downloaded exports
//! oeis-solver build-index data/raw/stripped.gz --names data/raw/names.gz
//!
//! # Who am I?
//! oeis-solver match "0, 1, 1, 2, 3, 5, 8"
//!
//! # Try transform chains and combinations
//! oeis-solver analyze "1, 3, 4, 7, 11, 18" --profile deep --format json
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;

pub mod analyze;
pub mod build;
pub mod combo;
pub mod match_cmd;
pub mod stats;
pub mod transform;

#[derive(Parser)]
#[command(name = "oeis-solver")]
#[command(version)]
#[command(about = "Identify integer sequences against a local OEIS snapshot")]
#[command(
    long_about = "oeis-solver answers whether an integer sequence already lives in OEIS,\n\
possibly after a simple transformation or as a small linear combination of entries.\n\
All matching runs against a local snapshot; nothing is looked up online."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the SQLite index from raw OEIS exports
    BuildIndex(build::BuildArgs),

    /// Match a sequence exactly (prefix or subsequence)
    Match(match_cmd::MatchArgs),

    /// Search transform chains applied to the query
    Transform(transform::TransformArgs),

    /// Search linear combinations of two or three stored sequences
    Combo(combo::ComboArgs),

    /// Run the full analysis pipeline
    Analyze(analyze::AnalyzeArgs),

    /// Show index statistics
    Stats(stats::StatsArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print any serialisable value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
