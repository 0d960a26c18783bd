use std::path::PathBuf;

use clap::Args;

use crate::catalog::store::SequenceStore;
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct StatsArgs {
    /// Index file
    #[arg(long, default_value = "data/oeis.db")]
    pub db: PathBuf,
}

/// Execute the stats subcommand.
///
/// # Errors
///
/// Returns an error when the index is missing or unreadable.
pub fn run(args: StatsArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    let store = SequenceStore::open(&args.db)?;
    let stats = store.stats()?;

    match format {
        OutputFormat::Json => crate::cli::print_json(&stats)?,
        OutputFormat::Text => {
            println!("Sequences: {}", stats.count);
            if let (Some(min), Some(max)) = (stats.min_length, stats.max_length) {
                println!("Stored lengths: {min}..{max}");
            }
        }
    }
    Ok(())
}
