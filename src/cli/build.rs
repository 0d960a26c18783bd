use std::path::PathBuf;

use clap::Args;

use crate::catalog::builder::IndexBuilder;
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct BuildArgs {
    /// Stripped export file (plain or .gz)
    pub stripped: PathBuf,

    /// Names export file mapping id to title (plain or .gz)
    #[arg(long)]
    pub names: Option<PathBuf>,

    /// Keywords export file (plain or .gz)
    #[arg(long)]
    pub keywords: Option<PathBuf>,

    /// Index file to write
    #[arg(long, default_value = "data/oeis.db")]
    pub db: PathBuf,

    /// Terms kept per sequence
    #[arg(long, default_value = "64")]
    pub max_terms: usize,
}

/// Execute the build-index subcommand.
///
/// # Errors
///
/// Returns an error when the snapshot files cannot be read or the index
/// cannot be written.
pub fn run(args: BuildArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    if verbose {
        eprintln!("Reading {}", args.stripped.display());
    }
    let count = IndexBuilder::new(args.max_terms).build(
        &args.stripped,
        args.names.as_deref(),
        args.keywords.as_deref(),
        &args.db,
    )?;

    match format {
        OutputFormat::Json => {
            crate::cli::print_json(&serde_json::json!({
                "records": count,
                "db": args.db,
            }))?;
        }
        OutputFormat::Text => {
            println!("Indexed {count} sequences into {}", args.db.display());
        }
    }
    Ok(())
}
