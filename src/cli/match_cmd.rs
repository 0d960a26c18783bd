use std::path::PathBuf;

use clap::Args;

use crate::catalog::index::FilterMode;
use crate::catalog::store::SequenceStore;
use crate::cli::OutputFormat;
use crate::core::types::Deadline;
use crate::matching::matcher::run_matcher;
use crate::parsing::parse_query;
use crate::render::match_explanation;

#[derive(Args)]
pub struct MatchArgs {
    /// The sequence, comma or space separated; `?` is a wildcard
    pub sequence: String,

    /// Index file
    #[arg(long, default_value = "data/oeis.db")]
    pub db: PathBuf,

    /// Also search for the query inside stored sequences
    #[arg(long)]
    pub subsequence: bool,

    /// Minimum overlap to accept
    #[arg(long, default_value = "3")]
    pub min_length: usize,

    /// Maximum wildcards allowed in the query
    #[arg(long, default_value = "2")]
    pub max_wildcards: usize,

    /// Number of matches to show
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,

    /// Attach the first N stored terms to each match
    #[arg(long)]
    pub show_terms: Option<usize>,
}

/// Execute the match subcommand.
///
/// # Errors
///
/// Returns an error when the query is malformed or the index is missing.
pub fn run(args: MatchArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let query = parse_query(
        &args.sequence,
        args.min_length,
        args.subsequence,
        args.max_wildcards,
    )?;
    let store = SequenceStore::open(&args.db)?;
    if verbose {
        eprintln!("Index holds {} sequences", store.len()?);
    }

    let mode = if args.subsequence {
        FilterMode::Subsequence
    } else {
        FilterMode::Prefix
    };
    let mut outcome = run_matcher(
        &store,
        &query,
        mode,
        args.limit,
        args.show_terms,
        Deadline::none(),
    )?;
    // Retry as a subsequence search when a plain prefix lookup comes back
    // empty, mirroring the analyzer's fallback.
    if outcome.matches.is_empty() && !args.subsequence {
        let mut sub_query = query.clone();
        sub_query.allow_subsequence = true;
        outcome = run_matcher(
            &store,
            &sub_query,
            FilterMode::Subsequence,
            args.limit,
            args.show_terms,
            Deadline::none(),
        )?;
    }

    match format {
        OutputFormat::Json => crate::cli::print_json(&outcome.matches)?,
        OutputFormat::Text => {
            if outcome.matches.is_empty() {
                println!("No matches.");
            }
            for m in &outcome.matches {
                println!("{}  score={:.1}  {}", m.id, m.score, match_explanation(m));
            }
        }
    }
    Ok(())
}
