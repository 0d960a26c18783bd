use std::path::PathBuf;

use clap::Args;

use crate::catalog::store::SequenceStore;
use crate::cli::OutputFormat;
use crate::core::config::{AnalyzerConfig, OperatorSet};
use crate::core::types::{Deadline, Profile};
use crate::matching::matcher::Match;
use crate::parsing::parse_query;
use crate::render::match_explanation;
use crate::transform::search::{chain_description, search_transform_matches};

#[derive(Args)]
pub struct TransformArgs {
    /// The sequence, comma or space separated
    pub sequence: String,

    /// Index file
    #[arg(long, default_value = "data/oeis.db")]
    pub db: PathBuf,

    /// Search-effort preset
    #[arg(long, value_enum, default_value = "deep")]
    pub profile: Profile,

    /// Override the chain depth from the profile
    #[arg(long)]
    pub depth: Option<usize>,

    /// Override the operator classes from the profile
    #[arg(long, value_enum)]
    pub operators: Option<OperatorSet>,

    /// Wall-clock budget in milliseconds
    #[arg(long)]
    pub max_time: Option<u64>,

    /// Number of matches to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Also match transformed queries inside stored sequences
    #[arg(long)]
    pub subsequence: bool,
}

/// Execute the transform subcommand.
///
/// # Errors
///
/// Returns an error when the query is malformed or the index is missing.
pub fn run(args: TransformArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let mut cfg = AnalyzerConfig::for_profile(args.profile);
    if let Some(depth) = args.depth {
        cfg.transform.max_depth = depth;
    }
    if let Some(operators) = args.operators {
        cfg.transform.operator_set = operators;
    }
    if let Some(ms) = args.max_time {
        cfg.transform.max_time_ms = ms;
    }
    cfg.transform.limit = args.limit;

    let query = parse_query(
        &args.sequence,
        cfg.min_match_length,
        args.subsequence,
        cfg.max_wildcards,
    )?;
    let store = SequenceStore::open(&args.db)?;

    let deadline = Deadline::after_ms(cfg.transform.max_time_ms);
    let outcome = search_transform_matches(&store, &query, &cfg, deadline)?;

    if verbose {
        eprintln!(
            "Enumerated {} chains, matched {} transformed queries{}",
            outcome.chains_enumerated,
            outcome.outputs_matched,
            if outcome.truncated.is_some() {
                " (truncated)"
            } else {
                ""
            }
        );
    }

    match format {
        OutputFormat::Json => crate::cli::print_json(&outcome.matches)?,
        OutputFormat::Text => {
            if outcome.matches.is_empty() {
                println!("No transform matches.");
            }
            for m in &outcome.matches {
                print_text_match(m);
            }
        }
    }
    Ok(())
}

fn print_text_match(m: &Match) {
    println!(
        "{}  score={:.2}  [{}]  {}",
        m.id,
        m.score,
        chain_description(&m.chain),
        match_explanation(m)
    );
}
