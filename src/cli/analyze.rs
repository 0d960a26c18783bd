use std::path::PathBuf;

use clap::Args;

use crate::catalog::store::SequenceStore;
use crate::cli::OutputFormat;
use crate::core::config::AnalyzerConfig;
use crate::core::types::Profile;
use crate::matching::engine::{AnalysisResult, Analyzer};
use crate::parsing::parse_query;
use crate::render::{combination_expression, match_explanation};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// The sequence, comma or space separated; `?` is a wildcard
    pub sequence: String,

    /// Index file
    #[arg(long, default_value = "data/oeis.db")]
    pub db: PathBuf,

    /// Search-effort preset
    #[arg(long, value_enum, default_value = "deep")]
    pub profile: Profile,

    /// TOML file with configuration overrides
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also search for the query inside stored sequences
    #[arg(long)]
    pub subsequence: bool,

    /// Skip the transform stage
    #[arg(long)]
    pub no_transforms: bool,

    /// Skip the similarity stage
    #[arg(long)]
    pub no_similarity: bool,

    /// Skip the combination stage
    #[arg(long)]
    pub no_combinations: bool,

    /// Run the three-sequence combination search
    #[arg(long)]
    pub triples: bool,

    /// Attach the first N stored terms to each match
    #[arg(long)]
    pub show_terms: Option<usize>,
}

/// Execute the analyze subcommand.
///
/// # Errors
///
/// Returns an error when the query is malformed, the index is missing, or
/// the config file cannot be read.
pub fn run(args: AnalyzeArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let mut cfg = match &args.config {
        Some(path) => AnalyzerConfig::from_toml_file(path)?,
        None => AnalyzerConfig::for_profile(args.profile),
    };
    cfg.allow_subsequence = args.subsequence || cfg.allow_subsequence;
    cfg.snippet_len = args.show_terms.or(cfg.snippet_len);
    if args.no_transforms {
        cfg.stages.transform = false;
    }
    if args.no_similarity {
        cfg.stages.similarity = false;
    }
    if args.no_combinations {
        cfg.stages.combinations = false;
    }
    if args.triples {
        cfg.triple.enabled = true;
    }

    let query = parse_query(
        &args.sequence,
        cfg.min_match_length,
        cfg.allow_subsequence,
        cfg.max_wildcards,
    )?;
    let store = SequenceStore::open(&args.db)?;
    if verbose {
        eprintln!("Index holds {} sequences", store.len()?);
    }

    let analyzer = Analyzer::new(&store, cfg);
    let result = analyzer.analyze(&query)?;

    match format {
        OutputFormat::Json => crate::cli::print_json(&result)?,
        OutputFormat::Text => print_text(&result, verbose),
    }
    Ok(())
}

fn print_text(result: &AnalysisResult, verbose: bool) {
    if !result.exact_matches.is_empty() {
        println!("Exact matches:");
        for m in &result.exact_matches {
            println!("  {}  score={:.1}  {}", m.id, m.score, match_explanation(m));
        }
    }
    if !result.transform_matches.is_empty() {
        println!("Transform matches:");
        for m in &result.transform_matches {
            println!("  {}  score={:.2}  {}", m.id, m.score, match_explanation(m));
        }
    }
    if !result.similarity.is_empty() {
        println!("Similar sequences:");
        for row in result.similarity.iter().take(10) {
            println!(
                "  {}  corr={:.4} nmse={:.4} fit={:.3}*r{:+.3}",
                row.id, row.correlation, row.nmse, row.scale, row.offset
            );
        }
    }
    if !result.combinations.is_empty() {
        println!("Combinations:");
        for m in &result.combinations {
            println!("  score={:.2}  {}", m.score, combination_expression(m));
        }
    }
    if !result.triple_combinations.is_empty() {
        println!("Triple combinations:");
        for m in &result.triple_combinations {
            println!("  score={:.2}  {}", m.score, combination_expression(m));
        }
    }
    if result.exact_matches.is_empty()
        && result.transform_matches.is_empty()
        && result.similarity.is_empty()
        && result.combinations.is_empty()
        && result.triple_combinations.is_empty()
    {
        println!("Nothing found.");
    }
    if verbose {
        if let Ok(diag) = serde_json::to_string_pretty(&result.diagnostics) {
            eprintln!("{diag}");
        }
    }
}
