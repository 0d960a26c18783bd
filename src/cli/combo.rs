use std::path::PathBuf;

use clap::Args;

use crate::catalog::store::SequenceStore;
use crate::cli::OutputFormat;
use crate::combination::{build_bucket, search_pair_combinations, search_triple_combinations};
use crate::core::config::AnalyzerConfig;
use crate::core::types::{Deadline, Profile};
use crate::parsing::parse_query;
use crate::render::combination_expression;

#[derive(Args)]
pub struct ComboArgs {
    /// The sequence, comma or space separated
    pub sequence: String,

    /// Index file
    #[arg(long, default_value = "data/oeis.db")]
    pub db: PathBuf,

    /// Search-effort preset
    #[arg(long, value_enum, default_value = "deep")]
    pub profile: Profile,

    /// Candidate bucket size
    #[arg(long)]
    pub bucket: Option<usize>,

    /// Largest forward shift per component
    #[arg(long)]
    pub max_shift: Option<i64>,

    /// Per-component transforms to consider (comma separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub component_transforms: Option<Vec<crate::combination::ComponentTransform>>,

    /// Also run the three-sequence search
    #[arg(long)]
    pub triples: bool,

    /// Disable the rational-coefficient solver
    #[arg(long)]
    pub no_rational: bool,

    /// Number of combinations to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

/// Execute the combo subcommand.
///
/// # Errors
///
/// Returns an error when the query is malformed or the index is missing.
pub fn run(args: ComboArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let mut cfg = AnalyzerConfig::for_profile(args.profile);
    if let Some(bucket) = args.bucket {
        cfg.combo.bucket_size = bucket;
    }
    if let Some(shift) = args.max_shift {
        cfg.combo.max_shift = shift;
    }
    cfg.combo.rational = !args.no_rational;
    cfg.combo.limit = args.limit;
    if let Some(transforms) = args.component_transforms {
        cfg.combo.component_transforms = transforms;
    }
    if args.triples {
        cfg.triple.enabled = true;
        cfg.triple.force = true;
    }

    let query = parse_query(&args.sequence, cfg.min_match_length, false, 0)?;
    let store = SequenceStore::open(&args.db)?;

    let deadline = Deadline::after_ms(cfg.combo.max_time_ms);
    let bucket = build_bucket(&store, &query, &cfg, deadline)?;
    if verbose {
        eprintln!("Bucket holds {} candidates", bucket.len());
        for (rec, rank) in bucket.entries.iter().take(10) {
            eprintln!("  {}  rank={rank:.4}", rec.id);
        }
    }

    let records = bucket.records();
    let pairs = search_pair_combinations(&query, &records, &cfg, deadline);
    let triples = if args.triples {
        let triple_deadline = Deadline::after_ms(cfg.triple.max_time_ms);
        search_triple_combinations(&query, &records, &cfg, triple_deadline)
    } else {
        Default::default()
    };

    if verbose && (pairs.truncated.is_some() || triples.truncated.is_some()) {
        eprintln!("Search truncated by a complexity cap; results are partial.");
    }

    match format {
        OutputFormat::Json => {
            crate::cli::print_json(&serde_json::json!({
                "combinations": pairs.matches,
                "triple_combinations": triples.matches,
            }))?;
        }
        OutputFormat::Text => {
            if pairs.matches.is_empty() && triples.matches.is_empty() {
                println!("No combinations found.");
            }
            for m in pairs.matches.iter().chain(&triples.matches) {
                println!(
                    "score={:.2} len={}  {}",
                    m.score,
                    m.length,
                    combination_expression(m)
                );
            }
        }
    }
    Ok(())
}
