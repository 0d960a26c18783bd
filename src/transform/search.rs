use std::collections::HashMap;

use num_bigint::BigInt;
use num_traits::Zero;
use tracing::debug;

use crate::catalog::index::FilterMode;
use crate::catalog::store::{SequenceStore, StoreError};
use crate::core::config::AnalyzerConfig;
use crate::core::query::SequenceQuery;
use crate::core::record::variance_of;
use crate::core::types::{CapKind, Deadline};
use crate::matching::matcher::{run_matcher, sort_matches, Match};
use crate::transform::ops::{operator_instances, Operator};

/// Result of the Superseeker-lite stage.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub matches: Vec<Match>,
    /// Chains enumerated before dedup
    pub chains_enumerated: usize,
    /// Distinct transformed queries handed to the matcher
    pub outputs_matched: usize,
    pub truncated: Option<CapKind>,
}

/// Apply a chain left to right; an empty chain is the identity.
#[must_use]
pub fn apply_chain(terms: &[BigInt], chain: &[Operator]) -> Option<Vec<BigInt>> {
    let mut out = terms.to_vec();
    for op in chain {
        if out.is_empty() {
            break;
        }
        out = op.apply(&out)?;
    }
    Some(out)
}

/// Total complexity of a chain: operator weights plus one for composition.
#[must_use]
pub fn chain_complexity(chain: &[Operator], cfg: &AnalyzerConfig) -> u32 {
    let weights: u32 = chain.iter().map(|op| op.weight(&cfg.transform)).sum();
    weights + u32::from(chain.len() > 1)
}

/// Render a chain as `op1 \u{2218} op2`.
#[must_use]
pub fn chain_description(chain: &[Operator]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" \u{2218} ")
}

struct Enumeration<'a> {
    ops: &'a [Operator],
    cfg: &'a AnalyzerConfig,
    deadline: Deadline,
    /// transformed terms -> (summed weights, chain); lowest complexity wins
    outputs: HashMap<Vec<BigInt>, (u32, Vec<Operator>)>,
    chains: usize,
    truncated: Option<CapKind>,
}

impl Enumeration<'_> {
    fn run(&mut self, terms: &[BigInt], chain: &mut Vec<Operator>, weights: u32, depth_left: usize) {
        if depth_left == 0 {
            return;
        }
        for op in self.ops {
            if self.truncated.is_some() {
                return;
            }
            if self.deadline.expired() {
                self.truncated = Some(CapKind::Time);
                return;
            }
            if self.chains >= self.cfg.transform.max_chains {
                self.truncated = Some(CapKind::Chains);
                return;
            }
            let Some(out) = op.apply(terms) else {
                continue;
            };
            self.chains += 1;
            chain.push(op.clone());
            let total_weights = weights + op.weight(&self.cfg.transform);
            self.record(&out, chain, total_weights);
            if !out.is_empty() {
                self.run(&out, chain, total_weights, depth_left - 1);
            }
            chain.pop();
        }
    }

    fn record(&mut self, out: &[BigInt], chain: &[Operator], weights: u32) {
        if out.len() < self.cfg.min_match_length {
            return;
        }
        let complexity = weights + u32::from(chain.len() > 1);
        match self.outputs.get(out) {
            Some((existing, _)) if *existing <= complexity => {}
            _ => {
                self.outputs
                    .insert(out.to_vec(), (complexity, chain.to_vec()));
            }
        }
    }
}

/// Enumerate operator chains over the query, dedupe by transformed output,
/// and run the exact matcher on each distinct transformed query.
///
/// Wildcard queries are not transformable and yield an empty outcome.
pub fn search_transform_matches(
    store: &SequenceStore,
    query: &SequenceQuery,
    cfg: &AnalyzerConfig,
    deadline: Deadline,
) -> Result<TransformOutcome, StoreError> {
    let Some(base_terms) = query.concrete_terms() else {
        return Ok(TransformOutcome::default());
    };
    if base_terms.len() < query.min_match_length {
        return Ok(TransformOutcome::default());
    }

    let ops = operator_instances(&cfg.transform);
    let mut enumeration = Enumeration {
        ops: &ops,
        cfg,
        deadline,
        outputs: HashMap::new(),
        chains: 0,
        truncated: None,
    };
    // Seed with the untransformed query at zero complexity so that any
    // chain reproducing the input verbatim is dropped as a duplicate.
    enumeration
        .outputs
        .insert(base_terms.clone(), (0, Vec::new()));
    let mut chain = Vec::new();
    enumeration.run(&base_terms, &mut chain, 0, cfg.transform.max_depth);

    let query_is_flat = variance_of(&base_terms).unwrap_or(0.0) < cfg.transform.min_variance;
    let query_all_zero = base_terms.iter().all(Zero::is_zero);

    let mut candidates: Vec<(Vec<BigInt>, u32, Vec<Operator>)> = enumeration
        .outputs
        .into_iter()
        .filter(|(_, (_, chain))| !chain.is_empty())
        .filter(|(out, _)| {
            if out.iter().all(Zero::is_zero) {
                return query_all_zero;
            }
            // Degenerate transforms (e.g. diff of an arithmetic progression
            // collapsing to a constant) are filtered unless the query itself
            // is near-flat.
            query_is_flat || variance_of(out).unwrap_or(0.0) >= cfg.transform.min_variance
        })
        .map(|(out, (complexity, chain))| (out, complexity, chain))
        .collect();
    candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| chain_description(&a.2).cmp(&chain_description(&b.2))));

    debug!(
        chains = enumeration.chains,
        distinct = candidates.len(),
        "transform enumeration complete"
    );

    let mut outcome = TransformOutcome {
        chains_enumerated: enumeration.chains,
        truncated: enumeration.truncated,
        ..Default::default()
    };

    // Transformed queries rarely line up with a stored sequence's first
    // term (differencing shifts the origin), so the matcher runs in
    // subsequence mode unless fallback is disabled; prefix alignments still
    // win on score.
    let mode = if query.allow_subsequence || cfg.fallback_subsequence {
        FilterMode::Subsequence
    } else {
        FilterMode::Prefix
    };
    for (terms, complexity, chain) in candidates {
        if outcome.matches.len() >= cfg.transform.limit {
            break;
        }
        if deadline.expired() {
            outcome.truncated.get_or_insert(CapKind::Time);
            break;
        }
        let t_query = SequenceQuery {
            terms: terms.into_iter().map(Some).collect(),
            min_match_length: query.min_match_length,
            allow_subsequence: mode == FilterMode::Subsequence,
        };
        let matcher_outcome = run_matcher(
            store,
            &t_query,
            mode,
            cfg.transform.limit - outcome.matches.len(),
            cfg.snippet_len,
            deadline,
        )?;
        outcome.outputs_matched += 1;
        for mut m in matcher_outcome.matches {
            m.score = m.length as f64 / (1.0 + f64::from(complexity));
            m.chain = chain.clone();
            outcome.matches.push(m);
        }
    }

    sort_matches(&mut outcome.matches);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::write_records;
    use crate::core::record::SequenceRecord;
    use crate::core::types::{MatchType, SequenceId};

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    fn fixture_store(dir: &tempfile::TempDir) -> SequenceStore {
        let db = dir.path().join("transform.db");
        let records = vec![
            SequenceRecord::new(SequenceId::new("A000012"), ints(&[1, 1, 1, 1, 1, 1, 1, 1]))
                .with_name("The all 1's sequence"),
            SequenceRecord::new(
                SequenceId::new("A000027"),
                ints(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
            )
            .with_name("The positive integers"),
            SequenceRecord::new(SequenceId::new("A007395"), ints(&[2, 2, 2, 2, 2, 2, 2, 2]))
                .with_name("Constant sequence: the all 2's sequence"),
        ];
        write_records(&db, &records).unwrap();
        SequenceStore::open(&db).unwrap()
    }

    #[test]
    fn test_apply_chain_identity() {
        let q = ints(&[3, 1, 4, 1, 5]);
        assert_eq!(apply_chain(&q, &[]).unwrap(), q);
    }

    #[test]
    fn test_chain_complexity_adds_composition_cost() {
        let cfg = AnalyzerConfig::default();
        assert_eq!(chain_complexity(&[Operator::Diff], &cfg), 1);
        assert_eq!(chain_complexity(&[Operator::Diff, Operator::Diff], &cfg), 3);
    }

    #[test]
    fn test_triangular_numbers_reveal_naturals_via_diff() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let query = SequenceQuery::from_i64(&[1, 3, 6, 10, 15, 21], 3, false);
        let cfg = AnalyzerConfig::default();

        let outcome =
            search_transform_matches(&store, &query, &cfg, Deadline::after_ms(30_000)).unwrap();
        let hit = outcome
            .matches
            .iter()
            .find(|m| m.id.as_str() == "A000027" && m.chain == vec![Operator::Diff])
            .expect("diff chain should reveal the positive integers");
        // diff([1,3,6,...]) = [2,3,4,5,6], which starts one term into the
        // naturals
        assert_eq!(hit.match_type, MatchType::Subsequence);
        assert_eq!(hit.offset, 1);
        assert_eq!(hit.length, 5);
    }

    #[test]
    fn test_double_diff_reveals_constant() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        // n^2 + 1: second differences are the all 2's sequence
        let query = SequenceQuery::from_i64(&[2, 5, 10, 17, 26], 3, false);
        let cfg = AnalyzerConfig::default();

        let outcome =
            search_transform_matches(&store, &query, &cfg, Deadline::after_ms(30_000)).unwrap();
        let hit = outcome
            .matches
            .iter()
            .find(|m| m.id.as_str() == "A007395")
            .expect("a double-diff chain should reveal the all 2's sequence");
        assert!(
            hit.chain == vec![Operator::Diff, Operator::Diff] || hit.chain == vec![Operator::Diff2],
            "unexpected chain {:?}",
            hit.chain
        );
        assert_eq!(hit.match_type, MatchType::Prefix);
    }

    #[test]
    fn test_dedup_keeps_lowest_complexity_chain() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let query = SequenceQuery::from_i64(&[2, 5, 10, 17, 26], 3, false);
        let cfg = AnalyzerConfig::default();

        let outcome =
            search_transform_matches(&store, &query, &cfg, Deadline::after_ms(30_000)).unwrap();
        // diff2 (weight 1) wins over diff followed by diff (weight 2 plus
        // composition cost)
        let best = outcome
            .matches
            .iter()
            .filter(|m| m.id.as_str() == "A007395")
            .map(|m| chain_complexity(&m.chain, &cfg))
            .min()
            .unwrap();
        assert_eq!(best, 1);
    }

    #[test]
    fn test_identity_reproducing_chains_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let query = SequenceQuery::from_i64(&[1, 2, 3, 4, 5], 3, false);
        let cfg = AnalyzerConfig::default();

        let outcome =
            search_transform_matches(&store, &query, &cfg, Deadline::after_ms(30_000)).unwrap();
        // reverse . reverse reproduces the query; no match may carry a chain
        // whose output equals the input
        for m in &outcome.matches {
            assert!(
                apply_chain(&ints(&[1, 2, 3, 4, 5]), &m.chain).unwrap() != ints(&[1, 2, 3, 4, 5]),
                "identity chain {:?} slipped through",
                m.chain
            );
        }
    }

    #[test]
    fn test_chain_cap_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let query = SequenceQuery::from_i64(&[1, 3, 6, 10, 15], 3, false);
        let mut cfg = AnalyzerConfig::default();
        cfg.transform.max_chains = 5;

        let outcome =
            search_transform_matches(&store, &query, &cfg, Deadline::after_ms(30_000)).unwrap();
        assert_eq!(outcome.truncated, Some(CapKind::Chains));
        assert!(outcome.chains_enumerated <= 5);
    }

    #[test]
    fn test_budget_monotonicity() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let query = SequenceQuery::from_i64(&[1, 3, 6, 10, 15, 21], 3, false);

        let mut tight = AnalyzerConfig::default();
        tight.transform.max_chains = 40;
        let mut loose = AnalyzerConfig::default();
        loose.transform.max_chains = 100_000;

        let tight_out =
            search_transform_matches(&store, &query, &tight, Deadline::after_ms(30_000)).unwrap();
        let loose_out =
            search_transform_matches(&store, &query, &loose, Deadline::after_ms(30_000)).unwrap();

        // Tightening a cap never adds results
        for m in &tight_out.matches {
            assert!(
                loose_out
                    .matches
                    .iter()
                    .any(|l| l.id == m.id && l.chain == m.chain),
                "match {:?} present under tight cap but missing under loose",
                m.id
            );
        }
    }

    #[test]
    fn test_wildcard_queries_skip_transforms() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let mut query = SequenceQuery::from_i64(&[1, 2, 3, 4], 3, false);
        query.terms[0] = None;
        let cfg = AnalyzerConfig::default();

        let outcome =
            search_transform_matches(&store, &query, &cfg, Deadline::after_ms(30_000)).unwrap();
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.chains_enumerated, 0);
    }
}
