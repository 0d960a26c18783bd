use std::time::Instant;

use num_bigint::BigInt;
use serde::Serialize;
use tracing::debug;

use crate::catalog::index::FilterMode;
use crate::catalog::store::{SequenceStore, StoreError};
use crate::combination::{
    build_bucket, search_pair_combinations, search_triple_combinations, CombinationMatch,
};
use crate::core::config::AnalyzerConfig;
use crate::core::query::SequenceQuery;
use crate::core::types::{CapKind, Deadline};
use crate::matching::matcher::{run_matcher, Match};
use crate::matching::similarity::{rank_candidates, SimilarityRow};
use crate::transform::search::search_transform_matches;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The query violates a validation rule; no matching is attempted
    #[error("invalid query: {0}")]
    QueryInvalid(String),

    /// The backing index failed; fatal to this query
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Timing and truncation record for one pipeline stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageDiagnostics {
    /// Candidates pulled from the store (or checks run, for combinations)
    pub candidates: usize,
    pub results: usize,
    pub elapsed_ms: u64,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<CapKind>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<StageDiagnostics>,
    /// The exact stage found nothing and retried as a subsequence search
    pub subsequence_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<StageDiagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<StageDiagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combination: Option<StageDiagnostics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triple: Option<StageDiagnostics>,
}

/// Everything the pipeline found for one query, renderable without further
/// store access.
#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    pub query: Vec<Option<BigInt>>,
    pub exact_matches: Vec<Match>,
    pub transform_matches: Vec<Match>,
    pub similarity: Vec<SimilarityRow>,
    pub combinations: Vec<CombinationMatch>,
    pub triple_combinations: Vec<CombinationMatch>,
    pub diagnostics: Diagnostics,
}

/// Orchestrates the pipeline: exact, transform, similarity, combinations.
///
/// Stages run sequentially, each under its own wall-clock budget so that an
/// expensive stage can never starve a later one. Every stage is toggleable
/// through the configuration; a stage hitting a cap records partial results
/// and carries on.
pub struct Analyzer<'a> {
    store: &'a SequenceStore,
    config: AnalyzerConfig,
}

impl<'a> Analyzer<'a> {
    #[must_use]
    pub fn new(store: &'a SequenceStore, config: AnalyzerConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn validate(&self, query: &SequenceQuery) -> Result<(), AnalyzeError> {
        if query.is_empty() {
            return Err(AnalyzeError::QueryInvalid("no terms supplied".to_string()));
        }
        if query.len() < self.config.min_match_length {
            return Err(AnalyzeError::QueryInvalid(format!(
                "{} terms supplied; at least {} required",
                query.len(),
                self.config.min_match_length
            )));
        }
        if query.wildcard_count() > self.config.max_wildcards {
            return Err(AnalyzeError::QueryInvalid(format!(
                "{} wildcards; at most {} allowed",
                query.wildcard_count(),
                self.config.max_wildcards
            )));
        }
        Ok(())
    }

    /// Run the full pipeline for one query.
    pub fn analyze(&self, query: &SequenceQuery) -> Result<AnalysisResult, AnalyzeError> {
        self.validate(query)?;
        let cfg = &self.config;

        let mut result = AnalysisResult {
            query: query.terms.clone(),
            exact_matches: Vec::new(),
            transform_matches: Vec::new(),
            similarity: Vec::new(),
            combinations: Vec::new(),
            triple_combinations: Vec::new(),
            diagnostics: Diagnostics::default(),
        };

        if cfg.stages.exact {
            let started = Instant::now();
            let deadline = Deadline::after_ms(cfg.exact_max_time_ms);
            let mode = if query.allow_subsequence {
                FilterMode::Subsequence
            } else {
                FilterMode::Prefix
            };
            let mut outcome = run_matcher(
                self.store,
                query,
                mode,
                cfg.exact_limit,
                cfg.snippet_len,
                deadline,
            )?;
            let mut fallback = false;
            if outcome.matches.is_empty()
                && !query.allow_subsequence
                && cfg.fallback_subsequence
                && !deadline.expired()
            {
                let mut sub_query = query.clone();
                sub_query.allow_subsequence = true;
                let sub = run_matcher(
                    self.store,
                    &sub_query,
                    FilterMode::Subsequence,
                    cfg.exact_limit,
                    cfg.snippet_len,
                    deadline,
                )?;
                fallback = !sub.matches.is_empty();
                outcome.scanned += sub.scanned;
                outcome.truncated |= sub.truncated;
                outcome.matches = sub.matches;
            }
            result.diagnostics.subsequence_fallback = fallback;
            result.diagnostics.exact = Some(StageDiagnostics {
                candidates: outcome.scanned,
                results: outcome.matches.len(),
                elapsed_ms: started.elapsed().as_millis() as u64,
                truncated: outcome.truncated,
                cap: outcome.truncated.then_some(CapKind::Time),
            });
            result.exact_matches = outcome.matches;
        }

        if cfg.stages.transform {
            let started = Instant::now();
            let deadline = Deadline::after_ms(cfg.transform.max_time_ms);
            let outcome = search_transform_matches(self.store, query, cfg, deadline)?;
            result.diagnostics.transform = Some(StageDiagnostics {
                candidates: outcome.chains_enumerated,
                results: outcome.matches.len(),
                elapsed_ms: started.elapsed().as_millis() as u64,
                truncated: outcome.truncated.is_some(),
                cap: outcome.truncated,
            });
            result.transform_matches = outcome.matches;
        }

        if cfg.stages.similarity {
            let started = Instant::now();
            let deadline = Deadline::after_ms(cfg.similarity.max_time_ms);
            let outcome = rank_candidates(
                self.store,
                query,
                &cfg.similarity,
                FilterMode::Combination,
                deadline,
            )?;
            result.diagnostics.similarity = Some(StageDiagnostics {
                candidates: outcome.scanned,
                results: outcome.candidates.len(),
                elapsed_ms: started.elapsed().as_millis() as u64,
                truncated: outcome.truncated,
                cap: outcome.truncated.then_some(CapKind::Time),
            });
            result.similarity = outcome.candidates.iter().map(SimilarityRow::from).collect();
        }

        if cfg.stages.combinations && !query.has_wildcards() {
            let started = Instant::now();
            let deadline = Deadline::after_ms(cfg.combo.max_time_ms);
            let bucket = build_bucket(self.store, query, cfg, deadline)?;
            let records = bucket.records();
            let outcome = search_pair_combinations(query, &records, cfg, deadline);
            debug!(
                bucket = bucket.len(),
                checks = outcome.checks,
                found = outcome.matches.len(),
                "pair combination search done"
            );
            let cap = outcome
                .truncated
                .or(bucket.truncated.then_some(CapKind::Bucket));
            result.diagnostics.combination = Some(StageDiagnostics {
                candidates: outcome.checks as usize,
                results: outcome.matches.len(),
                elapsed_ms: started.elapsed().as_millis() as u64,
                truncated: cap.is_some(),
                cap,
            });
            result.combinations = outcome.matches;

            let triple_allowed = cfg.triple.enabled
                && (bucket.len() <= cfg.triple.bucket_cap || cfg.triple.force);
            if triple_allowed {
                let started = Instant::now();
                let deadline = Deadline::after_ms(cfg.triple.max_time_ms);
                let outcome = search_triple_combinations(query, &records, cfg, deadline);
                result.diagnostics.triple = Some(StageDiagnostics {
                    candidates: outcome.checks as usize,
                    results: outcome.matches.len(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    truncated: outcome.truncated.is_some(),
                    cap: outcome.truncated,
                });
                result.triple_combinations = outcome.matches;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::write_records;
    use crate::core::record::SequenceRecord;
    use crate::core::types::SequenceId;

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    fn fixture_store(dir: &tempfile::TempDir) -> SequenceStore {
        let db = dir.path().join("engine.db");
        let records = vec![
            SequenceRecord::new(SequenceId::new("A000012"), ints(&[1, 1, 1, 1, 1, 1, 1, 1]))
                .with_name("The all 1's sequence"),
            SequenceRecord::new(
                SequenceId::new("A000027"),
                ints(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
            )
            .with_name("The positive integers"),
            SequenceRecord::new(
                SequenceId::new("A000045"),
                ints(&[0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89]),
            )
            .with_name("Fibonacci numbers"),
            SequenceRecord::new(SequenceId::new("A007395"), ints(&[2, 2, 2, 2, 2, 2, 2]))
                .with_name("Constant sequence: the all 2's sequence"),
        ];
        write_records(&db, &records).unwrap();
        SequenceStore::open(&db).unwrap()
    }

    #[test]
    fn test_exact_prefix_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let analyzer = Analyzer::new(&store, AnalyzerConfig::default());

        let query = SequenceQuery::from_i64(&[0, 1, 1, 2, 3, 5, 8], 3, false);
        let result = analyzer.analyze(&query).unwrap();

        assert_eq!(result.exact_matches.len(), 1);
        let m = &result.exact_matches[0];
        assert_eq!(m.id.as_str(), "A000045");
        assert_eq!(m.offset, 0);
        assert_eq!(m.length, 7);
        assert!(!result.diagnostics.subsequence_fallback);
        assert!(result.diagnostics.exact.is_some());
    }

    #[test]
    fn test_query_validation() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let analyzer = Analyzer::new(&store, AnalyzerConfig::default());

        let short = SequenceQuery::from_i64(&[1, 2], 3, false);
        assert!(matches!(
            analyzer.analyze(&short),
            Err(AnalyzeError::QueryInvalid(_))
        ));

        let mut wild = SequenceQuery::from_i64(&[1, 2, 3, 4, 5, 6], 3, false);
        wild.terms[0] = None;
        wild.terms[2] = None;
        wild.terms[4] = None;
        assert!(matches!(
            analyzer.analyze(&wild),
            Err(AnalyzeError::QueryInvalid(_))
        ));
    }

    #[test]
    fn test_stage_toggles() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let mut cfg = AnalyzerConfig::default();
        cfg.stages.transform = false;
        cfg.stages.similarity = false;
        cfg.stages.combinations = false;
        let analyzer = Analyzer::new(&store, cfg);

        let query = SequenceQuery::from_i64(&[1, 2, 3, 4, 5], 3, false);
        let result = analyzer.analyze(&query).unwrap();
        assert!(result.diagnostics.transform.is_none());
        assert!(result.diagnostics.similarity.is_none());
        assert!(result.diagnostics.combination.is_none());
        assert!(result.transform_matches.is_empty());
    }

    #[test]
    fn test_subsequence_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let mut cfg = AnalyzerConfig::default();
        cfg.stages.transform = false;
        cfg.stages.similarity = false;
        cfg.stages.combinations = false;
        let analyzer = Analyzer::new(&store, cfg);

        // 2,3,5,8 is inside Fibonacci but is not a prefix of anything stored
        let query = SequenceQuery::from_i64(&[2, 3, 5, 8, 13], 3, false);
        let result = analyzer.analyze(&query).unwrap();
        assert!(result.diagnostics.subsequence_fallback);
        assert_eq!(result.exact_matches[0].id.as_str(), "A000045");
        assert_eq!(result.exact_matches[0].offset, 3);
    }

    #[test]
    fn test_transform_stage_in_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let analyzer = Analyzer::new(&store, AnalyzerConfig::default());

        // Triangular numbers: diff gives the positive integers
        let query = SequenceQuery::from_i64(&[1, 3, 6, 10, 15, 21], 3, false);
        let result = analyzer.analyze(&query).unwrap();
        assert!(result
            .transform_matches
            .iter()
            .any(|m| m.id.as_str() == "A000027" && !m.chain.is_empty()));
    }

    #[test]
    fn test_determinism_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = fixture_store(&dir);
        let analyzer = Analyzer::new(&store, AnalyzerConfig::default());

        let query = SequenceQuery::from_i64(&[1, 3, 4, 7, 11, 18], 3, false);
        let a = analyzer.analyze(&query).unwrap();
        let b = analyzer.analyze(&query).unwrap();

        let fingerprint = |r: &AnalysisResult| {
            (
                r.exact_matches
                    .iter()
                    .map(|m| (m.id.clone(), m.offset, m.length))
                    .collect::<Vec<_>>(),
                r.transform_matches
                    .iter()
                    .map(|m| (m.id.clone(), m.chain.clone()))
                    .collect::<Vec<_>>(),
                r.combinations
                    .iter()
                    .map(|m| (m.ids.clone(), m.shifts.clone()))
                    .collect::<Vec<_>>(),
            )
        };
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_missing_store_is_fatal() {
        let err = SequenceStore::open(std::path::Path::new("/no/such/index.db")).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
