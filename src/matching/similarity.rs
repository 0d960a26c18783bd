use std::cmp::Ordering;
use std::ops::ControlFlow;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::Serialize;

use crate::catalog::index::{FilterMode, InvariantFilter};
use crate::catalog::store::{SequenceStore, StoreError};
use crate::core::config::SimilarityConfig;
use crate::core::query::SequenceQuery;
use crate::core::record::SequenceRecord;
use crate::core::types::Deadline;

/// A candidate scored against the query by affine fit and correlation.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub record: SequenceRecord,
    /// Pearson correlation over the overlapped positions
    pub correlation: f64,
    /// Mean squared error of the best affine fit `a*r + b ~ q`
    pub mse: f64,
    /// MSE normalised by the query's magnitude
    pub nmse: f64,
    pub scale: f64,
    pub offset: f64,
}

/// Flattened similarity row for result output.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityRow {
    pub id: crate::core::types::SequenceId,
    pub name: Option<String>,
    pub correlation: f64,
    pub mse: f64,
    pub nmse: f64,
    pub scale: f64,
    pub offset: f64,
}

impl From<&ScoredCandidate> for SimilarityRow {
    fn from(c: &ScoredCandidate) -> Self {
        Self {
            id: c.record.id.clone(),
            name: c.record.name.clone(),
            correlation: c.correlation,
            mse: c.mse,
            nmse: c.nmse,
            scale: c.scale,
            offset: c.offset,
        }
    }
}

/// Outcome of the similarity stage.
#[derive(Debug, Default)]
pub struct SimilarityOutcome {
    pub candidates: Vec<ScoredCandidate>,
    pub scanned: usize,
    pub truncated: bool,
}

fn to_f64_slice(terms: &[BigInt], k: usize) -> Option<Vec<f64>> {
    let vals: Vec<f64> = terms[..k].iter().map(|t| t.to_f64()).collect::<Option<_>>()?;
    if vals.iter().all(|v| v.is_finite()) {
        Some(vals)
    } else {
        None
    }
}

/// Least-squares `(a, b)` minimising `sum (a*x_i + b - y_i)^2`, with the
/// resulting mean squared error. Degenerate `x` falls back to the mean fit.
#[must_use]
pub fn affine_fit(x: &[f64], y: &[f64]) -> (f64, f64, f64) {
    let n = x.len().min(y.len());
    if n == 0 {
        return (f64::INFINITY, 0.0, 0.0);
    }
    let nf = n as f64;
    let sum_x: f64 = x[..n].iter().sum();
    let sum_y: f64 = y[..n].iter().sum();
    let sum_xx: f64 = x[..n].iter().map(|v| v * v).sum();
    let sum_xy: f64 = x[..n].iter().zip(&y[..n]).map(|(a, b)| a * b).sum();

    let denom = nf * sum_xx - sum_x * sum_x;
    let (a, b) = if denom == 0.0 {
        (0.0, sum_y / nf)
    } else {
        let a = (nf * sum_xy - sum_x * sum_y) / denom;
        (a, (sum_y - a * sum_x) / nf)
    };
    let mse = x[..n]
        .iter()
        .zip(&y[..n])
        .map(|(xi, yi)| {
            let e = a * xi + b - yi;
            e * e
        })
        .sum::<f64>()
        / nf;
    (mse, a, b)
}

/// Pearson correlation coefficient over the first `min(len)` positions.
///
/// Zero when either series is constant or too short.
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mx = x[..n].iter().sum::<f64>() / nf;
    let my = y[..n].iter().sum::<f64>() / nf;
    let mut num = 0.0;
    let mut den_x = 0.0;
    let mut den_y = 0.0;
    for (xi, yi) in x[..n].iter().zip(&y[..n]) {
        num += (xi - mx) * (yi - my);
        den_x += (xi - mx) * (xi - mx);
        den_y += (yi - my) * (yi - my);
    }
    if den_x == 0.0 || den_y == 0.0 {
        return 0.0;
    }
    num / (den_x.sqrt() * den_y.sqrt())
}

/// Score a single candidate against the query values.
#[must_use]
pub fn score_candidate(query_vals: &[f64], record: &SequenceRecord) -> Option<ScoredCandidate> {
    let k = query_vals.len().min(record.len());
    if k == 0 {
        return None;
    }
    let target = to_f64_slice(&record.terms, k)?;
    let (mse, scale, offset) = affine_fit(&target, &query_vals[..k]);
    let correlation = pearson(&target, &query_vals[..k]);
    let peak = query_vals[..k].iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    let nmse = mse / (1.0 + peak * peak);
    Some(ScoredCandidate {
        record: record.clone(),
        correlation,
        mse,
        nmse,
        scale,
        offset,
    })
}

/// Rank the invariant-filtered candidate stream against the query.
///
/// Candidates below the correlation floor or above the normalised-error
/// ceiling are dropped; the rest are ordered by `(-|corr|, nmse, id)` and
/// capped at the effective top-K. Wildcard queries rank nothing.
pub fn rank_candidates(
    store: &SequenceStore,
    query: &SequenceQuery,
    cfg: &SimilarityConfig,
    mode: FilterMode,
    deadline: Deadline,
) -> Result<SimilarityOutcome, StoreError> {
    let Some(terms) = query.concrete_terms() else {
        return Ok(SimilarityOutcome::default());
    };
    let Some(query_vals) = to_f64_slice(&terms, terms.len()) else {
        return Ok(SimilarityOutcome::default());
    };

    let predicates = InvariantFilter::for_query(query, mode);
    let mut outcome = SimilarityOutcome::default();

    store.for_each(&predicates, |record| {
        if deadline.expired() {
            outcome.truncated = true;
            return ControlFlow::Break(());
        }
        outcome.scanned += 1;
        if let Some(scored) = score_candidate(&query_vals, &record) {
            if scored.correlation.abs() >= cfg.min_corr && scored.nmse <= cfg.max_nmse {
                outcome.candidates.push(scored);
            }
        }
        ControlFlow::Continue(())
    })?;

    outcome.candidates.sort_by(|a, b| {
        b.correlation
            .abs()
            .partial_cmp(&a.correlation.abs())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.nmse.partial_cmp(&b.nmse).unwrap_or(Ordering::Equal))
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    outcome.candidates.truncate(cfg.effective_top_k());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::write_records;
    use crate::core::types::SequenceId;

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    #[test]
    fn test_affine_fit_exact() {
        // y = 3x + 2
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [5.0, 8.0, 11.0, 14.0];
        let (mse, a, b) = affine_fit(&x, &y);
        assert!(mse < 1e-18);
        assert!((a - 3.0).abs() < 1e-12);
        assert!((b - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_affine_fit_constant_target() {
        let x = [2.0, 2.0, 2.0];
        let y = [1.0, 2.0, 3.0];
        let (mse, a, b) = affine_fit(&x, &y);
        assert_eq!(a, 0.0);
        assert!((b - 2.0).abs() < 1e-12);
        assert!(mse > 0.0);
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &[8.0, 6.0, 4.0, 2.0]) + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[5.0, 5.0, 5.0, 5.0]), 0.0);
        assert_eq!(pearson(&[1.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_rank_squares_query() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("sim.db");
        let records = vec![
            SequenceRecord::new(
                SequenceId::new("A000027"),
                ints(&[1, 2, 3, 4, 5, 6, 7, 8]),
            )
            .with_name("The positive integers"),
            SequenceRecord::new(
                SequenceId::new("A000290"),
                ints(&[0, 1, 4, 9, 16, 25, 36, 49]),
            )
            .with_name("The squares"),
            SequenceRecord::new(
                SequenceId::new("A000079"),
                ints(&[1, 2, 4, 8, 16, 32, 64, 128]),
            )
            .with_name("Powers of 2"),
        ];
        write_records(&db, &records).unwrap();
        let store = SequenceStore::open(&db).unwrap();

        // Shifted squares: 4, 9, 16, 25, 36
        let query = SequenceQuery::from_i64(&[4, 9, 16, 25, 36], 3, false);
        let cfg = SimilarityConfig::default();
        let outcome = rank_candidates(
            &store,
            &query,
            &cfg,
            FilterMode::Combination,
            Deadline::none(),
        )
        .unwrap();

        assert!(!outcome.candidates.is_empty());
        let squares = outcome
            .candidates
            .iter()
            .find(|c| c.record.id.as_str() == "A000290")
            .expect("squares should rank");
        // Head-aligned against 0,1,4,9,16: strongly but not perfectly
        // correlated
        assert!(squares.correlation >= 0.99);
    }

    #[test]
    fn test_correlation_floor_drops_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("sim2.db");
        let records = vec![
            SequenceRecord::new(
                SequenceId::new("A000027"),
                ints(&[1, 2, 3, 4, 5, 6]),
            ),
            // Uncorrelated noise-like sequence
            SequenceRecord::new(
                SequenceId::new("A900000"),
                ints(&[5, -3, 9, -1, 4, 0]),
            ),
        ];
        write_records(&db, &records).unwrap();
        let store = SequenceStore::open(&db).unwrap();

        let query = SequenceQuery::from_i64(&[2, 4, 6, 8, 10, 12], 3, false);
        let cfg = SimilarityConfig::default();
        let outcome = rank_candidates(
            &store,
            &query,
            &cfg,
            FilterMode::Combination,
            Deadline::none(),
        )
        .unwrap();

        let ids: Vec<&str> = outcome
            .candidates
            .iter()
            .map(|c| c.record.id.as_str())
            .collect();
        assert!(ids.contains(&"A000027"));
        assert!(!ids.contains(&"A900000"));
    }

    #[test]
    fn test_ordering_key() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("sim3.db");
        // Two perfectly correlated candidates; tie broken by id
        let records = vec![
            SequenceRecord::new(SequenceId::new("A000400"), ints(&[1, 2, 3, 4, 5])),
            SequenceRecord::new(SequenceId::new("A000100"), ints(&[2, 4, 6, 8, 10])),
        ];
        write_records(&db, &records).unwrap();
        let store = SequenceStore::open(&db).unwrap();

        let query = SequenceQuery::from_i64(&[3, 6, 9, 12, 15], 3, false);
        let cfg = SimilarityConfig::default();
        let outcome = rank_candidates(
            &store,
            &query,
            &cfg,
            FilterMode::Combination,
            Deadline::none(),
        )
        .unwrap();
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[0].record.id.as_str(), "A000100");
    }

    #[test]
    fn test_wildcards_rank_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("sim4.db");
        write_records(
            &db,
            &[SequenceRecord::new(
                SequenceId::new("A000027"),
                ints(&[1, 2, 3, 4, 5]),
            )],
        )
        .unwrap();
        let store = SequenceStore::open(&db).unwrap();

        let mut query = SequenceQuery::from_i64(&[1, 2, 3, 4], 3, false);
        query.terms[1] = None;
        let outcome = rank_candidates(
            &store,
            &query,
            &SimilarityConfig::default(),
            FilterMode::Combination,
            Deadline::none(),
        )
        .unwrap();
        assert!(outcome.candidates.is_empty());
    }
}
