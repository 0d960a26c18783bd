use std::collections::HashSet;
use std::ops::ControlFlow;

use tracing::debug;

use crate::catalog::index::{FilterMode, InvariantFilter};
use crate::catalog::store::{SequenceStore, StoreError};
use crate::core::config::AnalyzerConfig;
use crate::core::query::SequenceQuery;
use crate::core::record::SequenceRecord;
use crate::core::types::Deadline;
use crate::matching::similarity::rank_candidates;

/// Deduplicated candidate pool handed to the combination solver: an ordered
/// sequence of `(record, rank_score)` pairs.
///
/// Similarity picks come first and keep the correlation magnitude that
/// ranked them; the remainder of the relaxed invariant scan follows,
/// scored by length proximity to the query. Size is capped at the
/// configured bucket size.
#[derive(Debug, Default)]
pub struct CandidateBucket {
    pub entries: Vec<(SequenceRecord, f64)>,
    /// The pool was cut down to the bucket cap
    pub truncated: bool,
}

impl CandidateBucket {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The records alone, in bucket order, for the solver.
    #[must_use]
    pub fn records(&self) -> Vec<SequenceRecord> {
        self.entries.iter().map(|(rec, _)| rec.clone()).collect()
    }

    /// The rank score a record entered the pool with, if present.
    #[must_use]
    pub fn rank_of(&self, id: &crate::core::types::SequenceId) -> Option<f64> {
        self.entries
            .iter()
            .find(|(rec, _)| &rec.id == id)
            .map(|(_, score)| *score)
    }
}

/// Assemble the bucket: union of similarity-ranked candidates and the
/// relaxed invariant-filtered pool, deduplicated by id and capped.
pub fn build_bucket(
    store: &SequenceStore,
    query: &SequenceQuery,
    cfg: &AnalyzerConfig,
    deadline: Deadline,
) -> Result<CandidateBucket, StoreError> {
    let cap = cfg.combo.effective_bucket_size();
    let qlen = query.len();

    let similarity = rank_candidates(
        store,
        query,
        &cfg.similarity,
        FilterMode::Combination,
        deadline,
    )?;

    let mut entries: Vec<(SequenceRecord, f64)> = Vec::with_capacity(cap);
    let mut seen: HashSet<crate::core::types::SequenceId> = HashSet::new();
    for candidate in similarity.candidates {
        if entries.len() >= cap {
            break;
        }
        if seen.insert(candidate.record.id.clone()) {
            entries.push((candidate.record, candidate.correlation.abs()));
        }
    }

    // Fill the remainder from the relaxed scan, preferring sequences whose
    // stored length is closest to the query's; the proximity becomes the
    // rank score.
    let predicates = InvariantFilter::for_query(query, FilterMode::Combination);
    let mut pool: Vec<SequenceRecord> = Vec::new();
    let mut scan_truncated = false;
    store.for_each(&predicates, |record| {
        if deadline.expired() {
            scan_truncated = true;
            return ControlFlow::Break(());
        }
        if !seen.contains(&record.id) {
            pool.push(record);
        }
        ControlFlow::Continue(())
    })?;
    pool.sort_by_key(|r| (r.len().abs_diff(qlen), r.id.clone()));

    let mut truncated = scan_truncated;
    for record in pool {
        if entries.len() >= cap {
            truncated = true;
            break;
        }
        seen.insert(record.id.clone());
        let proximity = 1.0 / (1.0 + record.len().abs_diff(qlen) as f64);
        entries.push((record, proximity));
    }

    debug!(size = entries.len(), truncated, "combination bucket assembled");
    Ok(CandidateBucket { entries, truncated })
}
