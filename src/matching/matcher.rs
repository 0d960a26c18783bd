use std::ops::ControlFlow;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::catalog::index::{FilterMode, InvariantFilter};
use crate::catalog::store::{SequenceStore, StoreError};
use crate::core::query::SequenceQuery;
use crate::core::record::SequenceRecord;
use crate::core::types::{Deadline, MatchType, SequenceId};
use crate::transform::ops::Operator;

/// Most subsequence offsets reported per record.
const MAX_OFFSETS_PER_RECORD: usize = 4;

/// A hit from exact or transform search.
///
/// Carries everything needed to render an explanation without another
/// store access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: SequenceId,
    pub name: Option<String>,
    pub match_type: MatchType,
    /// Start index of the alignment within the stored sequence
    pub offset: usize,
    /// All reported alignment offsets, smallest first, capped at 4
    pub offsets: Vec<usize>,
    /// Terms aligned
    pub length: usize,
    pub score: f64,
    /// Operators applied to the query before matching; empty for plain hits
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<Operator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<Vec<BigInt>>,
}

fn term_eq(pattern: &Option<BigInt>, value: &BigInt) -> bool {
    match pattern {
        Some(p) => p == value,
        None => true,
    }
}

fn snippet_of(record: &SequenceRecord, snippet_len: Option<usize>) -> Option<Vec<BigInt>> {
    snippet_len.map(|len| record.terms[..len.min(record.terms.len())].to_vec())
}

/// Term-by-term prefix comparison with early exit on first mismatch.
#[must_use]
pub fn prefix_match(
    query: &SequenceQuery,
    record: &SequenceRecord,
    snippet_len: Option<usize>,
) -> Option<Match> {
    let qlen = query.len();
    if qlen > record.len() {
        return None;
    }
    for (pattern, value) in query.terms.iter().zip(&record.terms) {
        if !term_eq(pattern, value) {
            return None;
        }
    }
    Some(Match {
        id: record.id.clone(),
        name: record.name.clone(),
        match_type: MatchType::Prefix,
        offset: 0,
        offsets: vec![0],
        length: qlen,
        score: qlen as f64,
        chain: Vec::new(),
        snippet: snippet_of(record, snippet_len),
    })
}

/// Knuth-Morris-Pratt search of the query inside the stored terms.
///
/// A wildcard anywhere in the pattern breaks the failure-function
/// invariants, so those patterns fall back to a naive sliding-window scan.
#[must_use]
pub fn subsequence_match(
    query: &SequenceQuery,
    record: &SequenceRecord,
    snippet_len: Option<usize>,
) -> Option<Match> {
    let offsets = if query.has_wildcards() {
        naive_offsets(&query.terms, &record.terms)
    } else {
        let pattern: Vec<&BigInt> = query.terms.iter().flatten().collect();
        kmp_offsets(&pattern, &record.terms)
    };
    let first = *offsets.first()?;
    Some(Match {
        id: record.id.clone(),
        name: record.name.clone(),
        match_type: MatchType::Subsequence,
        offset: first,
        offsets,
        length: query.len(),
        // Ranked below a prefix match of equal length
        score: query.len() as f64 - 1.0,
        chain: Vec::new(),
        snippet: snippet_of(record, snippet_len),
    })
}

fn naive_offsets(pattern: &[Option<BigInt>], text: &[BigInt]) -> Vec<usize> {
    let m = pattern.len();
    let n = text.len();
    let mut offsets = Vec::new();
    if m == 0 || m > n {
        return offsets;
    }
    for start in 0..=(n - m) {
        if pattern
            .iter()
            .zip(&text[start..start + m])
            .all(|(p, v)| term_eq(p, v))
        {
            offsets.push(start);
            if offsets.len() >= MAX_OFFSETS_PER_RECORD {
                break;
            }
        }
    }
    offsets
}

fn kmp_offsets(pattern: &[&BigInt], text: &[BigInt]) -> Vec<usize> {
    let m = pattern.len();
    let n = text.len();
    let mut offsets = Vec::new();
    if m == 0 || m > n {
        return offsets;
    }

    // Longest proper prefix-suffix table
    let mut lps = vec![0usize; m];
    let mut k = 0;
    for i in 1..m {
        while k > 0 && pattern[k] != pattern[i] {
            k = lps[k - 1];
        }
        if pattern[k] == pattern[i] {
            k += 1;
            lps[i] = k;
        }
    }

    let mut q = 0;
    for (i, value) in text.iter().enumerate() {
        while q > 0 && pattern[q] != value {
            q = lps[q - 1];
        }
        if pattern[q] == value {
            q += 1;
            if q == m {
                offsets.push(i + 1 - m);
                if offsets.len() >= MAX_OFFSETS_PER_RECORD {
                    break;
                }
                q = lps[q - 1];
            }
        }
    }
    offsets
}

/// Outcome of driving the matcher over a candidate stream.
#[derive(Debug, Default)]
pub struct MatcherOutcome {
    pub matches: Vec<Match>,
    /// Candidate records pulled from the store
    pub scanned: usize,
    /// Deadline fired before the candidate stream was exhausted
    pub truncated: bool,
}

/// Run the matcher over the invariant-filtered candidate stream.
///
/// In subsequence mode each record is first tried as a prefix so that
/// prefix alignments keep their higher score. The deadline is observed
/// between candidate records.
pub fn run_matcher(
    store: &SequenceStore,
    query: &SequenceQuery,
    mode: FilterMode,
    limit: usize,
    snippet_len: Option<usize>,
    deadline: Deadline,
) -> Result<MatcherOutcome, StoreError> {
    let predicates = InvariantFilter::for_query(query, mode);
    let mut outcome = MatcherOutcome::default();

    store.for_each(&predicates, |record| {
        if deadline.expired() {
            outcome.truncated = true;
            return ControlFlow::Break(());
        }
        outcome.scanned += 1;

        let hit = match mode {
            FilterMode::Subsequence => prefix_match(query, &record, snippet_len)
                .or_else(|| subsequence_match(query, &record, snippet_len)),
            _ => prefix_match(query, &record, snippet_len),
        };
        if let Some(m) = hit {
            outcome.matches.push(m);
            if outcome.matches.len() >= limit {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    })?;

    sort_matches(&mut outcome.matches);
    Ok(outcome)
}

/// Deterministic result order: score descending, then id ascending, then
/// chain description descending.
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
            .then_with(|| chain_key(b).cmp(&chain_key(a)))
    });
}

fn chain_key(m: &Match) -> String {
    m.chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
