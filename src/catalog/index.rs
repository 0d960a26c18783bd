use num_traits::Zero;

use crate::catalog::store::ScanPredicates;
use crate::core::query::SequenceQuery;
use crate::core::record::{first_diffs, prefix_hash_of, sign_pattern_of};
use crate::core::types::SignPattern;

/// What kind of search the derived predicate set will feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Prefix,
    Subsequence,
    /// Candidate pool for combination search: sign, nonzero and gcd
    /// constraints are dropped because linear combinations can change all
    /// of them; the prefix hash is never used.
    Combination,
}

/// Derives the invariant predicates a stored sequence must satisfy for a
/// match to be possible.
pub struct InvariantFilter;

impl InvariantFilter {
    /// Predicate set for candidate selection.
    #[must_use]
    pub fn for_query(query: &SequenceQuery, mode: FilterMode) -> ScanPredicates {
        let qlen = query.len();

        // Wildcard invariants are unreliable; over-filtering would be
        // unsound, so keep only the length bound.
        if query.has_wildcards() {
            return ScanPredicates {
                min_length: Some(match mode {
                    FilterMode::Combination => query.min_match_length,
                    _ => qlen,
                }),
                ..Default::default()
            };
        }

        if mode == FilterMode::Combination {
            return ScanPredicates {
                min_length: Some(query.min_match_length),
                ..Default::default()
            };
        }

        let values = query.known_values();
        let mut preds = ScanPredicates {
            min_length: Some(qlen),
            ..Default::default()
        };

        if mode == FilterMode::Prefix && qlen >= 5 {
            preds.prefix_hash = Some(prefix_hash_of(&values));
        }

        preds.sign_patterns = compatible_patterns(sign_pattern_of(&values));
        if values.len() >= 2 {
            preds.first_diff_signs = compatible_patterns(sign_pattern_of(&first_diffs(&values)));
        }

        let slack = match mode {
            FilterMode::Subsequence => 1,
            _ => 0,
        };
        preds.min_nonzero = Some(query.nonzero_count().saturating_sub(slack));

        let gcd = query.gcd();
        if !gcd.is_zero() {
            preds.gcd_divides = Some(gcd);
        }

        preds
    }
}

/// Stored sign patterns compatible with a query pattern. `None` means no
/// constraint.
fn compatible_patterns(query_pattern: SignPattern) -> Option<Vec<SignPattern>> {
    match query_pattern {
        // An all-zero query can sit at the front of anything with a zero
        // prefix; the pattern tells us nothing.
        SignPattern::AllZero => None,
        SignPattern::Nonnegative => Some(vec![
            SignPattern::Nonnegative,
            SignPattern::AllZero,
            SignPattern::Mixed,
        ]),
        SignPattern::Nonpositive => Some(vec![
            SignPattern::Nonpositive,
            SignPattern::AllZero,
            SignPattern::Mixed,
        ]),
        SignPattern::Alternating => Some(vec![
            SignPattern::Alternating,
            SignPattern::Mixed,
            SignPattern::AllZero,
        ]),
        SignPattern::Mixed => Some(vec![
            SignPattern::Nonnegative,
            SignPattern::Nonpositive,
            SignPattern::Alternating,
            SignPattern::Mixed,
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn test_prefix_filter_uses_hash() {
        let q = SequenceQuery::from_i64(&[0, 1, 1, 2, 3, 5], 3, false);
        let preds = InvariantFilter::for_query(&q, FilterMode::Prefix);
        let expected: Vec<BigInt> = vec![0, 1, 1, 2, 3].into_iter().map(BigInt::from).collect();
        assert_eq!(preds.prefix_hash, Some(prefix_hash_of(&expected)));
        assert_eq!(preds.min_length, Some(6));
        assert_eq!(preds.min_nonzero, Some(5));
    }

    #[test]
    fn test_short_query_has_no_hash() {
        let q = SequenceQuery::from_i64(&[1, 2, 3], 3, false);
        let preds = InvariantFilter::for_query(&q, FilterMode::Prefix);
        assert_eq!(preds.prefix_hash, None);
    }

    #[test]
    fn test_subsequence_slack() {
        let q = SequenceQuery::from_i64(&[1, 2, 3, 4, 5], 3, true);
        let preds = InvariantFilter::for_query(&q, FilterMode::Subsequence);
        assert_eq!(preds.prefix_hash, None);
        assert_eq!(preds.min_nonzero, Some(4));
    }

    #[test]
    fn test_sign_compatibility() {
        let q = SequenceQuery::from_i64(&[1, -2, 3, -4], 3, false);
        let preds = InvariantFilter::for_query(&q, FilterMode::Prefix);
        let signs = preds.sign_patterns.unwrap();
        assert!(signs.contains(&SignPattern::Alternating));
        assert!(signs.contains(&SignPattern::Mixed));
        assert!(!signs.contains(&SignPattern::Nonnegative));

        let q = SequenceQuery::from_i64(&[0, 0, 0], 3, false);
        let preds = InvariantFilter::for_query(&q, FilterMode::Prefix);
        assert!(preds.sign_patterns.is_none());
    }

    #[test]
    fn test_gcd_predicate_direction() {
        // The stored gcd may be coarser than the query's; we require the
        // stored gcd to divide the query gcd, never the other way round.
        let q = SequenceQuery::from_i64(&[6, 12, 18], 3, false);
        let preds = InvariantFilter::for_query(&q, FilterMode::Prefix);
        assert_eq!(preds.gcd_divides, Some(BigInt::from(6)));

        let q = SequenceQuery::from_i64(&[0, 0], 2, false);
        let preds = InvariantFilter::for_query(&q, FilterMode::Prefix);
        assert_eq!(preds.gcd_divides, None);
    }

    #[test]
    fn test_combination_mode_is_relaxed() {
        let q = SequenceQuery::from_i64(&[7, 14, 21, 28, 35], 3, false);
        let preds = InvariantFilter::for_query(&q, FilterMode::Combination);
        assert!(preds.sign_patterns.is_none());
        assert!(preds.first_diff_signs.is_none());
        assert!(preds.min_nonzero.is_none());
        assert!(preds.gcd_divides.is_none());
        assert!(preds.prefix_hash.is_none());
        assert_eq!(preds.min_length, Some(3));
    }

    #[test]
    fn test_wildcards_fall_back_to_length_only() {
        let mut q = SequenceQuery::from_i64(&[1, 2, 3, 4, 5, 6], 3, false);
        q.terms[2] = None;
        let preds = InvariantFilter::for_query(&q, FilterMode::Prefix);
        assert!(preds.prefix_hash.is_none());
        assert!(preds.sign_patterns.is_none());
        assert_eq!(preds.min_length, Some(6));
    }
}
