use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::core::record::{gcd_of_abs, sign_pattern_of};
use crate::core::types::SignPattern;

/// A user-supplied sequence to identify.
///
/// Wildcard positions are `None` and match any integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceQuery {
    pub terms: Vec<Option<BigInt>>,
    /// Minimum overlap to accept
    pub min_match_length: usize,
    pub allow_subsequence: bool,
}

impl SequenceQuery {
    /// Query from fully concrete terms.
    #[must_use]
    pub fn from_values(values: Vec<BigInt>, min_match_length: usize, allow_subsequence: bool) -> Self {
        Self {
            terms: values.into_iter().map(Some).collect(),
            min_match_length,
            allow_subsequence,
        }
    }

    /// Convenience constructor for small test queries.
    #[must_use]
    pub fn from_i64(values: &[i64], min_match_length: usize, allow_subsequence: bool) -> Self {
        Self::from_values(
            values.iter().map(|&v| BigInt::from(v)).collect(),
            min_match_length,
            allow_subsequence,
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[must_use]
    pub fn wildcard_count(&self) -> usize {
        self.terms.iter().filter(|t| t.is_none()).count()
    }

    #[must_use]
    pub fn has_wildcards(&self) -> bool {
        self.terms.iter().any(Option::is_none)
    }

    /// All terms as concrete values; `None` when any wildcard is present.
    #[must_use]
    pub fn concrete_terms(&self) -> Option<Vec<BigInt>> {
        self.terms.iter().cloned().collect()
    }

    /// The concrete (non-wildcard) values, in order.
    #[must_use]
    pub fn known_values(&self) -> Vec<BigInt> {
        self.terms.iter().flatten().cloned().collect()
    }

    #[must_use]
    pub fn nonzero_count(&self) -> u32 {
        self.terms
            .iter()
            .flatten()
            .filter(|t| !t.is_zero())
            .count() as u32
    }

    /// Sign pattern over the concrete values.
    #[must_use]
    pub fn sign_pattern(&self) -> SignPattern {
        sign_pattern_of(&self.known_values())
    }

    /// gcd of absolute concrete values; zero when all are zero.
    #[must_use]
    pub fn gcd(&self) -> BigInt {
        gcd_of_abs(&self.known_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        let mut q = SequenceQuery::from_i64(&[1, 2, 3], 3, false);
        assert!(!q.has_wildcards());
        assert!(q.concrete_terms().is_some());

        q.terms[1] = None;
        assert_eq!(q.wildcard_count(), 1);
        assert!(q.concrete_terms().is_none());
        assert_eq!(q.known_values(), vec![BigInt::from(1), BigInt::from(3)]);
    }

    #[test]
    fn test_derived_stats() {
        let q = SequenceQuery::from_i64(&[0, 4, -8, 12], 3, false);
        assert_eq!(q.nonzero_count(), 3);
        assert_eq!(q.gcd(), BigInt::from(4));
        assert_eq!(q.sign_pattern(), SignPattern::Mixed);
    }
}
