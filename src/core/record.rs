use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::core::types::{SequenceId, SignPattern};

/// Number of leading terms folded into the prefix hash.
pub const PREFIX_HASH_TERMS: usize = 5;

/// An OEIS entry in the local snapshot, with derived invariants.
///
/// Records are created once during index build and are immutable for the
/// life of a matching process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub id: SequenceId,
    pub terms: Vec<BigInt>,
    pub name: Option<String>,
    pub keywords: Vec<String>,
    pub invariants: Invariants,
}

impl SequenceRecord {
    /// Build a record and derive its invariants from `terms`.
    #[must_use]
    pub fn new(id: SequenceId, terms: Vec<BigInt>) -> Self {
        let invariants = Invariants::derive(&terms);
        Self {
            id,
            terms,
            name: None,
            keywords: Vec::new(),
            invariants,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    /// Count of terms actually present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Return a copy truncated to the first `max_terms` terms, with
    /// invariants re-derived over the shortened series.
    #[must_use]
    pub fn truncated(&self, max_terms: usize) -> Self {
        if self.terms.len() <= max_terms {
            return self.clone();
        }
        let mut rec = Self::new(self.id.clone(), self.terms[..max_terms].to_vec());
        rec.name = self.name.clone();
        rec.keywords = self.keywords.clone();
        rec
    }
}

/// Invariants derived from a record's terms, used for candidate filtering.
///
/// `prefix_hash` is a function of the first five terms (or all terms if
/// fewer) and of nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invariants {
    pub prefix_hash: i64,
    pub min_val: BigInt,
    pub max_val: BigInt,
    /// gcd of absolute values; zero iff every term is zero
    pub gcd_val: BigInt,
    pub is_nondecreasing: bool,
    pub is_nonincreasing: bool,
    pub sign_pattern: SignPattern,
    pub nonzero_count: u32,
    /// Sign pattern of the first-difference series; `None` below two terms
    pub first_diff_sign: Option<SignPattern>,
    /// Approximate exponent `g` with `|a_n| ~ c*exp(g*n)`; `None` when the
    /// sequence is too short or flat to fit
    pub growth_rate: Option<f64>,
    pub variance: Option<f64>,
    pub diff_variance: Option<f64>,
}

impl Invariants {
    #[must_use]
    pub fn derive(terms: &[BigInt]) -> Self {
        let zero = BigInt::zero();
        let min_val = terms.iter().min().cloned().unwrap_or_else(|| zero.clone());
        let max_val = terms.iter().max().cloned().unwrap_or_else(|| zero.clone());
        let diffs = first_diffs(terms);
        Self {
            prefix_hash: prefix_hash_of(terms),
            min_val,
            max_val,
            gcd_val: gcd_of_abs(terms),
            is_nondecreasing: terms.windows(2).all(|w| w[0] <= w[1]),
            is_nonincreasing: terms.windows(2).all(|w| w[0] >= w[1]),
            sign_pattern: sign_pattern_of(terms),
            nonzero_count: terms.iter().filter(|t| !t.is_zero()).count() as u32,
            first_diff_sign: if terms.len() < 2 {
                None
            } else {
                Some(sign_pattern_of(&diffs))
            },
            growth_rate: growth_rate_of(terms),
            variance: variance_of(terms),
            diff_variance: variance_of(&diffs),
        }
    }
}

/// Stable, order-sensitive 64-bit digest of the first five terms.
///
/// Folds the decimal rendering of `terms[..min(5, len)]` through MD5 and
/// keeps the leading eight bytes, so the value is identical across runs and
/// platforms.
#[must_use]
pub fn prefix_hash_of(terms: &[BigInt]) -> i64 {
    let n = terms.len().min(PREFIX_HASH_TERMS);
    let joined = terms[..n]
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let digest = md5::compute(joined.as_bytes());
    i64::from_be_bytes(digest.0[..8].try_into().unwrap_or([0; 8]))
}

/// First differences `a[i+1] - a[i]`; empty below two terms.
#[must_use]
pub fn first_diffs(terms: &[BigInt]) -> Vec<BigInt> {
    terms.windows(2).map(|w| &w[1] - &w[0]).collect()
}

/// gcd of absolute values; zero for an empty or all-zero slice.
#[must_use]
pub fn gcd_of_abs(terms: &[BigInt]) -> BigInt {
    let mut g = BigInt::zero();
    for t in terms {
        g = g.gcd(&t.abs());
    }
    g
}

/// Classify the signs of a term series.
#[must_use]
pub fn sign_pattern_of(terms: &[BigInt]) -> SignPattern {
    if terms.iter().all(Zero::is_zero) {
        return SignPattern::AllZero;
    }
    if terms.iter().all(|t| t.sign() != Sign::Minus) {
        return SignPattern::Nonnegative;
    }
    if terms.iter().all(|t| t.sign() != Sign::Plus) {
        return SignPattern::Nonpositive;
    }
    let alternating = terms.windows(2).all(|w| {
        w[0].is_zero() || w[1].is_zero() || (w[0].sign() == Sign::Plus) != (w[1].sign() == Sign::Plus)
    });
    if alternating {
        SignPattern::Alternating
    } else {
        SignPattern::Mixed
    }
}

/// Population variance of the series in `f64`.
///
/// `None` when the slice is empty or a term does not fit `f64`.
#[must_use]
pub fn variance_of(terms: &[BigInt]) -> Option<f64> {
    if terms.is_empty() {
        return None;
    }
    let vals: Vec<f64> = terms
        .iter()
        .map(ToPrimitive::to_f64)
        .collect::<Option<Vec<_>>>()?;
    if vals.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let n = vals.len() as f64;
    let mean = vals.iter().sum::<f64>() / n;
    Some(vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n)
}

/// Least-squares slope of `ln|a_n|` against `n` over the nonzero terms.
///
/// `None` with fewer than three usable points or when the magnitudes are
/// flat (no exponent to fit).
#[must_use]
pub fn growth_rate_of(terms: &[BigInt]) -> Option<f64> {
    let mut points: Vec<(f64, f64)> = Vec::new();
    for (n, t) in terms.iter().enumerate() {
        if t.is_zero() {
            continue;
        }
        let mag = t.abs().to_f64()?;
        if !mag.is_finite() {
            return None;
        }
        points.push((n as f64, mag.ln()));
    }
    if points.len() < 3 {
        return None;
    }
    let k = points.len() as f64;
    let sx: f64 = points.iter().map(|p| p.0).sum();
    let sy: f64 = points.iter().map(|p| p.1).sum();
    let sxx: f64 = points.iter().map(|p| p.0 * p.0).sum();
    let sxy: f64 = points.iter().map(|p| p.0 * p.1).sum();
    let denom = k * sxx - sx * sx;
    if denom == 0.0 {
        return None;
    }
    let first = points[0].1;
    if points.iter().all(|p| (p.1 - first).abs() < 1e-12) {
        return None;
    }
    Some((k * sxy - sx * sy) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(vals: &[i64]) -> Vec<BigInt> {
        vals.iter().map(|&v| BigInt::from(v)).collect()
    }

    #[test]
    fn test_prefix_hash_depends_only_on_first_five() {
        let a = prefix_hash_of(&ints(&[1, 2, 3, 4, 5, 6, 7]));
        let b = prefix_hash_of(&ints(&[1, 2, 3, 4, 5, 99, 100]));
        assert_eq!(a, b);
        let c = prefix_hash_of(&ints(&[1, 2, 3, 4, 6]));
        assert_ne!(a, c);
    }

    #[test]
    fn test_prefix_hash_is_order_sensitive() {
        assert_ne!(
            prefix_hash_of(&ints(&[1, 2, 3, 4, 5])),
            prefix_hash_of(&ints(&[5, 4, 3, 2, 1]))
        );
        // Concatenation ambiguity: [1, 23] vs [12, 3]
        assert_ne!(
            prefix_hash_of(&ints(&[1, 23])),
            prefix_hash_of(&ints(&[12, 3]))
        );
    }

    #[test]
    fn test_sign_patterns() {
        assert_eq!(sign_pattern_of(&ints(&[0, 0, 0])), SignPattern::AllZero);
        assert_eq!(sign_pattern_of(&ints(&[0, 1, 2])), SignPattern::Nonnegative);
        assert_eq!(sign_pattern_of(&ints(&[0, -1, -2])), SignPattern::Nonpositive);
        assert_eq!(
            sign_pattern_of(&ints(&[1, -2, 3, -4])),
            SignPattern::Alternating
        );
        assert_eq!(sign_pattern_of(&ints(&[1, 2, -3, 4])), SignPattern::Mixed);
    }

    #[test]
    fn test_gcd_of_abs() {
        assert_eq!(gcd_of_abs(&ints(&[6, -9, 12])), BigInt::from(3));
        assert_eq!(gcd_of_abs(&ints(&[0, 0])), BigInt::from(0));
        assert_eq!(gcd_of_abs(&ints(&[0, 5, 10])), BigInt::from(5));
    }

    #[test]
    fn test_invariants_fibonacci() {
        let fib = ints(&[0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);
        let inv = Invariants::derive(&fib);
        assert_eq!(inv.sign_pattern, SignPattern::Nonnegative);
        assert!(inv.is_nondecreasing);
        assert!(!inv.is_nonincreasing);
        assert_eq!(inv.nonzero_count, 9);
        assert_eq!(inv.min_val, BigInt::from(0));
        assert_eq!(inv.max_val, BigInt::from(34));
        assert_eq!(inv.first_diff_sign, Some(SignPattern::Nonnegative));
        // Fibonacci grows like phi^n
        let g = inv.growth_rate.unwrap();
        assert!(g > 0.3 && g < 0.7, "unexpected growth rate {g}");
    }

    #[test]
    fn test_growth_rate_flat_and_short() {
        assert_eq!(growth_rate_of(&ints(&[7, 7, 7, 7])), None);
        assert_eq!(growth_rate_of(&ints(&[1, 2])), None);
        assert_eq!(growth_rate_of(&ints(&[0, 0, 0, 0])), None);
    }

    #[test]
    fn test_variance() {
        assert_eq!(variance_of(&ints(&[2, 2, 2])), Some(0.0));
        let v = variance_of(&ints(&[1, 2, 3])).unwrap();
        assert!((v - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(variance_of(&[]), None);
    }

    #[test]
    fn test_truncated_rederives_invariants() {
        let rec = SequenceRecord::new(
            SequenceId::new("A000045"),
            ints(&[0, 1, 1, 2, 3, 5, 8, 13]),
        )
        .with_name("Fibonacci numbers");
        let short = rec.truncated(5);
        assert_eq!(short.len(), 5);
        assert_eq!(short.invariants.max_val, BigInt::from(3));
        assert_eq!(short.name.as_deref(), Some("Fibonacci numbers"));
        // Hash of the first five terms is unchanged by truncation to >= 5
        assert_eq!(short.invariants.prefix_hash, rec.invariants.prefix_hash);
    }
}
