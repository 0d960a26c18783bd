//! Linear-combination search: expresses the query as a small integer or
//! rational combination of two or three shifted, optionally transformed
//! stored sequences.

pub mod bucket;
pub mod rational;
pub mod solver;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::core::config::ComboConfig;
use crate::core::types::SequenceId;

pub use self::bucket::{build_bucket, CandidateBucket};
pub use self::solver::{search_pair_combinations, search_triple_combinations, ComboOutcome};

/// Transform applied to a single component before shifting and combining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTransform {
    Identity,
    Diff,
    PartialSum,
}

impl ComponentTransform {
    #[must_use]
    pub fn apply(self, terms: &[BigInt]) -> Vec<BigInt> {
        match self {
            Self::Identity => terms.to_vec(),
            Self::Diff => crate::core::record::first_diffs(terms),
            Self::PartialSum => {
                let mut acc = BigInt::zero();
                terms
                    .iter()
                    .map(|t| {
                        acc += t;
                        acc.clone()
                    })
                    .collect()
            }
        }
    }

    #[must_use]
    pub fn weight(self, cfg: &ComboConfig) -> u32 {
        match self {
            Self::Identity => 0,
            Self::Diff => cfg.weight_diff,
            Self::PartialSum => cfg.weight_partial_sum,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "id",
            Self::Diff => "diff",
            Self::PartialSum => "partial_sum",
        }
    }
}

/// A combination coefficient: small integer from brute force, or a reduced
/// rational from exact elimination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coefficient {
    Integer(i64),
    Rational(BigRational),
}

impl Coefficient {
    #[must_use]
    pub fn as_rational(&self) -> BigRational {
        match self {
            Self::Integer(v) => BigRational::from_integer(BigInt::from(*v)),
            Self::Rational(r) => r.clone(),
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Integer(v) => *v == 0,
            Self::Rational(r) => r.is_zero(),
        }
    }

    /// |coefficient| as a float, for complexity scoring.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        match self {
            Self::Integer(v) => v.unsigned_abs() as f64,
            Self::Rational(r) => r.abs().to_f64().unwrap_or(f64::INFINITY),
        }
    }
}

impl std::fmt::Display for Coefficient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Rational(r) => {
                if r.is_integer() {
                    write!(f, "{}", r.numer())
                } else {
                    write!(f, "{}/{}", r.numer(), r.denom())
                }
            }
        }
    }
}

/// A verified linear combination reproducing the query.
///
/// Every reported combination satisfies
/// `sum_i coeff_i * T_i(S_i)[n + shift_i] = q[n]` exactly on all `length`
/// verified positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationMatch {
    pub ids: Vec<SequenceId>,
    pub names: Vec<Option<String>>,
    pub coefficients: Vec<Coefficient>,
    pub shifts: Vec<i64>,
    pub component_transforms: Vec<ComponentTransform>,
    /// Query positions verified
    pub length: usize,
    pub complexity: f64,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_terms: Option<Vec<Vec<BigInt>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_terms: Option<Vec<BigInt>>,
}

impl CombinationMatch {
    /// `complexity = m + sum|coeff| + sum|shift| + sum transform weights`
    #[must_use]
    pub fn complexity_of(
        coefficients: &[Coefficient],
        shifts: &[i64],
        transforms: &[ComponentTransform],
        cfg: &ComboConfig,
    ) -> f64 {
        let m = coefficients.len() as f64;
        let coeff_sum: f64 = coefficients.iter().map(Coefficient::magnitude).sum();
        let shift_sum: f64 = shifts.iter().map(|s| s.unsigned_abs() as f64).sum();
        let t_sum: f64 = transforms.iter().map(|t| f64::from(t.weight(cfg))).sum();
        m + coeff_sum + shift_sum + t_sum
    }
}

/// Deterministic result order: ascending complexity, then descending
/// verified length, then lexicographic component ids.
pub fn sort_combination_matches(matches: &mut [CombinationMatch]) {
    matches.sort_by(|a, b| {
        a.complexity
            .partial_cmp(&b.complexity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.length.cmp(&a.length))
            .then_with(|| a.ids.cmp(&b.ids))
    });
}
