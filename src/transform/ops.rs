use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::core::config::{OperatorSet, TransformConfig};

/// Hard cap on the output length of `rle_decode`, guarding against runaway
/// expansion from adversarial run lengths.
const RLE_DECODE_CAP: usize = 512;

/// Largest exponent `exp(base)` will raise to before the chain is discarded.
const EXP_CLAMP: i64 = 256;

/// An integer-sequence operator.
///
/// Operators form a static table: each variant knows how to apply itself,
/// which complexity class it belongs to, and renders its own description.
/// Chain enumeration iterates the instance list built by
/// [`operator_instances`]; there is no runtime dispatch table to keep in
/// sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operator {
    Scale { factor: i64 },
    Affine { scale: i64, offset: i64 },
    ShiftForward { k: usize },
    ShiftBack { k: usize },
    Diff,
    Diff2,
    PartialSum,
    Abs,
    GcdNorm,
    Decimate { k: usize },
    Reverse,
    EvenIndexed,
    OddIndexed,
    MovSum { k: usize },
    CumProd,
    PopCount,
    DigitSum { base: u32 },
    Mod { modulus: i64 },
    XorIndex,
    Rle,
    RleDecode,
    ConcatIndex { base: u32 },
    Log { base: u32 },
    Exp { base: u32 },
    Binomial,
    Euler,
    Mobius,
}

/// Complexity class driving the configurable weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    Basic,
    OptIn,
    Exotic,
}

impl Operator {
    /// Apply the operator to a finite sequence.
    ///
    /// `None` means the operator is not applicable to this input (bad
    /// parameters, failed exact division, clamp exceeded); the enclosing
    /// chain is discarded silently.
    #[must_use]
    pub fn apply(&self, terms: &[BigInt]) -> Option<Vec<BigInt>> {
        let n = terms.len();
        match self {
            Self::Scale { factor } => {
                let f = BigInt::from(*factor);
                Some(terms.iter().map(|t| t * &f).collect())
            }
            Self::Affine { scale, offset } => {
                let a = BigInt::from(*scale);
                let b = BigInt::from(*offset);
                Some(terms.iter().map(|t| t * &a + &b).collect())
            }
            Self::ShiftForward { k } => Some(terms.get(*k..).unwrap_or_default().to_vec()),
            Self::ShiftBack { k } => Some(terms.get(..n.saturating_sub(*k)).unwrap_or_default().to_vec()),
            Self::Diff => Some(crate::core::record::first_diffs(terms)),
            Self::Diff2 => {
                let once = crate::core::record::first_diffs(terms);
                Some(crate::core::record::first_diffs(&once))
            }
            Self::PartialSum => {
                let mut acc = BigInt::zero();
                Some(
                    terms
                        .iter()
                        .map(|t| {
                            acc += t;
                            acc.clone()
                        })
                        .collect(),
                )
            }
            Self::Abs => Some(terms.iter().map(Signed::abs).collect()),
            Self::GcdNorm => {
                let g = crate::core::record::gcd_of_abs(terms);
                if g <= BigInt::one() {
                    Some(terms.to_vec())
                } else {
                    Some(terms.iter().map(|t| t / &g).collect())
                }
            }
            Self::Decimate { k } => {
                if *k == 0 {
                    return None;
                }
                Some(terms.iter().step_by(*k).cloned().collect())
            }
            Self::Reverse => Some(terms.iter().rev().cloned().collect()),
            Self::EvenIndexed => Some(terms.iter().step_by(2).cloned().collect()),
            Self::OddIndexed => Some(terms.iter().skip(1).step_by(2).cloned().collect()),
            Self::MovSum { k } => {
                if *k == 0 {
                    return None;
                }
                if *k > n {
                    return Some(Vec::new());
                }
                Some(terms.windows(*k).map(|w| w.iter().sum()).collect())
            }
            Self::CumProd => {
                let mut acc = BigInt::one();
                Some(
                    terms
                        .iter()
                        .map(|t| {
                            acc *= t;
                            acc.clone()
                        })
                        .collect(),
                )
            }
            Self::PopCount => Some(
                terms
                    .iter()
                    .map(|t| BigInt::from(t.magnitude().count_ones()))
                    .collect(),
            ),
            Self::DigitSum { base } => {
                if *base < 2 {
                    return None;
                }
                Some(terms.iter().map(|t| digit_sum(t, *base)).collect())
            }
            Self::Mod { modulus } => {
                if *modulus <= 0 {
                    return None;
                }
                let m = BigInt::from(*modulus);
                Some(terms.iter().map(|t| t.mod_floor(&m)).collect())
            }
            Self::XorIndex => Some(
                terms
                    .iter()
                    .enumerate()
                    .map(|(i, t)| t ^ BigInt::from(i))
                    .collect(),
            ),
            Self::Rle => {
                let mut out = Vec::new();
                let mut iter = terms.iter();
                let Some(mut current) = iter.next() else {
                    return Some(out);
                };
                let mut run = BigInt::one();
                for t in iter {
                    if t == current {
                        run += 1;
                    } else {
                        out.push(current.clone());
                        out.push(run);
                        current = t;
                        run = BigInt::one();
                    }
                }
                out.push(current.clone());
                out.push(run);
                Some(out)
            }
            Self::RleDecode => {
                if n % 2 != 0 {
                    return None;
                }
                let mut out = Vec::new();
                for pair in terms.chunks(2) {
                    let count = pair[1].to_usize()?;
                    if count == 0 || out.len() + count > RLE_DECODE_CAP {
                        return None;
                    }
                    out.extend(std::iter::repeat(pair[0].clone()).take(count));
                }
                Some(out)
            }
            Self::ConcatIndex { base } => {
                if *base < 2 {
                    return None;
                }
                Some(
                    terms
                        .iter()
                        .enumerate()
                        .map(|(i, t)| concat_index(i, t, *base))
                        .collect(),
                )
            }
            Self::Log { base } => {
                if *base < 2 {
                    return None;
                }
                Some(terms.iter().map(|t| floor_log(t, *base)).collect())
            }
            Self::Exp { base } => {
                if *base < 2 {
                    return None;
                }
                let b = BigInt::from(*base);
                let mut out = Vec::with_capacity(n);
                for t in terms {
                    if t.is_negative() {
                        out.push(BigInt::zero());
                        continue;
                    }
                    let e = t.to_i64()?;
                    if e > EXP_CLAMP {
                        return None;
                    }
                    out.push(b.pow(e as u32));
                }
                Some(out)
            }
            Self::Binomial => Some(binomial_transform(terms)),
            Self::Euler => euler_transform(terms),
            Self::Mobius => Some(mobius_transform(terms)),
        }
    }

    #[must_use]
    pub fn class(&self) -> OperatorClass {
        match self {
            Self::Scale { .. }
            | Self::Affine { .. }
            | Self::ShiftForward { .. }
            | Self::ShiftBack { .. }
            | Self::Diff
            | Self::Diff2
            | Self::PartialSum
            | Self::Abs
            | Self::GcdNorm
            | Self::Decimate { .. }
            | Self::Reverse
            | Self::EvenIndexed
            | Self::OddIndexed
            | Self::MovSum { .. }
            | Self::CumProd
            | Self::PopCount
            | Self::DigitSum { .. } => OperatorClass::Basic,
            Self::Mod { .. }
            | Self::XorIndex
            | Self::Rle
            | Self::RleDecode
            | Self::ConcatIndex { .. }
            | Self::Log { .. }
            | Self::Exp { .. } => OperatorClass::OptIn,
            Self::Binomial | Self::Euler | Self::Mobius => OperatorClass::Exotic,
        }
    }

    /// Complexity weight under the configured weight table.
    #[must_use]
    pub fn weight(&self, cfg: &TransformConfig) -> u32 {
        match self.class() {
            OperatorClass::Basic => cfg.weight_basic,
            OperatorClass::OptIn => cfg.weight_opt_in,
            OperatorClass::Exotic => cfg.weight_exotic,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scale { factor } => write!(f, "scale({factor})"),
            Self::Affine { scale, offset } => write!(f, "affine({scale},{offset})"),
            Self::ShiftForward { k } => write!(f, "shift_forward({k})"),
            Self::ShiftBack { k } => write!(f, "shift_back({k})"),
            Self::Diff => write!(f, "diff"),
            Self::Diff2 => write!(f, "diff2"),
            Self::PartialSum => write!(f, "partial_sum"),
            Self::Abs => write!(f, "abs"),
            Self::GcdNorm => write!(f, "gcd_norm"),
            Self::Decimate { k } => write!(f, "decimate({k})"),
            Self::Reverse => write!(f, "reverse"),
            Self::EvenIndexed => write!(f, "even_indexed"),
            Self::OddIndexed => write!(f, "odd_indexed"),
            Self::MovSum { k } => write!(f, "movsum({k})"),
            Self::CumProd => write!(f, "cumprod"),
            Self::PopCount => write!(f, "popcount"),
            Self::DigitSum { base } => write!(f, "digit_sum({base})"),
            Self::Mod { modulus } => write!(f, "mod({modulus})"),
            Self::XorIndex => write!(f, "xor_index"),
            Self::Rle => write!(f, "rle"),
            Self::RleDecode => write!(f, "rle_decode"),
            Self::ConcatIndex { base } => write!(f, "concat_index({base})"),
            Self::Log { base } => write!(f, "log({base})"),
            Self::Exp { base } => write!(f, "exp({base})"),
            Self::Binomial => write!(f, "binomial"),
            Self::Euler => write!(f, "euler"),
            Self::Mobius => write!(f, "mobius"),
        }
    }
}

/// Build the operator instance list enabled by the configuration.
#[must_use]
pub fn operator_instances(cfg: &TransformConfig) -> Vec<Operator> {
    let mut ops = Vec::new();

    for &factor in &cfg.scale_values {
        if factor != 0 && factor != 1 {
            ops.push(Operator::Scale { factor });
        }
    }
    let mut affine_scales: Vec<i64> = vec![1];
    affine_scales.extend(cfg.scale_values.iter().copied().filter(|&s| s != 0 && s != 1));
    for &scale in &affine_scales {
        for &offset in &cfg.affine_offsets {
            if offset != 0 {
                ops.push(Operator::Affine { scale, offset });
            }
        }
    }
    for &k in &cfg.shift_values {
        if k >= 1 {
            ops.push(Operator::ShiftForward { k });
            ops.push(Operator::ShiftBack { k });
        }
    }
    ops.push(Operator::Diff);
    ops.push(Operator::Diff2);
    ops.push(Operator::PartialSum);
    ops.push(Operator::Abs);
    ops.push(Operator::GcdNorm);
    for &k in &cfg.decimate_values {
        if k >= 2 {
            ops.push(Operator::Decimate { k });
        }
    }
    ops.push(Operator::Reverse);
    ops.push(Operator::EvenIndexed);
    ops.push(Operator::OddIndexed);
    for &k in &cfg.movsum_values {
        if k >= 2 {
            ops.push(Operator::MovSum { k });
        }
    }
    ops.push(Operator::CumProd);
    ops.push(Operator::PopCount);
    for &base in &cfg.digit_sum_bases {
        if base >= 2 {
            ops.push(Operator::DigitSum { base });
        }
    }

    if matches!(cfg.operator_set, OperatorSet::Extended | OperatorSet::Full) {
        for &modulus in &cfg.mod_values {
            if modulus >= 2 {
                ops.push(Operator::Mod { modulus });
            }
        }
        ops.push(Operator::XorIndex);
        ops.push(Operator::Rle);
        ops.push(Operator::RleDecode);
        for &base in &cfg.concat_bases {
            if base >= 2 {
                ops.push(Operator::ConcatIndex { base });
            }
        }
        for &base in &cfg.log_bases {
            if base >= 2 {
                ops.push(Operator::Log { base });
            }
        }
        for &base in &cfg.exp_bases {
            if base >= 2 {
                ops.push(Operator::Exp { base });
            }
        }
    }

    if cfg.operator_set == OperatorSet::Full {
        ops.push(Operator::Binomial);
        ops.push(Operator::Euler);
        ops.push(Operator::Mobius);
    }

    ops
}

fn digit_sum(value: &BigInt, base: u32) -> BigInt {
    let b = BigInt::from(base);
    let mut mag = value.abs();
    if mag.is_zero() {
        return BigInt::zero();
    }
    let mut sum = BigInt::zero();
    while !mag.is_zero() {
        let (q, r) = mag.div_rem(&b);
        sum += r;
        mag = q;
    }
    sum
}

fn digit_count(value: &BigInt, base: u32) -> u32 {
    let b = BigInt::from(base);
    let mut mag = value.abs();
    let mut count = 1;
    while mag >= b {
        mag /= &b;
        count += 1;
    }
    count
}

/// `floor(log_base(t))` for positive `t`, clamped to 0 otherwise.
fn floor_log(value: &BigInt, base: u32) -> BigInt {
    if !value.is_positive() {
        return BigInt::zero();
    }
    let b = BigInt::from(base);
    let mut v = value.clone();
    let mut log = 0i64;
    while v >= b {
        v /= &b;
        log += 1;
    }
    BigInt::from(log)
}

/// Base-digits of the index followed by the base-digits of `|t|`, keeping
/// the term's sign.
fn concat_index(index: usize, value: &BigInt, base: u32) -> BigInt {
    let shift = BigInt::from(base).pow(digit_count(value, base));
    let joined = BigInt::from(index) * shift + value.abs();
    if value.is_negative() {
        -joined
    } else {
        joined
    }
}

/// `b_n = sum_{k=0..n} C(n,k) a_k`
fn binomial_transform(terms: &[BigInt]) -> Vec<BigInt> {
    let mut out = Vec::with_capacity(terms.len());
    for n in 0..terms.len() {
        let mut coeff = BigInt::one();
        let mut acc = BigInt::zero();
        for (k, term) in terms.iter().take(n + 1).enumerate() {
            acc += &coeff * term;
            // C(n, k+1) from C(n, k); exact by construction
            coeff = coeff * BigInt::from((n - k) as u64) / BigInt::from((k + 1) as u64);
        }
        out.push(acc);
    }
    out
}

/// Classical Euler transform, treating the input as `a_1..a_N`.
///
/// `None` when an intermediate division is inexact, which signals the input
/// is not in the transform's image domain.
fn euler_transform(terms: &[BigInt]) -> Option<Vec<BigInt>> {
    let n = terms.len();
    // c[m] = sum over divisors d of m of d * a_d (1-indexed)
    let mut c = vec![BigInt::zero(); n + 1];
    for m in 1..=n {
        for d in 1..=m {
            if m % d == 0 {
                c[m] += BigInt::from(d as u64) * &terms[d - 1];
            }
        }
    }
    let mut b = vec![BigInt::zero(); n + 1];
    for m in 1..=n {
        let mut acc = c[m].clone();
        for k in 1..m {
            acc += &c[k] * &b[m - k];
        }
        let (q, r) = acc.div_rem(&BigInt::from(m as u64));
        if !r.is_zero() {
            return None;
        }
        b[m] = q;
    }
    Some(b[1..].to_vec())
}

/// Moebius function for small arguments by trial factorisation.
fn moebius(mut m: u64) -> i64 {
    let mut factors = 0;
    let mut p = 2;
    while p * p <= m {
        if m % p == 0 {
            m /= p;
            if m % p == 0 {
                return 0;
            }
            factors += 1;
        }
        p += 1;
    }
    if m > 1 {
        factors += 1;
    }
    if factors % 2 == 0 {
        1
    } else {
        -1
    }
}

/// Moebius transform `b_m = sum_{d|m} mu(m/d) a_d`, input taken as `a_1..a_N`.
fn mobius_transform(terms: &[BigInt]) -> Vec<BigInt> {
    let n = terms.len();
    let mut out = Vec::with_capacity(n);
    for m in 1..=n {
        let mut acc = BigInt::zero();
        for d in 1..=m {
            if m % d == 0 {
                acc += BigInt::from(moebius((m / d) as u64)) * &terms[d - 1];
            }
        }
        out.push(acc);
    }
    out
}
