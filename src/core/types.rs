use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Unique identifier for an OEIS entry: `A` followed by six decimal digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub String);

impl SequenceId {
    /// Build an id without validation. Prefer `parse()` for untrusted input.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the `A` + six digits shape.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        s.len() == 7 && s.starts_with('A') && s[1..].bytes().all(|b| b.is_ascii_digit())
    }
}

impl FromStr for SequenceId {
    type Err = InvalidSequenceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidSequenceId(s.to_string()))
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("not a valid A-number: {0:?}")]
pub struct InvalidSequenceId(pub String);

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sign pattern of a finite integer sequence.
///
/// Also used for the sign pattern of the first-difference series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignPattern {
    AllZero,
    Nonnegative,
    Nonpositive,
    Alternating,
    Mixed,
}

impl SignPattern {
    /// Stable text form used by the store's backing index.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllZero => "all_zero",
            Self::Nonnegative => "nonneg",
            Self::Nonpositive => "nonpos",
            Self::Alternating => "alternating",
            Self::Mixed => "mixed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all_zero" => Some(Self::AllZero),
            "nonneg" => Some(Self::Nonnegative),
            "nonpos" => Some(Self::Nonpositive),
            "alternating" => Some(Self::Alternating),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// Type of exact match found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Query equals the leading terms of the stored sequence
    Prefix,
    /// Query occurs as a contiguous window inside the stored sequence
    Subsequence,
}

/// Which hard cap fired when a stage was cut short
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapKind {
    Time,
    Checks,
    Chains,
    Bucket,
}

/// Search-effort preset applied to the whole pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Fast,
    #[default]
    Deep,
    Max,
}

/// Wall-clock deadline threaded through each pipeline stage.
///
/// Checked at safe points only: between candidate records, between transform
/// chains, and between (pair, shift) iterations in combination search.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    #[must_use]
    pub fn after_ms(ms: u64) -> Self {
        Self::after(Duration::from_millis(ms))
    }

    /// A deadline that never fires.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        match self.0 {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_id_validation() {
        assert!(SequenceId::is_valid("A000045"));
        assert!(!SequenceId::is_valid("A00045"));
        assert!(!SequenceId::is_valid("B000045"));
        assert!(!SequenceId::is_valid("A00004x"));
        assert!("A000045".parse::<SequenceId>().is_ok());
        assert!("045".parse::<SequenceId>().is_err());
    }

    #[test]
    fn test_sign_pattern_round_trip() {
        for sp in [
            SignPattern::AllZero,
            SignPattern::Nonnegative,
            SignPattern::Nonpositive,
            SignPattern::Alternating,
            SignPattern::Mixed,
        ] {
            assert_eq!(SignPattern::parse(sp.as_str()), Some(sp));
        }
        assert_eq!(SignPattern::parse("bogus"), None);
    }

    #[test]
    fn test_deadline() {
        assert!(!Deadline::none().expired());
        assert!(Deadline::after(Duration::from_secs(0)).expired());
        assert!(!Deadline::after(Duration::from_secs(3600)).expired());
    }
}
