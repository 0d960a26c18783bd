use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::Profile;

/// Hard ceiling on similarity top-K and combination bucket size.
pub const CANDIDATE_HARD_CAP: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Which operator classes the transform engine may draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OperatorSet {
    /// Arithmetic, differencing, selection and windowing operators
    Basic,
    /// Basic plus the opt-in operators (mod, xor, log/exp, rle, concat)
    Extended,
    /// Everything, including binomial, Euler and Moebius transforms
    Full,
}

/// Immutable configuration threaded through every call of the pipeline.
///
/// Constructed from a profile preset, optionally overridden by a TOML file
/// and CLI flags; never mutated after a query starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Cap on terms kept per stored record
    pub max_stored_terms: usize,
    /// Queries shorter than this are rejected
    pub min_match_length: usize,
    pub allow_subsequence: bool,
    pub max_wildcards: usize,
    /// Retry the exact stage as a subsequence search when the prefix search
    /// comes back empty
    pub fallback_subsequence: bool,
    pub exact_limit: usize,
    pub exact_max_time_ms: u64,
    /// Stored-sequence window length attached to matches, if any
    pub snippet_len: Option<usize>,
    pub stages: StageToggles,
    pub transform: TransformConfig,
    pub similarity: SimilarityConfig,
    pub combo: ComboConfig,
    pub triple: TripleConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_stored_terms: 64,
            min_match_length: 3,
            allow_subsequence: false,
            max_wildcards: 2,
            fallback_subsequence: true,
            exact_limit: 10,
            exact_max_time_ms: 2_000,
            snippet_len: None,
            stages: StageToggles::default(),
            transform: TransformConfig::default(),
            similarity: SimilarityConfig::default(),
            combo: ComboConfig::default(),
            triple: TripleConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Configuration preset for a profile.
    #[must_use]
    pub fn for_profile(profile: Profile) -> Self {
        let mut cfg = Self::default();
        match profile {
            Profile::Fast => {
                cfg.transform.max_depth = 1;
                cfg.transform.max_time_ms = 1_000;
                cfg.similarity.top_k = 50;
                cfg.combo.max_checks = 100_000;
                cfg.combo.max_time_ms = 2_000;
                cfg.triple.enabled = false;
            }
            Profile::Deep => {}
            Profile::Max => {
                cfg.transform.max_depth = 3;
                cfg.transform.operator_set = OperatorSet::Full;
                cfg.transform.max_time_ms = 60_000;
                cfg.transform.max_chains = 200_000;
                cfg.combo.max_checks = 5_000_000;
                cfg.combo.max_time_ms = 600_000;
                cfg.triple.enabled = true;
                cfg.triple.max_checks = 2_000_000;
                cfg.triple.max_time_ms = 600_000;
            }
        }
        cfg
    }

    /// Load overrides from a TOML file on top of the defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Per-stage on/off switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    pub exact: bool,
    pub transform: bool,
    pub similarity: bool,
    pub combinations: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            exact: true,
            transform: true,
            similarity: true,
            combinations: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub max_depth: usize,
    pub operator_set: OperatorSet,
    pub max_time_ms: u64,
    /// Cap on enumerated chains per query
    pub max_chains: usize,
    /// Transformed queries with variance below this are dropped unless the
    /// query itself is near-flat
    pub min_variance: f64,
    pub limit: usize,
    /// Complexity weight per operator class; tunable rather than hard-coded
    pub weight_basic: u32,
    pub weight_opt_in: u32,
    pub weight_exotic: u32,
    pub scale_values: Vec<i64>,
    pub affine_offsets: Vec<i64>,
    pub shift_values: Vec<usize>,
    pub decimate_values: Vec<usize>,
    pub movsum_values: Vec<usize>,
    pub digit_sum_bases: Vec<u32>,
    pub mod_values: Vec<i64>,
    pub log_bases: Vec<u32>,
    pub exp_bases: Vec<u32>,
    pub concat_bases: Vec<u32>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            operator_set: OperatorSet::Basic,
            max_time_ms: 2_000,
            max_chains: 20_000,
            min_variance: 0.0,
            limit: 20,
            weight_basic: 1,
            weight_opt_in: 2,
            weight_exotic: 3,
            scale_values: vec![-3, -2, -1, 2, 3],
            affine_offsets: vec![-1, 1],
            shift_values: vec![1, 2],
            decimate_values: vec![2, 3],
            movsum_values: vec![2, 3],
            digit_sum_bases: vec![10],
            mod_values: vec![2, 10],
            log_bases: vec![10],
            exp_bases: vec![2],
            concat_bases: vec![10],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub min_corr: f64,
    pub max_nmse: f64,
    pub top_k: usize,
    pub max_time_ms: u64,
}

impl SimilarityConfig {
    /// Requested top-K clamped to the hard cap.
    #[must_use]
    pub fn effective_top_k(&self) -> usize {
        self.top_k.min(CANDIDATE_HARD_CAP)
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            min_corr: 0.9,
            max_nmse: 1.0,
            top_k: 100,
            max_time_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboConfig {
    pub bucket_size: usize,
    /// Coefficient set for integer mode; zero is skipped for the leading
    /// coefficient
    pub coeffs: Vec<i64>,
    /// Also solve for rational coefficients by exact elimination
    pub rational: bool,
    pub max_denom: u32,
    pub max_coeff_num: u32,
    pub max_shift: i64,
    pub max_shift_back: i64,
    pub max_checks: u64,
    pub max_time_ms: u64,
    pub limit: usize,
    pub component_transforms: Vec<crate::combination::ComponentTransform>,
    /// Complexity weight of the diff / partial-sum component transforms
    pub weight_diff: u32,
    pub weight_partial_sum: u32,
}

impl ComboConfig {
    /// Bucket size clamped to the hard cap.
    #[must_use]
    pub fn effective_bucket_size(&self) -> usize {
        self.bucket_size.min(CANDIDATE_HARD_CAP)
    }
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            bucket_size: 60,
            coeffs: (-5..=5).collect(),
            rational: true,
            max_denom: 12,
            max_coeff_num: 20,
            max_shift: 2,
            max_shift_back: 1,
            max_checks: 200_000,
            max_time_ms: 5_000,
            limit: 20,
            // diff and partial_sum are supported per component but cost a
            // cubic blowup of the search space, so only identity is on by
            // default
            component_transforms: vec![crate::combination::ComponentTransform::Identity],
            weight_diff: 1,
            weight_partial_sum: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TripleConfig {
    pub enabled: bool,
    /// Run even when the bucket exceeds `bucket_cap`
    pub force: bool,
    pub bucket_cap: usize,
    pub coeffs: Vec<i64>,
    pub rational: bool,
    pub max_checks: u64,
    pub max_time_ms: u64,
    pub limit: usize,
}

impl Default for TripleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            force: false,
            bucket_cap: 30,
            coeffs: vec![-2, -1, 1, 2],
            rational: true,
            max_checks: 300_000,
            max_time_ms: 5_000,
            limit: 10,
        }
    }
}
