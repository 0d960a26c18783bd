//! # oeis-solver
//!
//! A library for identifying integer sequences against a local OEIS
//! snapshot.
//!
//! Given a handful of terms, the obvious question is whether the sequence
//! already lives in OEIS, perhaps under a simple disguise. `oeis-solver`
//! answers it offline, in four escalating ways:
//!
//! - **Exact matching**: the query is a prefix of a stored sequence, or a
//!   contiguous window inside one (KMP, with `?` wildcards)
//! - **Transform search**: a short chain of operators (differencing,
//!   scaling, partial sums, ...) applied to the query reproduces a stored
//!   sequence
//! - **Similarity ranking**: best-fit affine error and correlation against
//!   the filtered candidate set
//! - **Combination search**: the query is a small integer or rational
//!   linear combination of two or three shifted stored sequences
//!
//! All arithmetic is arbitrary precision, every reported combination is
//! verified exactly, and results are deterministic for fixed inputs and
//! configuration.
//!
//! ## Example
//!
//! ```rust,no_run
//! use oeis_solver::{Analyzer, AnalyzerConfig, SequenceQuery, SequenceStore};
//!
//! let store = SequenceStore::open(std::path::Path::new("data/oeis.db")).unwrap();
//! let analyzer = Analyzer::new(&store, AnalyzerConfig::default());
//!
//! let query = SequenceQuery::from_i64(&[0, 1, 1, 2, 3, 5, 8], 3, false);
//! let result = analyzer.analyze(&query).unwrap();
//!
//! for m in &result.exact_matches {
//!     println!("{}: {}", m.id, m.score);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: SQLite-backed sequence store, invariant filter, builder
//! - [`core`]: records, queries, invariants, configuration
//! - [`matching`]: exact matcher, similarity ranker, pipeline engine
//! - [`transform`]: sequence operators and chain search
//! - [`combination`]: pair/triple linear-combination solver
//! - [`parsing`]: snapshot and query parsers
//! - [`render`]: human and LaTeX explanations
//! - [`cli`]: command-line interface implementation

pub mod catalog;
pub mod cli;
pub mod combination;
pub mod core;
pub mod matching;
pub mod parsing;
pub mod render;
pub mod transform;

// Re-export commonly used types for convenience
pub use crate::catalog::store::{ScanPredicates, SequenceStore, StoreError};
pub use crate::combination::{Coefficient, CombinationMatch};
pub use crate::core::config::AnalyzerConfig;
pub use crate::core::query::SequenceQuery;
pub use crate::core::record::SequenceRecord;
pub use crate::core::types::{Profile, SequenceId};
pub use crate::matching::engine::{AnalysisResult, AnalyzeError, Analyzer};
pub use crate::matching::matcher::Match;
pub use crate::transform::ops::Operator;
