//! Matching engines: exact prefix/subsequence matching, similarity
//! ranking, and the pipeline orchestrator.

pub mod engine;
pub mod matcher;
pub mod similarity;

pub use self::engine::{AnalysisResult, AnalyzeError, Analyzer, Diagnostics, StageDiagnostics};
pub use self::matcher::{prefix_match, subsequence_match, Match};
pub use self::similarity::{rank_candidates, ScoredCandidate, SimilarityRow};
