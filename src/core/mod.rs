//! Core data types: records, queries, invariants, and configuration.

pub mod config;
pub mod query;
pub mod record;
pub mod types;

pub use self::config::AnalyzerConfig;
pub use self::query::SequenceQuery;
pub use self::record::{Invariants, SequenceRecord};
pub use self::types::{CapKind, Deadline, MatchType, Profile, SequenceId, SignPattern};
