//! Composable integer-sequence operators and the bounded-depth chain
//! search built on top of them.

pub mod ops;
pub mod search;

pub use self::ops::{operator_instances, Operator};
pub use self::search::{
    apply_chain, chain_complexity, chain_description, search_transform_matches, TransformOutcome,
};
