//! Indexed corpus storage: the SQLite-backed store, the invariant filter
//! that narrows scans, and the one-shot index builder.

pub mod builder;
pub mod index;
pub mod store;

pub use self::builder::IndexBuilder;
pub use self::index::{FilterMode, InvariantFilter};
pub use self::store::{ScanPredicates, SequenceStore, StoreError};
