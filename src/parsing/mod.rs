//! Parsers for the raw OEIS snapshot files and for user-typed queries.

pub mod query;
pub mod stripped;

pub use self::query::parse_query;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no sequence terms found in input")]
    Empty,

    #[error("not an integer term: {0:?}")]
    InvalidToken(String),

    #[error("too many wildcards ({count}); at most {max} allowed")]
    TooManyWildcards { count: usize, max: usize },

    #[error("wildcard fraction too high; provide more concrete terms")]
    WildcardRatio,
}
