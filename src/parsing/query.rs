use std::str::FromStr;

use num_bigint::BigInt;

use crate::core::query::SequenceQuery;
use crate::parsing::ParseError;

/// Largest tolerated fraction of wildcard terms in a query.
const MAX_WILDCARD_RATIO: f64 = 0.5;

/// Parse a comma- or whitespace-separated list of signed integers into a
/// query. `?` and `*` are single-term wildcards, capped at `max_wildcards`
/// and at half of the query overall.
///
/// Surrounding whitespace, `+` signs and bracket punctuation are tolerated;
/// any other non-integer token is an error.
pub fn parse_query(
    text: &str,
    min_match_length: usize,
    allow_subsequence: bool,
    max_wildcards: usize,
) -> Result<SequenceQuery, ParseError> {
    let mut terms: Vec<Option<BigInt>> = Vec::new();

    for raw in text.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = raw.trim_matches(|c| c == '[' || c == ']' || c == '(' || c == ')');
        if token.is_empty() {
            continue;
        }
        if token == "?" || token == "*" {
            terms.push(None);
            continue;
        }
        let cleaned = token.strip_prefix('+').unwrap_or(token);
        match BigInt::from_str(cleaned) {
            Ok(value) => terms.push(Some(value)),
            Err(_) => return Err(ParseError::InvalidToken(token.to_string())),
        }
    }

    if terms.is_empty() {
        return Err(ParseError::Empty);
    }

    let wildcard_count = terms.iter().filter(|t| t.is_none()).count();
    if wildcard_count > 0 {
        if wildcard_count > max_wildcards {
            return Err(ParseError::TooManyWildcards {
                count: wildcard_count,
                max: max_wildcards,
            });
        }
        if wildcard_count as f64 / terms.len() as f64 > MAX_WILDCARD_RATIO {
            return Err(ParseError::WildcardRatio);
        }
    }

    Ok(SequenceQuery {
        terms,
        min_match_length,
        allow_subsequence,
    })
}
