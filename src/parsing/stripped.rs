use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;
use std::str::FromStr;

use flate2::read::GzDecoder;
use num_bigint::BigInt;
use tracing::warn;

use crate::core::record::SequenceRecord;
use crate::core::types::SequenceId;
use crate::parsing::ParseError;

/// Open a snapshot file, decompressing transparently when it ends in `.gz`.
fn open_maybe_gzip(path: &Path) -> std::io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Parse one line of the stripped export.
///
/// Lines look like `A000045 ,0,1,1,2,3,5,8,`: an A-number, whitespace, and
/// a comma-separated term list with optional leading/trailing commas or
/// brackets. Returns `None` for comments and malformed lines.
#[must_use]
pub fn parse_stripped_line(line: &str, max_terms: usize) -> Option<SequenceRecord> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (id_part, terms_part) = line.split_once(char::is_whitespace)?;
    let id = SequenceId::from_str(id_part).ok()?;

    let mut terms: Vec<BigInt> = Vec::new();
    for token in terms_part.split(',') {
        let token = token.trim().trim_matches(|c| c == '[' || c == ']');
        if token.is_empty() {
            continue;
        }
        match BigInt::from_str(token) {
            Ok(value) => terms.push(value),
            // Keep whatever parsed so far; OEIS term lists are only ever
            // truncated at the end.
            Err(_) => break,
        }
        if terms.len() >= max_terms {
            break;
        }
    }

    if terms.is_empty() {
        return None;
    }
    Some(SequenceRecord::new(id, terms))
}

/// Parse one line of the names export: `A000045 Fibonacci numbers`.
#[must_use]
pub fn parse_names_line(line: &str) -> Option<(SequenceId, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (id_part, title) = line.split_once(char::is_whitespace)?;
    let id = SequenceId::from_str(id_part).ok()?;
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some((id, title.to_string()))
}

/// Parse one line of the keywords export: `A000045 core,nonn,nice,easy`.
#[must_use]
pub fn parse_keywords_line(line: &str) -> Option<(SequenceId, Vec<String>)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (id_part, rest) = line.split_once(char::is_whitespace)?;
    let id = SequenceId::from_str(id_part).ok()?;
    let keywords: Vec<String> = rest
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    if keywords.is_empty() {
        return None;
    }
    Some((id, keywords))
}

/// Streaming reader over a stripped export, yielding one record per valid
/// line. Malformed lines are logged and skipped rather than failing the
/// whole ingest.
pub struct StrippedReader {
    lines: Lines<BufReader<Box<dyn Read>>>,
    max_terms: usize,
}

impl StrippedReader {
    pub fn open(path: &Path, max_terms: usize) -> Result<Self, ParseError> {
        let reader = open_maybe_gzip(path)?;
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            max_terms,
        })
    }
}

impl Iterator for StrippedReader {
    type Item = Result<SequenceRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) => match parse_stripped_line(&line, self.max_terms) {
                    Some(record) => return Some(Ok(record)),
                    None => {
                        if !line.trim().is_empty() && !line.starts_with('#') {
                            warn!(line = %line.chars().take(40).collect::<String>(), "skipping malformed stripped line");
                        }
                    }
                },
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

/// Load the id -> title mapping from a names export (plain or gzip).
pub fn load_names(path: &Path) -> Result<HashMap<SequenceId, String>, ParseError> {
    let reader = BufReader::new(open_maybe_gzip(path)?);
    let mut mapping = HashMap::new();
    for line in reader.lines() {
        if let Some((id, title)) = parse_names_line(&line?) {
            mapping.insert(id, title);
        }
    }
    Ok(mapping)
}

/// Load the id -> keywords mapping from a keywords export (plain or gzip).
pub fn load_keywords(path: &Path) -> Result<HashMap<SequenceId, Vec<String>>, ParseError> {
    let reader = BufReader::new(open_maybe_gzip(path)?);
    let mut mapping = HashMap::new();
    for line in reader.lines() {
        if let Some((id, keywords)) = parse_keywords_line(&line?) {
            mapping.insert(id, keywords);
        }
    }
    Ok(mapping)
}
