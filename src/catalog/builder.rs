use std::collections::HashMap;
use std::path::Path;

use num_traits::ToPrimitive;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::core::record::SequenceRecord;
use crate::core::types::SequenceId;
use crate::parsing::stripped::{load_keywords, load_names, StrippedReader};
use crate::parsing::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to read snapshot: {0}")]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index write error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sequences (
    id TEXT PRIMARY KEY,
    length INTEGER NOT NULL,
    terms TEXT NOT NULL,
    name TEXT,
    keywords TEXT,
    prefix_hash INTEGER NOT NULL,
    min_val TEXT NOT NULL,
    max_val TEXT NOT NULL,
    gcd_val INTEGER,
    is_nondecreasing INTEGER NOT NULL,
    is_nonincreasing INTEGER NOT NULL,
    sign_pattern TEXT NOT NULL,
    nonzero_count INTEGER NOT NULL,
    first_diff_sign TEXT,
    growth_rate REAL,
    variance REAL,
    diff_variance REAL
);
CREATE INDEX IF NOT EXISTS idx_prefix_hash ON sequences(prefix_hash);
CREATE INDEX IF NOT EXISTS idx_length ON sequences(length);
CREATE INDEX IF NOT EXISTS idx_gcd ON sequences(gcd_val);
CREATE INDEX IF NOT EXISTS idx_sign ON sequences(sign_pattern);
CREATE INDEX IF NOT EXISTS idx_first_diff ON sequences(first_diff_sign);
CREATE INDEX IF NOT EXISTS idx_nonzero ON sequences(nonzero_count);
CREATE INDEX IF NOT EXISTS idx_growth ON sequences(growth_rate);
";

const INSERT_SQL: &str = "
INSERT INTO sequences (id, length, terms, name, keywords, prefix_hash, min_val, max_val, gcd_val,
                       is_nondecreasing, is_nonincreasing, sign_pattern, nonzero_count,
                       first_diff_sign, growth_rate, variance, diff_variance)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
ON CONFLICT(id) DO UPDATE SET
    length = excluded.length,
    terms = excluded.terms,
    name = excluded.name,
    keywords = excluded.keywords,
    prefix_hash = excluded.prefix_hash,
    min_val = excluded.min_val,
    max_val = excluded.max_val,
    gcd_val = excluded.gcd_val,
    is_nondecreasing = excluded.is_nondecreasing,
    is_nonincreasing = excluded.is_nonincreasing,
    sign_pattern = excluded.sign_pattern,
    nonzero_count = excluded.nonzero_count,
    first_diff_sign = excluded.first_diff_sign,
    growth_rate = excluded.growth_rate,
    variance = excluded.variance,
    diff_variance = excluded.diff_variance
";

/// One-shot ingester: streams the raw OEIS exports into the SQLite index.
///
/// Records are truncated to `max_terms` before invariants are derived, so
/// stored invariants always describe the stored terms.
pub struct IndexBuilder {
    max_terms: usize,
    batch_size: usize,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(max_terms: usize) -> Self {
        Self {
            max_terms,
            batch_size: 5_000,
        }
    }

    /// Build (or rebuild) the index from a stripped file plus optional names
    /// and keywords companions. Returns the number of records written.
    pub fn build(
        &self,
        stripped: &Path,
        names: Option<&Path>,
        keywords: Option<&Path>,
        db_path: &Path,
    ) -> Result<usize, BuildError> {
        let titles: HashMap<SequenceId, String> = match names {
            Some(path) => load_names(path)?,
            None => HashMap::new(),
        };
        let tags: HashMap<SequenceId, Vec<String>> = match keywords {
            Some(path) => load_keywords(path)?,
            None => HashMap::new(),
        };
        debug!(titles = titles.len(), keywords = tags.len(), "loaded companions");

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = OFF;")?;
        conn.execute("DROP TABLE IF EXISTS sequences", [])?;
        conn.execute_batch(SCHEMA)?;

        let mut total = 0usize;
        let mut batch: Vec<SequenceRecord> = Vec::with_capacity(self.batch_size);
        let reader = StrippedReader::open(stripped, self.max_terms)?;
        for record in reader {
            let mut record = record?;
            if let Some(title) = titles.get(&record.id) {
                record.name = Some(title.clone());
            }
            if let Some(kws) = tags.get(&record.id) {
                record.keywords = kws.clone();
            }
            batch.push(record);
            if batch.len() >= self.batch_size {
                total += insert_batch(&mut conn, &batch)?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            total += insert_batch(&mut conn, &batch)?;
        }

        info!(records = total, db = %db_path.display(), "index built");
        Ok(total)
    }
}

/// Write pre-built records straight into a (new or existing) index file.
///
/// Used by the builder internals and by test fixtures.
pub fn write_records(db_path: &Path, records: &[SequenceRecord]) -> Result<usize, BuildError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut conn = Connection::open(db_path)?;
    conn.execute_batch(SCHEMA)?;
    insert_batch(&mut conn, records)
}

fn insert_batch(conn: &mut Connection, records: &[SequenceRecord]) -> Result<usize, BuildError> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(INSERT_SQL)?;
        for rec in records {
            let inv = &rec.invariants;
            let terms_text = rec
                .terms
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let keywords_text = if rec.keywords.is_empty() {
                None
            } else {
                Some(rec.keywords.join(","))
            };
            stmt.execute(params![
                rec.id.as_str(),
                rec.len() as i64,
                terms_text,
                rec.name,
                keywords_text,
                inv.prefix_hash,
                inv.min_val.to_string(),
                inv.max_val.to_string(),
                inv.gcd_val.to_i64(),
                inv.is_nondecreasing as i64,
                inv.is_nonincreasing as i64,
                inv.sign_pattern.as_str(),
                i64::from(inv.nonzero_count),
                inv.first_diff_sign.map(|s| s.as_str()),
                inv.growth_rate,
                inv.variance,
                inv.diff_variance,
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}
