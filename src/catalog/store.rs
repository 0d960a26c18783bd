use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use rusqlite::{Connection, OpenFlags, Row};

use crate::core::record::{Invariants, SequenceRecord};
use crate::core::types::{SequenceId, SignPattern};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backing index missing or unreadable; fatal to the current query
    #[error("sequence index unavailable at {0}: run `oeis-solver build-index` first")]
    Unavailable(PathBuf),

    #[error("index I/O error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt index row for {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Conjunction of invariant-band predicates pushed down to the backing index.
///
/// An empty predicate set enumerates the whole corpus. Iteration order is
/// stable per predicate set (ascending id).
#[derive(Debug, Clone, Default)]
pub struct ScanPredicates {
    pub sign_patterns: Option<Vec<SignPattern>>,
    pub first_diff_signs: Option<Vec<SignPattern>>,
    pub min_nonzero: Option<u32>,
    pub max_nonzero: Option<u32>,
    pub min_length: Option<usize>,
    /// Stored gcd must divide this value (both nonzero)
    pub gcd_divides: Option<BigInt>,
    pub growth_band: Option<(f64, f64)>,
    pub variance_band: Option<(f64, f64)>,
    pub prefix_hash: Option<i64>,
}

impl ScanPredicates {
    /// Predicate set matching every record.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    fn to_sql(&self) -> (String, Vec<rusqlite::types::Value>) {
        use rusqlite::types::Value;

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(patterns) = &self.sign_patterns {
            let marks = vec!["?"; patterns.len()].join(",");
            clauses.push(format!("sign_pattern IN ({marks})"));
            params.extend(patterns.iter().map(|p| Value::from(p.as_str().to_string())));
        }
        if let Some(patterns) = &self.first_diff_signs {
            let marks = vec!["?"; patterns.len()].join(",");
            clauses.push(format!("first_diff_sign IN ({marks})"));
            params.extend(patterns.iter().map(|p| Value::from(p.as_str().to_string())));
        }
        if let Some(lo) = self.min_nonzero {
            clauses.push("nonzero_count >= ?".to_string());
            params.push(Value::from(i64::from(lo)));
        }
        if let Some(hi) = self.max_nonzero {
            clauses.push("nonzero_count <= ?".to_string());
            params.push(Value::from(i64::from(hi)));
        }
        if let Some(len) = self.min_length {
            clauses.push("length >= ?".to_string());
            params.push(Value::from(len as i64));
        }
        if let Some(hash) = self.prefix_hash {
            clauses.push("prefix_hash = ?".to_string());
            params.push(Value::from(hash));
        }
        if let Some((lo, hi)) = self.growth_band {
            clauses.push("growth_rate BETWEEN ? AND ?".to_string());
            params.push(Value::from(lo));
            params.push(Value::from(hi));
        }
        if let Some((lo, hi)) = self.variance_band {
            clauses.push("variance BETWEEN ? AND ?".to_string());
            params.push(Value::from(lo));
            params.push(Value::from(hi));
        }
        if let Some(g) = &self.gcd_divides {
            // Push down when the query gcd fits 64 bits; rows whose stored
            // gcd overflowed (NULL column) pass here and are re-checked in
            // memory against the re-derived gcd.
            if let Some(v) = g.to_i64() {
                clauses.push("(gcd_val IS NULL OR gcd_val = 0 OR (? % gcd_val) = 0)".to_string());
                params.push(Value::from(v));
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (where_sql, params)
    }

    /// In-memory recheck for the part of the gcd rule SQL cannot express.
    fn gcd_accepts(&self, record: &SequenceRecord) -> bool {
        match &self.gcd_divides {
            Some(g) => {
                let stored = &record.invariants.gcd_val;
                stored.is_zero() || g.is_zero() || (g % stored).is_zero()
            }
            None => true,
        }
    }
}

const SELECT_COLUMNS: &str = "id, length, terms, name, keywords, prefix_hash, min_val, max_val, \
     gcd_val, is_nondecreasing, is_nonincreasing, sign_pattern, nonzero_count, first_diff_sign, \
     growth_rate, variance, diff_variance";

/// Read-only access to the indexed corpus.
///
/// Backed by a single-file SQLite database built by
/// [`IndexBuilder`](crate::catalog::builder::IndexBuilder). Concurrent
/// readers each open their own handle; the store is never mutated at query
/// time.
#[derive(Debug)]
pub struct SequenceStore {
    conn: Connection,
    path: PathBuf,
}

impl SequenceStore {
    /// Open an existing index read-only.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Unavailable(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|_| StoreError::Unavailable(path.to_path_buf()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch a single record by id.
    pub fn get(&self, id: &SequenceId) -> Result<Option<SequenceRecord>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sequences WHERE id = ?");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query([id.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_record(row)?)),
            None => Ok(None),
        }
    }

    /// All records sharing a prefix hash, ascending by id.
    pub fn lookup_by_prefix_hash(&self, hash: i64) -> Result<Vec<SequenceRecord>, StoreError> {
        let sql =
            format!("SELECT {SELECT_COLUMNS} FROM sequences WHERE prefix_hash = ? ORDER BY id");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map([hash], |row| Ok(row_to_record(row)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }

    /// Materialise a filtered scan, ascending by id.
    pub fn scan(&self, predicates: &ScanPredicates) -> Result<Vec<SequenceRecord>, StoreError> {
        let mut out = Vec::new();
        self.for_each(predicates, |rec| {
            out.push(rec);
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// Stream a filtered scan one record at a time, ascending by id.
    ///
    /// The callback may break to cancel between records. Returns `true` when
    /// the scan ran to completion, `false` when the consumer broke early.
    pub fn for_each<F>(&self, predicates: &ScanPredicates, mut f: F) -> Result<bool, StoreError>
    where
        F: FnMut(SequenceRecord) -> ControlFlow<()>,
    {
        let (where_sql, params) = predicates.to_sql();
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sequences {where_sql} ORDER BY id");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        while let Some(row) = rows.next()? {
            let record = row_to_record(row)?;
            if !predicates.gcd_accepts(&record) {
                continue;
            }
            if let ControlFlow::Break(()) = f(record) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Total number of records in the index.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sequences", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Row count and length range, for the `stats` subcommand.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let (count, min_length, max_length) = self.conn.query_row(
            "SELECT COUNT(*), MIN(length), MAX(length) FROM sequences",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )?;
        Ok(StoreStats {
            count: count as usize,
            min_length: min_length.map(|v| v as usize),
            max_length: max_length.map(|v| v as usize),
        })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

fn parse_terms(id: &str, text: &str) -> Result<Vec<BigInt>, StoreError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|tok| {
            BigInt::from_str(tok).map_err(|_| StoreError::Corrupt {
                id: id.to_string(),
                reason: format!("bad term {tok:?}"),
            })
        })
        .collect()
}

fn row_to_record(row: &Row<'_>) -> Result<SequenceRecord, StoreError> {
    let id_text: String = row.get("id")?;
    let terms_text: String = row.get("terms")?;
    let terms = parse_terms(&id_text, &terms_text)?;

    let corrupt = |reason: &str| StoreError::Corrupt {
        id: id_text.clone(),
        reason: reason.to_string(),
    };

    let min_val: String = row.get("min_val")?;
    let max_val: String = row.get("max_val")?;
    let sign_text: String = row.get("sign_pattern")?;
    let first_diff_text: Option<String> = row.get("first_diff_sign")?;
    let gcd_col: Option<i64> = row.get("gcd_val")?;

    let invariants = Invariants {
        prefix_hash: row.get("prefix_hash")?,
        min_val: BigInt::from_str(&min_val).map_err(|_| corrupt("bad min_val"))?,
        max_val: BigInt::from_str(&max_val).map_err(|_| corrupt("bad max_val"))?,
        // A NULL gcd column means the value overflowed 64 bits at build
        // time; re-derive it from the terms.
        gcd_val: match gcd_col {
            Some(v) => BigInt::from(v),
            None => crate::core::record::gcd_of_abs(&terms),
        },
        is_nondecreasing: row.get::<_, i64>("is_nondecreasing")? != 0,
        is_nonincreasing: row.get::<_, i64>("is_nonincreasing")? != 0,
        sign_pattern: SignPattern::parse(&sign_text).ok_or_else(|| corrupt("bad sign_pattern"))?,
        nonzero_count: row.get::<_, i64>("nonzero_count")? as u32,
        first_diff_sign: match first_diff_text {
            Some(text) => {
                Some(SignPattern::parse(&text).ok_or_else(|| corrupt("bad first_diff_sign"))?)
            }
            None => None,
        },
        growth_rate: row.get("growth_rate")?,
        variance: row.get("variance")?,
        diff_variance: row.get("diff_variance")?,
    };

    let name: Option<String> = row.get("name")?;
    let keywords: Option<String> = row.get("keywords")?;

    Ok(SequenceRecord {
        id: SequenceId::new(id_text),
        terms,
        name,
        keywords: keywords
            .map(|text| text.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        invariants,
    })
}
