//! Shares history store: the accumulated (date, symbol) → shares table.
//!
//! The table is read fully into memory, mutated by upserts, and written back
//! as a whole. Saves are atomic: the sorted table goes to `{path}.tmp` in the
//! same directory and is then renamed over the target, so an interrupted run
//! never leaves a half-written file behind.
//!
//! On-disk format (CSV, sorted by date then symbol):
//!
//! ```text
//! date,ticker,shares_outstanding
//! 2026-02-25,EWY,116000000
//! ```

use crate::domain::{ShareKey, SharesObservation, SharesPoint};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed history row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },
}

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New (date, symbol) key.
    Inserted,
    /// Existing key whose value differed and was overwritten.
    Updated { previous: u64 },
    /// Existing key already holding the same value.
    Unchanged,
}

impl UpsertOutcome {
    /// Whether the table content changed.
    pub fn is_changed(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

/// Per-symbol coverage of the history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolStats {
    pub symbol: String,
    pub observations: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub latest_shares: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryRow {
    date: NaiveDate,
    ticker: String,
    shares_outstanding: u64,
}

/// In-memory shares history, deduplicated by (date, symbol).
#[derive(Debug, Clone, Default)]
pub struct SharesHistory {
    entries: HashMap<ShareKey, u64>,
    dirty: bool,
}

impl SharesHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from a CSV file. A missing file is an empty history.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let file = fs::File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Parse a CSV table with a `date,ticker,shares_outstanding` header.
    ///
    /// Repeated keys follow last-write-wins, matching [`SharesHistory::upsert`].
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = HashMap::new();
        for row in rdr.deserialize::<HistoryRow>() {
            let row = row.map_err(|e| StoreError::MalformedRow {
                line: e.position().map(|p| p.line()).unwrap_or(0),
                reason: e.to_string(),
            })?;
            entries.insert(ShareKey::new(row.date, row.ticker), row.shares_outstanding);
        }

        Ok(Self {
            entries,
            dirty: false,
        })
    }

    /// Insert or overwrite the value for (date, symbol).
    pub fn upsert(&mut self, date: NaiveDate, symbol: &str, shares: u64) -> UpsertOutcome {
        let outcome = match self.entries.insert(ShareKey::new(date, symbol), shares) {
            None => UpsertOutcome::Inserted,
            Some(previous) if previous == shares => UpsertOutcome::Unchanged,
            Some(previous) => UpsertOutcome::Updated { previous },
        };
        if outcome.is_changed() {
            self.dirty = true;
        }
        outcome
    }

    pub fn insert_observation(&mut self, obs: &SharesObservation) -> UpsertOutcome {
        self.upsert(obs.date, &obs.symbol, obs.shares_outstanding)
    }

    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<u64> {
        self.entries.get(&ShareKey::new(date, symbol)).copied()
    }

    pub fn contains(&self, date: NaiveDate, symbol: &str) -> bool {
        self.entries.contains_key(&ShareKey::new(date, symbol))
    }

    /// One symbol's series, ascending by date.
    pub fn get_series(&self, symbol: &str) -> Vec<SharesPoint> {
        let mut series: Vec<SharesPoint> = self
            .entries
            .iter()
            .filter(|(key, _)| key.symbol == symbol)
            .map(|(key, &shares)| SharesPoint::new(key.date, shares))
            .collect();
        series.sort_by_key(|p| p.date);
        series
    }

    /// Most recent observation for a symbol.
    pub fn latest(&self, symbol: &str) -> Option<SharesPoint> {
        self.entries
            .iter()
            .filter(|(key, _)| key.symbol == symbol)
            .max_by_key(|(key, _)| key.date)
            .map(|(key, &shares)| SharesPoint::new(key.date, shares))
    }

    /// Distinct symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.entries.keys().map(|k| k.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Coverage per symbol, sorted by symbol.
    pub fn symbol_stats(&self) -> Vec<SymbolStats> {
        let mut by_symbol: BTreeMap<&str, Vec<SharesPoint>> = BTreeMap::new();
        for (key, &shares) in &self.entries {
            by_symbol
                .entry(key.symbol.as_str())
                .or_default()
                .push(SharesPoint::new(key.date, shares));
        }

        by_symbol
            .into_iter()
            .filter_map(|(symbol, mut points)| {
                points.sort_by_key(|p| p.date);
                let first = points.first()?;
                let last = points.last()?;
                Some(SymbolStats {
                    symbol: symbol.to_string(),
                    observations: points.len(),
                    first_date: first.date,
                    last_date: last.date,
                    latest_shares: last.shares,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when an upsert changed the table since it was loaded or last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Every observation, sorted by (date, symbol).
    pub fn sorted_observations(&self) -> Vec<SharesObservation> {
        let mut keys: Vec<&ShareKey> = self.entries.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| SharesObservation {
                date: key.date,
                symbol: key.symbol.clone(),
                shares_outstanding: self.entries[key],
            })
            .collect()
    }

    /// Canonical CSV serialization of the table.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        // Header is written explicitly so an empty table still has one.
        wtr.write_record(["date", "ticker", "shares_outstanding"])?;
        for obs in self.sorted_observations() {
            wtr.write_record([
                obs.date.format("%Y-%m-%d").to_string(),
                obs.symbol,
                obs.shares_outstanding.to_string(),
            ])?;
        }
        wtr.into_inner().map_err(|e| StoreError::Io {
            path: PathBuf::new(),
            source: e.into_error(),
        })
    }

    /// BLAKE3 digest of the canonical serialization.
    pub fn fingerprint(&self) -> Result<String, StoreError> {
        Ok(blake3::hash(&self.to_csv_bytes()?).to_hex().to_string())
    }

    /// Write the whole table to `path` atomically.
    pub fn save(&mut self, path: &Path) -> Result<(), StoreError> {
        let bytes = self.to_csv_bytes()?;
        write_atomic(path, &bytes)?;
        self.dirty = false;
        tracing::debug!(path = %path.display(), entries = self.len(), "saved shares history");
        Ok(())
    }

    /// Save only when the table changed. Returns whether a write happened.
    pub fn save_if_dirty(&mut self, path: &Path) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }
        self.save(path)?;
        Ok(true)
    }
}

/// Write `{path}.tmp` then rename it into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, bytes).map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(e)
    })
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
