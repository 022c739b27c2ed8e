//! On-disk price cache: one Parquet file per symbol plus a JSON sidecar.
//!
//! Layout:
//! - `{cache_dir}/{SYMBOL}.parquet`: full daily history (date, OHLC, volume)
//! - `{cache_dir}/{SYMBOL}.meta.json`: range, bar count, BLAKE3 of the file
//!
//! The price provider always returns the full available history, so each
//! write replaces the whole file through the same `.tmp` + rename path the
//! shares history uses. A file that fails validation on load is renamed to
//! `{SYMBOL}.parquet.quarantined` and treated as absent.

use super::provider::{DataError, DataSource};
use crate::domain::PriceBar;
use crate::store::write_atomic;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar describing a cached price file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub symbol: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub bars: usize,
    /// BLAKE3 of the Parquet bytes.
    pub file_hash: String,
    pub source: DataSource,
    pub fetched_at: NaiveDateTime,
}

pub struct PriceCache {
    cache_dir: PathBuf,
}

impl PriceCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn data_path(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("{symbol}.parquet"))
    }

    fn entry_path(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("{symbol}.meta.json"))
    }

    /// Replace the cached history for `symbol`. `bars` must be date-ascending.
    pub fn write(&self, symbol: &str, bars: &[PriceBar], source: DataSource) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::CacheError(format!("{symbol}: refusing to cache an empty history")));
        };

        if let Some(pair) = bars.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(DataError::CacheError(format!(
                "{symbol}: dates not strictly ascending at {}",
                pair[1].date
            )));
        }

        let bytes = encode(bars)?;
        let entry = CacheEntry {
            symbol: symbol.to_string(),
            first_date: first.date,
            last_date: last.date,
            bars: bars.len(),
            file_hash: blake3::hash(&bytes).to_hex().to_string(),
            source,
            fetched_at: chrono::Local::now().naive_local(),
        };
        let entry_json = serde_json::to_vec_pretty(&entry)
            .map_err(|e| DataError::CacheError(format!("{symbol} sidecar: {e}")))?;

        write_atomic(&self.data_path(symbol), &bytes)
            .map_err(|e| DataError::CacheError(e.to_string()))?;
        write_atomic(&self.entry_path(symbol), &entry_json)
            .map_err(|e| DataError::CacheError(e.to_string()))?;

        tracing::debug!(symbol, bars = bars.len(), first = %first.date, last = %last.date, "cached prices");
        Ok(())
    }

    /// Cached bars for `symbol`, ascending by date.
    pub fn load(&self, symbol: &str) -> Result<Vec<PriceBar>, DataError> {
        let path = self.data_path(symbol);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        match read_validated(&path) {
            Ok(bars) => Ok(bars),
            Err(e) => {
                tracing::warn!(symbol, path = %path.display(), error = %e, "quarantining corrupt price cache");
                if let Err(rename_err) = self.quarantine(symbol) {
                    tracing::error!(
                        symbol,
                        path = %path.display(),
                        error = %rename_err,
                        "could not quarantine price cache, it will be read again next run"
                    );
                }
                Err(DataError::NoCachedData {
                    symbol: symbol.to_string(),
                })
            }
        }
    }

    /// Move the data file aside and drop its sidecar.
    fn quarantine(&self, symbol: &str) -> std::io::Result<PathBuf> {
        let path = self.data_path(symbol);
        let target = path.with_extension("parquet.quarantined");
        fs::rename(&path, &target)?;
        match fs::remove_file(self.entry_path(symbol)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        Ok(target)
    }

    /// Sidecar for `symbol`, if one is present and readable.
    pub fn entry(&self, symbol: &str) -> Option<CacheEntry> {
        let content = fs::read(self.entry_path(symbol)).ok()?;
        serde_json::from_slice(&content).ok()
    }
}

fn encode(bars: &[PriceBar]) -> Result<Vec<u8>, DataError> {
    let days: Vec<i32> = bars.iter().map(|b| days_since_epoch(b.date)).collect();
    let mut df = DataFrame::new(vec![
        Column::new("date".into(), days)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date column: {e}")))?,
        Column::new("open".into(), bars.iter().map(|b| b.open).collect::<Vec<_>>()),
        Column::new("high".into(), bars.iter().map(|b| b.high).collect::<Vec<_>>()),
        Column::new("low".into(), bars.iter().map(|b| b.low).collect::<Vec<_>>()),
        Column::new("close".into(), bars.iter().map(|b| b.close).collect::<Vec<_>>()),
        Column::new("volume".into(), bars.iter().map(|b| b.volume).collect::<Vec<_>>()),
    ])
    .map_err(|e| DataError::ParquetError(format!("frame: {e}")))?;

    let mut buf = Vec::new();
    ParquetWriter::new(&mut buf)
        .finish(&mut df)
        .map_err(|e| DataError::ParquetError(format!("encode: {e}")))?;
    Ok(buf)
}

/// Decode and check a cached file: non-empty, strictly ascending dates,
/// finite positive closes.
fn read_validated(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("decode: {e}")))?;

    let col = |name: &str| {
        df.column(name)
            .map_err(|_| DataError::CacheError(format!("missing column '{name}'")))
    };
    let bad_type = |name: &str, e: PolarsError| DataError::CacheError(format!("column '{name}': {e}"));

    let dates = col("date")?.date().map_err(|e| bad_type("date", e))?;
    let opens = col("open")?.f64().map_err(|e| bad_type("open", e))?;
    let highs = col("high")?.f64().map_err(|e| bad_type("high", e))?;
    let lows = col("low")?.f64().map_err(|e| bad_type("low", e))?;
    let closes = col("close")?.f64().map_err(|e| bad_type("close", e))?;
    let volumes = col("volume")?.u64().map_err(|e| bad_type("volume", e))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("no rows".into()));
    }

    let mut bars: Vec<PriceBar> = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let (Some(days), Some(close)) = (dates.get(row), closes.get(row)) else {
            return Err(DataError::CacheError(format!("row {row}: null date or close")));
        };
        if !close.is_finite() || close <= 0.0 {
            return Err(DataError::CacheError(format!("row {row}: bad close {close}")));
        }
        let date = date_from_epoch_days(days);
        if bars.last().is_some_and(|prev| prev.date >= date) {
            return Err(DataError::CacheError(format!("row {row}: dates out of order at {date}")));
        }
        bars.push(PriceBar {
            date,
            open: opens.get(row).unwrap_or(close),
            high: highs.get(row).unwrap_or(close),
            low: lows.get(row).unwrap_or(close),
            close,
            volume: volumes.get(row).unwrap_or(0),
        });
    }
    Ok(bars)
}

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn date_from_epoch_days(days: i32) -> NaiveDate {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE).unwrap_or_default()
}
