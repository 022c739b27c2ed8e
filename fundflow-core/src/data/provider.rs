//! Provider traits and structured error types.
//!
//! Three seams abstract over the outside world so the pipeline can run
//! against fakes in tests:
//! - [`PriceProvider`]: daily price history
//! - [`SharesProvider`]: shares-outstanding snapshots
//! - [`FundDataProvider`]: descriptive metadata and holdings for the report

use super::snapshot::SnapshotError;
use crate::domain::{PriceBar, SharesSnapshot};
use crate::tickers::TickerConfig;
use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Structured error types for provider and cache operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{symbol} has no provider identifiers configured")]
    NotConfigured { symbol: String },

    #[error("snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for symbol '{symbol}'")]
    NoCachedData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether the snapshot was fetched but could not be read. Backfill counts
    /// these as "no data" rather than request failures.
    pub fn is_unparseable(&self) -> bool {
        matches!(self, DataError::Snapshot(_))
    }
}

/// Result of a successful price fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
    pub source: DataSource,
}

/// Where price data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Cache,
}

/// Descriptive metadata shown alongside a fund's flows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundProfile {
    pub name: Option<String>,
    pub aum: Option<f64>,
    pub nav: Option<f64>,
    pub expense_ratio: Option<f64>,
    pub shares_outstanding: Option<u64>,
    pub currency: Option<String>,
}

/// One position in a fund's top holdings. `weight` is a fraction (0.05 = 5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub name: String,
    pub symbol: String,
    pub weight: f64,
}

/// Top holdings and sector weights (fractions), as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundHoldings {
    pub holdings: Vec<Holding>,
    pub sectors: SectorWeights,
}

/// Sector name to weight, kept in the order the provider lists them.
///
/// Serializes as a JSON object whose keys follow that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorWeights(Vec<(String, f64)>);

impl SectorWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `sector`, or overwrite its weight in place if already present.
    pub fn insert(&mut self, sector: impl Into<String>, weight: f64) {
        let sector = sector.into();
        match self.0.iter_mut().find(|(name, _)| *name == sector) {
            Some((_, w)) => *w = weight,
            None => self.0.push((sector, weight)),
        }
    }

    pub fn get(&self, sector: &str) -> Option<f64> {
        self.0.iter().find(|(name, _)| name == sector).map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, w)| (name.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for SectorWeights {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut weights = Self::new();
        for (sector, weight) in iter {
            weights.insert(sector, weight);
        }
        weights
    }
}

impl Serialize for SectorWeights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (sector, weight) in &self.0 {
            map.serialize_entry(sector, weight)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SectorWeights {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WeightsVisitor;

        impl<'de> Visitor<'de> for WeightsVisitor {
            type Value = SectorWeights;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of sector name to weight")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut weights = SectorWeights::new();
                while let Some((sector, weight)) = access.next_entry::<String, f64>()? {
                    weights.insert(sector, weight);
                }
                Ok(weights)
            }
        }

        deserializer.deserialize_map(WeightsVisitor)
    }
}

/// Daily price history for a symbol.
///
/// Implementations handle the specifics of a particular source. The cache
/// layer sits above this trait; providers don't know about the cache.
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Full available daily history, ascending by date.
    fn fetch_prices(&self, symbol: &str) -> Result<FetchResult, DataError>;

    /// Whether the provider currently accepts requests.
    fn is_available(&self) -> bool;
}

/// Shares-outstanding snapshots for a fund.
pub trait SharesProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Latest snapshot when `as_of` is `None`, otherwise the snapshot the
    /// provider serves for that date. The returned `as_of` is whatever the
    /// document states and may differ from the requested date.
    fn fetch_snapshot(
        &self,
        ticker: &TickerConfig,
        as_of: Option<NaiveDate>,
    ) -> Result<SharesSnapshot, DataError>;

    fn is_available(&self) -> bool;
}

/// Report enrichment: profile and holdings. Failures here never block flows.
pub trait FundDataProvider: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_profile(&self, symbol: &str) -> Result<FundProfile, DataError>;

    fn fetch_holdings(&self, symbol: &str) -> Result<FundHoldings, DataError>;

    fn is_available(&self) -> bool;
}
