//! Price resolution for the flow pipeline.
//!
//! Implements the fallback policy per symbol:
//! 1. Online: download the full daily history and refresh the cache
//! 2. If the download fails → use whatever the cache holds
//! 3. Offline: cache only, never touch the network
//! 4. Otherwise → fail with a clear error

use fundflow_core::data::{DataError, DataSource, PriceCache, PriceProvider};
use fundflow_core::{PriceBar, PriceObservation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached prices for '{symbol}' and no network access")]
    NoCachedDataOffline { symbol: String },

    #[error("no cached prices for '{symbol}' and download failed: {reason}")]
    DownloadFailed { symbol: String, reason: String },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Never make network requests.
    pub offline: bool,
}

/// Daily bars for one symbol plus where they came from.
#[derive(Debug, Clone)]
pub struct LoadedPrices {
    pub bars: Vec<PriceBar>,
    pub source: DataSource,
}

impl LoadedPrices {
    /// The (date, close) pairs the merge stage consumes.
    pub fn observations(&self) -> Vec<PriceObservation> {
        self.bars.iter().map(PriceBar::observation).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

pub fn load_prices(
    symbol: &str,
    cache: &PriceCache,
    provider: Option<&dyn PriceProvider>,
    opts: &LoadOptions,
) -> Result<LoadedPrices, LoadError> {
    let mut failure: Option<String> = None;

    if !opts.offline {
        match provider {
            Some(prov) if prov.is_available() => match prov.fetch_prices(symbol) {
                Ok(fetched) => {
                    if !fetched.bars.is_empty() {
                        if let Err(e) = cache.write(symbol, &fetched.bars, fetched.source) {
                            tracing::warn!(symbol, error = %e, "failed to cache prices");
                        }
                    }
                    return Ok(LoadedPrices {
                        bars: fetched.bars,
                        source: fetched.source,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        symbol,
                        provider = prov.name(),
                        error = %e,
                        "price download failed, trying cache"
                    );
                    failure = Some(e.to_string());
                }
            },
            Some(prov) => {
                tracing::warn!(symbol, provider = prov.name(), "price provider unavailable, trying cache");
                failure = Some(format!("{} unavailable", prov.name()));
            }
            None => {}
        }
    }

    match cache.load(symbol) {
        Ok(bars) => {
            tracing::debug!(symbol, bars = bars.len(), "prices from cache");
            Ok(LoadedPrices {
                bars,
                source: DataSource::Cache,
            })
        }
        Err(DataError::NoCachedData { .. }) if opts.offline => {
            Err(LoadError::NoCachedDataOffline {
                symbol: symbol.to_string(),
            })
        }
        Err(DataError::NoCachedData { .. }) => Err(LoadError::DownloadFailed {
            symbol: symbol.to_string(),
            reason: failure.unwrap_or_else(|| "no price provider configured".into()),
        }),
        Err(e) => Err(e.into()),
    }
}
