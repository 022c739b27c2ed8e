//! iShares holdings-export provider for shares-outstanding snapshots.
//!
//! The fund page serves a CSV export whose metadata header carries the
//! holdings as-of date and the shares count. Passing `asOfDate=YYYYMMDD`
//! asks for a historical export; iShares answers with its closest
//! available document, which is why the returned date must be checked.

use super::circuit_breaker::CircuitBreaker;
use super::http::{build_client, send_guarded, RetryPolicy};
use super::provider::{DataError, SharesProvider};
use super::snapshot::parse_snapshot;
use crate::domain::SharesSnapshot;
use crate::tickers::{ISharesIds, TickerConfig};
use chrono::NaiveDate;
use std::sync::Arc;

pub const DEFAULT_ISHARES_BASE_URL: &str = "https://www.ishares.com";

/// Fixed page component of the export endpoint.
const EXPORT_COMPONENT: &str = "1467271812596.ajax";

pub struct ISharesProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl ISharesProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_ISHARES_BASE_URL, circuit_breaker)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        Ok(Self {
            client: build_client(false)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            circuit_breaker,
        })
    }

    /// Export URL for a fund, optionally pinned to a historical date.
    pub fn export_url(&self, symbol: &str, ids: ISharesIds<'_>, as_of: Option<NaiveDate>) -> String {
        let mut url = format!(
            "{}/us/products/{}/{}/{EXPORT_COMPONENT}?fileType=csv&fileName={symbol}_holdings&dataType=fund",
            self.base_url, ids.product_id, ids.name
        );
        if let Some(date) = as_of {
            url.push_str(&format!("&asOfDate={}", date.format("%Y%m%d")));
        }
        url
    }
}

impl SharesProvider for ISharesProvider {
    fn name(&self) -> &str {
        "ishares"
    }

    /// Single attempt per call; backfill paces its own requests and moves on.
    fn fetch_snapshot(
        &self,
        ticker: &TickerConfig,
        as_of: Option<NaiveDate>,
    ) -> Result<SharesSnapshot, DataError> {
        let symbol = ticker.symbol.as_str();
        let ids = ticker.ishares().ok_or_else(|| DataError::NotConfigured {
            symbol: symbol.to_string(),
        })?;

        let url = self.export_url(symbol, ids, as_of);
        let text = send_guarded(&self.circuit_breaker, RetryPolicy::SINGLE, symbol, || {
            self.client.get(&url)
        })?
        .text()
        .map_err(|e| DataError::NetworkUnreachable(format!("{symbol} body: {e}")))?;

        let snapshot = parse_snapshot(&text)?;
        tracing::debug!(
            symbol,
            requested = ?as_of,
            as_of = %snapshot.as_of,
            shares = snapshot.shares_outstanding,
            "fetched iShares snapshot"
        );
        Ok(snapshot)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ISharesProvider {
        ISharesProvider::with_base_url(
            "https://example.test/",
            Arc::new(CircuitBreaker::default_provider()),
        )
        .unwrap()
    }

    #[test]
    fn export_url_for_latest_snapshot() {
        let ticker = TickerConfig::new("EWY").with_ishares("239681", "ishares-msci-south-korea-capped-etf");
        let url = provider().export_url("EWY", ticker.ishares().unwrap(), None);
        assert_eq!(
            url,
            "https://example.test/us/products/239681/ishares-msci-south-korea-capped-etf/\
             1467271812596.ajax?fileType=csv&fileName=EWY_holdings&dataType=fund"
        );
    }

    #[test]
    fn export_url_pins_historical_date() {
        let ticker = TickerConfig::new("EWY").with_ishares("239681", "x");
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let url = provider().export_url("EWY", ticker.ishares().unwrap(), Some(date));
        assert!(url.ends_with("&asOfDate=20250307"));
    }

    #[test]
    fn unconfigured_ticker_is_rejected_without_a_request() {
        let err = provider()
            .fetch_snapshot(&TickerConfig::new("SPY"), None)
            .unwrap_err();
        assert!(matches!(err, DataError::NotConfigured { symbol } if symbol == "SPY"));
    }
}
