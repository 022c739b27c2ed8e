//! Yahoo Finance provider: daily prices plus fund profile and holdings.
//!
//! Prices come from the v8 chart API over the full available range. Profile
//! and holdings come from the v10 quoteSummary API, which wants a cookie and
//! crumb pair; the crumb is fetched once and reused until Yahoo rejects it.
//!
//! Yahoo Finance has no official API and changes shape without notice, so
//! every wire field is optional and missing pieces degrade to `None`.

use super::circuit_breaker::CircuitBreaker;
use super::http::{build_client, send_guarded, RetryPolicy};
use super::provider::{
    DataError, DataSource, FetchResult, FundDataProvider, FundHoldings, FundProfile, Holding,
    PriceProvider, SectorWeights,
};
use crate::domain::PriceBar;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Base URLs for the Yahoo endpoints. Overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YahooEndpoints {
    /// Chart API base; the symbol is appended as a path segment.
    pub chart: String,
    /// quoteSummary API base; the symbol is appended as a path segment.
    pub summary: String,
    /// Any URL that answers with a Yahoo session cookie.
    pub cookie: String,
    pub crumb: String,
}

impl Default for YahooEndpoints {
    fn default() -> Self {
        Self {
            chart: "https://query2.finance.yahoo.com/v8/finance/chart".into(),
            summary: "https://query2.finance.yahoo.com/v10/finance/quoteSummary".into(),
            cookie: "https://fc.yahoo.com/consent".into(),
            crumb: "https://query2.finance.yahoo.com/v1/test/getcrumb".into(),
        }
    }
}

// ── Chart wire format ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

// ── quoteSummary wire format ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryNode,
}

#[derive(Debug, Deserialize)]
struct SummaryNode {
    result: Option<Vec<SummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    #[serde(default)]
    price: Option<PriceModule>,
    #[serde(default)]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(default)]
    default_key_statistics: Option<KeyStatisticsModule>,
    #[serde(default)]
    fund_profile: Option<FundProfileModule>,
    #[serde(default)]
    top_holdings: Option<TopHoldingsModule>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawNum {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(n: Option<RawNum>) -> Option<f64> {
    n.and_then(|n| n.raw).filter(|v| v.is_finite())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    total_assets: Option<RawNum>,
    nav_price: Option<RawNum>,
    previous_close: Option<RawNum>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatisticsModule {
    shares_outstanding: Option<RawNum>,
    annual_report_expense_ratio: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundProfileModule {
    fees_expenses_investment: Option<FeesModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeesModule {
    annual_report_expense_ratio: Option<RawNum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopHoldingsModule {
    #[serde(default)]
    holdings: Vec<HoldingNode>,
    #[serde(default)]
    sector_weightings: Vec<BTreeMap<String, RawNum>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoldingNode {
    symbol: Option<String>,
    holding_name: Option<String>,
    holding_percent: Option<RawNum>,
}

/// Yahoo Finance provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    endpoints: YahooEndpoints,
    circuit_breaker: Arc<CircuitBreaker>,
    crumb: Mutex<Option<String>>,
    retry: RetryPolicy,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        Self::with_endpoints(YahooEndpoints::default(), circuit_breaker)
    }

    pub fn with_endpoints(
        endpoints: YahooEndpoints,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        Ok(Self {
            client: build_client(true)?,
            endpoints,
            circuit_breaker,
            crumb: Mutex::new(None),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy (attempts after the first, and the first backoff delay).
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            base_delay,
        };
        self
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/{symbol}?range=max&interval=1d&includeAdjustedClose=true",
            self.endpoints.chart.trim_end_matches('/')
        )
    }

    fn summary_url(&self, symbol: &str) -> String {
        format!("{}/{symbol}", self.endpoints.summary.trim_end_matches('/'))
    }

    /// Parse the chart API response into bars keyed by exchange-local date.
    fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<PriceBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
        let timestamps = data.timestamp.unwrap_or_default();
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            // Rows without a close are non-trading placeholders.
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            let date = exchange_date(ts, offset).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;
            let pick = |col: &[Option<f64>]| col.get(i).copied().flatten().unwrap_or(close);

            bars.push(PriceBar {
                date,
                open: pick(&quote.open),
                high: pick(&quote.high),
                low: pick(&quote.low),
                close,
                volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        // A live row can land on the same exchange date as the daily bar; the later row wins.
        bars.sort_by_key(|b| b.date);
        let mut daily: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match daily.last_mut() {
                Some(prev) if prev.date == bar.date => *prev = bar,
                _ => daily.push(bar),
            }
        }
        Ok(daily)
    }

    fn request(
        &self,
        label: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::blocking::Response, DataError> {
        send_guarded(&self.circuit_breaker, self.retry, label, || {
            self.client.get(url).query(query)
        })
    }

    /// Cached crumb, or a fresh one from the cookie + crumb handshake.
    fn crumb(&self) -> Result<String, DataError> {
        let mut cached = self.crumb.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie endpoint often answers 404 but still sets the session cookie.
        self.client
            .get(&self.endpoints.cookie)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(format!("cookie request: {e}")))?;

        let crumb = self
            .request("crumb", &self.endpoints.crumb, &[])?
            .text()
            .map_err(|e| DataError::NetworkUnreachable(format!("crumb body: {e}")))?;
        let crumb = crumb.trim().to_string();
        if crumb.is_empty() || crumb.contains('{') || crumb.contains('<') {
            return Err(DataError::AuthenticationRequired(format!(
                "received invalid crumb: {crumb}"
            )));
        }

        tracing::debug!("acquired Yahoo crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    fn clear_crumb(&self) {
        *self.crumb.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    fn quote_summary(&self, symbol: &str, modules: &str) -> Result<SummaryResult, DataError> {
        let url = self.summary_url(symbol);
        let mut refreshed = false;

        let resp = loop {
            let crumb = self.crumb()?;
            match self.request(symbol, &url, &[("modules", modules), ("crumb", crumb.as_str())]) {
                Err(DataError::AuthenticationRequired(_)) if !refreshed => {
                    tracing::debug!(symbol, "crumb rejected, refreshing");
                    self.clear_crumb();
                    refreshed = true;
                }
                other => break other?,
            }
        };

        let envelope: SummaryEnvelope = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("quoteSummary for {symbol}: {e}"))
        })?;

        if let Some(err) = envelope.quote_summary.error {
            return Err(if err.code == "Not Found" {
                DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                }
            } else {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            });
        }

        envelope
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| DataError::ResponseFormatChanged("quoteSummary result is empty".into()))
    }
}

/// Trading date of a bar timestamp in the exchange's own timezone.
pub fn exchange_date(timestamp: i64, gmtoffset_secs: i64) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(timestamp.checked_add(gmtoffset_secs)?, 0)
        .map(|dt| dt.date_naive())
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_prices(&self, symbol: &str) -> Result<FetchResult, DataError> {
        let resp = self.request(symbol, &self.chart_url(symbol), &[])?;
        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;
        let bars = Self::parse_chart(symbol, chart)?;

        tracing::debug!(symbol, bars = bars.len(), "fetched price history");
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

impl FundDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_profile(&self, symbol: &str) -> Result<FundProfile, DataError> {
        let result = self.quote_summary(
            symbol,
            "price,summaryDetail,defaultKeyStatistics,fundProfile",
        )?;

        let price = result.price;
        let detail = result.summary_detail;
        let stats = result.default_key_statistics;

        let name = price
            .as_ref()
            .and_then(|p| p.long_name.clone().or_else(|| p.short_name.clone()))
            .filter(|n| !n.is_empty());
        let currency = price
            .as_ref()
            .and_then(|p| p.currency.clone())
            .or_else(|| detail.as_ref().and_then(|d| d.currency.clone()));
        let expense_ratio = result
            .fund_profile
            .and_then(|f| f.fees_expenses_investment)
            .and_then(|f| raw(f.annual_report_expense_ratio))
            .or_else(|| stats.as_ref().and_then(|s| raw(s.annual_report_expense_ratio)));

        Ok(FundProfile {
            name,
            aum: detail.as_ref().and_then(|d| raw(d.total_assets)),
            nav: detail
                .as_ref()
                .and_then(|d| raw(d.nav_price).or(raw(d.previous_close))),
            expense_ratio,
            shares_outstanding: stats
                .and_then(|s| raw(s.shares_outstanding))
                .filter(|v| *v >= 0.0)
                .map(|v| v as u64),
            currency,
        })
    }

    fn fetch_holdings(&self, symbol: &str) -> Result<FundHoldings, DataError> {
        let top = self
            .quote_summary(symbol, "topHoldings")?
            .top_holdings
            .ok_or_else(|| DataError::ResponseFormatChanged("topHoldings missing".into()))?;

        let holdings = top
            .holdings
            .into_iter()
            .filter_map(|h| {
                Some(Holding {
                    name: h.holding_name.unwrap_or_default(),
                    symbol: h.symbol.unwrap_or_default(),
                    weight: raw(h.holding_percent)?,
                })
            })
            .collect();

        let sectors = top
            .sector_weightings
            .into_iter()
            .flatten()
            .filter_map(|(sector, weight)| Some((sector, raw(Some(weight))?)))
            .collect::<SectorWeights>();

        Ok(FundHoldings { holdings, sectors })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
