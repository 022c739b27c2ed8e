//! Per-symbol flow report: the JSON document the dashboard reads.
//!
//! Values are rounded half-to-even on the way out: closes and weights to two
//! decimals, flows to whole currency units.

use chrono::{NaiveDate, NaiveDateTime};
use fundflow_core::data::{FundDataProvider, FundHoldings, FundProfile, SectorWeights};
use fundflow_core::{FlowRecord, FlowSummary};
use serde::{Deserialize, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub ticker: String,
    pub name: String,
    pub last_updated: String,
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub holdings: Vec<ReportHolding>,
    /// Percent weights in the provider's order.
    pub sectors: SectorWeights,
    pub flows: Vec<ReportFlow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub aum: Option<f64>,
    pub nav: f64,
    pub expense_ratio: Option<f64>,
    /// Latest merged shares value, not the provider's profile figure.
    pub shares_outstanding: Option<u64>,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub three_month: f64,
    pub six_month: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHolding {
    pub name: String,
    pub symbol: String,
    /// Percent of fund assets.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFlow {
    pub date: NaiveDate,
    pub close: f64,
    pub shares: u64,
    pub daily_flow: f64,
    pub weekly_flow: f64,
    pub monthly_flow: f64,
    pub three_month_flow: f64,
    pub six_month_flow: f64,
    pub cumulative_flow: f64,
}

/// Secondary report data. Either half may be missing without failing the report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub profile: FundProfile,
    pub holdings: FundHoldings,
}

impl Enrichment {
    /// Fetch profile and holdings, degrading each to empty on failure.
    pub fn fetch(provider: &dyn FundDataProvider, symbol: &str) -> Self {
        if !provider.is_available() {
            tracing::warn!(symbol, provider = provider.name(), "fund data provider unavailable");
            return Self::default();
        }

        let profile = provider.fetch_profile(symbol).unwrap_or_else(|e| {
            tracing::warn!(symbol, error = %e, "could not fetch fund profile");
            FundProfile::default()
        });
        let holdings = provider.fetch_holdings(symbol).unwrap_or_else(|e| {
            tracing::warn!(symbol, error = %e, "could not fetch fund holdings");
            FundHoldings::default()
        });

        Self { profile, holdings }
    }
}

/// Everything [`FlowReport::build`] needs besides enrichment.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub symbol: &'a str,
    /// Records inside the reporting window.
    pub records: &'a [FlowRecord],
    /// Latest values over the full derived series.
    pub summary: FlowSummary,
    pub latest_shares: Option<u64>,
    pub generated_at: NaiveDateTime,
    pub top_holdings: usize,
}

impl FlowReport {
    pub fn build(input: ReportInput<'_>, enrichment: &Enrichment) -> Self {
        let profile = &enrichment.profile;

        let holdings = enrichment
            .holdings
            .holdings
            .iter()
            .take(input.top_holdings)
            .map(|h| ReportHolding {
                name: h.name.clone(),
                symbol: h.symbol.clone(),
                weight: percent(h.weight),
            })
            .collect();

        let sectors = enrichment
            .holdings
            .sectors
            .iter()
            .map(|(sector, w)| (sector, percent(w)))
            .collect();

        Self {
            ticker: input.symbol.to_string(),
            name: profile
                .name
                .clone()
                .unwrap_or_else(|| input.symbol.to_string()),
            last_updated: input.generated_at.format(TIMESTAMP_FORMAT).to_string(),
            metadata: ReportMetadata {
                aum: profile.aum,
                nav: round_to(profile.nav.unwrap_or(0.0), 2),
                expense_ratio: profile.expense_ratio,
                shares_outstanding: input.latest_shares,
                currency: profile.currency.clone().unwrap_or_else(|| "USD".to_string()),
            },
            summary: ReportSummary::from(input.summary),
            holdings,
            sectors,
            flows: input.records.iter().map(ReportFlow::from).collect(),
        }
    }
}

impl From<FlowSummary> for ReportSummary {
    fn from(s: FlowSummary) -> Self {
        Self {
            daily: whole(s.daily),
            weekly: whole(s.weekly),
            monthly: whole(s.monthly),
            three_month: whole(s.three_month),
            six_month: whole(s.six_month),
        }
    }
}

impl From<&FlowRecord> for ReportFlow {
    fn from(r: &FlowRecord) -> Self {
        Self {
            date: r.date,
            close: round_to(r.close, 2),
            shares: r.shares,
            daily_flow: whole(r.daily_flow),
            weekly_flow: whole(r.weekly_flow),
            monthly_flow: whole(r.monthly_flow),
            three_month_flow: whole(r.three_month_flow),
            six_month_flow: whole(r.six_month_flow),
            cumulative_flow: whole(r.cumulative_flow),
        }
    }
}

/// Round half-to-even at `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

fn whole(value: f64) -> f64 {
    round_to(value, 0)
}

/// Fraction to percent, two decimals.
fn percent(fraction: f64) -> f64 {
    round_to(fraction * 100.0, 2)
}
