//! Integration tests for the batch runs against in-memory providers.
//!
//! Each test gets its own directory for the history table, price cache and
//! report output, so runs never see each other's files.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use fundflow_core::data::{
    CircuitBreaker, DataError, DataSource, FetchResult, FundDataProvider, FundHoldings,
    FundProfile, ISharesProvider, PriceCache, PriceProvider, SharesProvider,
};
use fundflow_core::{PriceBar, SharesHistory, SharesSnapshot, TickerConfig, TickerList};
use fundflow_runner::{
    read_report, run_backfill, run_flows, run_scrape, BackfillOptions, FlowOptions,
    PipelineConfig, Providers, SymbolOutcome,
};
use httpmock::{Method::GET, MockServer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        history_csv: root.join("data/shares_history.csv"),
        price_cache_dir: root.join("data/prices"),
        output_dir: root.join("public/data"),
        request_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

fn tickers() -> TickerList {
    TickerList::new(vec![
        TickerConfig::new("EWY").with_ishares("239681", "ishares-msci-south-korea-capped-etf"),
        TickerConfig::new("EWJ").with_ishares("239665", "ishares-msci-japan-etf"),
    ])
    .unwrap()
}

fn options(as_of: NaiveDate) -> FlowOptions {
    FlowOptions {
        offline: false,
        skip_scrape: false,
        as_of,
        generated_at: as_of.and_hms_opt(6, 0, 0).unwrap(),
    }
}

// ── Fakes ────────────────────────────────────────────────────────────

/// Latest snapshot per symbol; historical requests echo the requested date.
struct FakeShares {
    latest: HashMap<&'static str, SharesSnapshot>,
    requests: Mutex<usize>,
}

impl FakeShares {
    fn new(latest: impl IntoIterator<Item = (&'static str, SharesSnapshot)>) -> Self {
        Self {
            latest: latest.into_iter().collect(),
            requests: Mutex::new(0),
        }
    }
}

impl SharesProvider for FakeShares {
    fn name(&self) -> &str {
        "fake-shares"
    }

    fn fetch_snapshot(
        &self,
        ticker: &TickerConfig,
        as_of: Option<NaiveDate>,
    ) -> Result<SharesSnapshot, DataError> {
        *self.requests.lock().unwrap() += 1;
        match as_of {
            Some(date) => Ok(SharesSnapshot {
                as_of: date,
                shares_outstanding: 1_000_000 + u64::from(date.day()),
            }),
            None => self
                .latest
                .get(ticker.symbol.as_str())
                .copied()
                .ok_or_else(|| DataError::NetworkUnreachable("no route".into())),
        }
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Weekday closes for the symbols it knows; everything else is not found.
struct FakePrices {
    bars: HashMap<&'static str, Vec<PriceBar>>,
}

impl PriceProvider for FakePrices {
    fn name(&self) -> &str {
        "fake-prices"
    }

    fn fetch_prices(&self, symbol: &str) -> Result<FetchResult, DataError> {
        let bars = self.bars.get(symbol).cloned().ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

struct FakeFundData;

impl FundDataProvider for FakeFundData {
    fn name(&self) -> &str {
        "fake-fund-data"
    }

    fn fetch_profile(&self, symbol: &str) -> Result<FundProfile, DataError> {
        Ok(FundProfile {
            name: Some(format!("{symbol} Index Fund")),
            aum: Some(1.0e9),
            nav: Some(20.004),
            expense_ratio: Some(0.005),
            shares_outstanding: Some(1),
            currency: None,
        })
    }

    fn fetch_holdings(&self, _symbol: &str) -> Result<FundHoldings, DataError> {
        Err(DataError::ResponseFormatChanged("topHoldings missing".into()))
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn weekday_bars(start: NaiveDate, days: i64, close: f64) -> Vec<PriceBar> {
    (0..days)
        .map(|i| start + Duration::days(i))
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .map(|date| PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        })
        .collect()
}

// ── Flows ────────────────────────────────────────────────────────────

#[test]
fn flows_run_writes_one_report_per_fund() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let mut history = SharesHistory::new();
    history.upsert(d(2026, 2, 2), "EWY", 1_000);
    history.upsert(d(2026, 2, 5), "EWY", 1_100);
    history.save(&config.history_csv).unwrap();

    let shares = FakeShares::new([(
        "EWY",
        SharesSnapshot {
            as_of: d(2026, 2, 9),
            shares_outstanding: 1_050,
        },
    )]);
    let prices = FakePrices {
        bars: HashMap::from([
            ("EWY", weekday_bars(d(2026, 2, 2), 8, 20.0)),
            ("EWJ", weekday_bars(d(2026, 2, 2), 8, 70.0)),
        ]),
    };
    let providers = Providers {
        shares: Some(&shares),
        prices: Some(&prices),
        fund_data: Some(&FakeFundData),
    };

    let summary = run_flows(&config, &tickers(), providers, &options(d(2026, 2, 9))).unwrap();

    // EWJ has prices but no shares history and its scrape failed.
    assert_eq!(summary.written(), 1);
    assert!(summary.history_saved);
    assert!(matches!(summary.symbols[1].1, SymbolOutcome::Skipped { .. }));

    let report = read_report(&config.output_dir.join("EWY.json")).unwrap();
    assert_eq!(report.name, "EWY Index Fund");
    assert_eq!(report.metadata.currency, "USD");
    assert_eq!(report.metadata.nav, 20.0);
    assert_eq!(report.metadata.shares_outstanding, Some(1_050));
    assert!(report.holdings.is_empty());
    assert_eq!(report.last_updated, "2026-02-09 06:00:00");

    // Feb 2..=6 and Feb 9: five derived days.
    let daily: Vec<f64> = report.flows.iter().map(|f| f.daily_flow).collect();
    assert_eq!(daily, vec![0.0, 0.0, 2_000.0, 0.0, -1_000.0]);
    assert_eq!(report.flows.last().unwrap().cumulative_flow, 1_000.0);
    assert_eq!(report.summary.daily, -1_000.0);
    assert_eq!(report.summary.weekly, 1_000.0);

    // The scraped snapshot was persisted before the reports were built.
    let reloaded = SharesHistory::load(&config.history_csv).unwrap();
    assert_eq!(reloaded.get(d(2026, 2, 9), "EWY"), Some(1_050));
}

#[test]
fn offline_run_uses_cache_and_skips_network() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let mut history = SharesHistory::new();
    history.upsert(d(2026, 1, 5), "EWJ", 500);
    history.upsert(d(2026, 1, 7), "EWJ", 450);
    history.save(&config.history_csv).unwrap();

    PriceCache::new(&config.price_cache_dir)
        .write("EWJ", &weekday_bars(d(2026, 1, 5), 5, 70.0), DataSource::YahooFinance)
        .unwrap();

    let shares = FakeShares::new([]);
    let providers = Providers {
        shares: Some(&shares),
        prices: None,
        fund_data: Some(&FakeFundData),
    };
    let opts = FlowOptions {
        offline: true,
        ..options(d(2026, 1, 9))
    };

    let summary = run_flows(&config, &tickers(), providers, &opts).unwrap();

    assert_eq!(*shares.requests.lock().unwrap(), 0);
    assert!(summary.scrape.is_none());
    match &summary.symbols[1].1 {
        SymbolOutcome::Written { source, flows, .. } => {
            assert_eq!(*source, DataSource::Cache);
            assert_eq!(*flows, 4);
        }
        other => panic!("EWJ should be written from cache: {other:?}"),
    }

    let report = read_report(&config.output_dir.join("EWJ.json")).unwrap();
    assert_eq!(report.name, "EWJ");
    assert_eq!(report.flows[1].daily_flow, -3_500.0);
}

#[test]
fn reporting_window_trims_old_records_but_not_summary() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        window_days: 7,
        ..config(dir.path())
    };

    let mut history = SharesHistory::new();
    history.upsert(d(2026, 1, 5), "EWY", 100);
    history.upsert(d(2026, 1, 12), "EWY", 110);
    history.save(&config.history_csv).unwrap();

    let prices = FakePrices {
        bars: HashMap::from([("EWY", weekday_bars(d(2026, 1, 5), 28, 1.0))]),
    };
    let providers = Providers {
        prices: Some(&prices),
        ..Providers::default()
    };
    let opts = FlowOptions {
        skip_scrape: true,
        ..options(d(2026, 2, 1))
    };

    run_flows(&config, &tickers(), providers, &opts).unwrap();
    let report = read_report(&config.output_dir.join("EWY.json")).unwrap();

    // Only Jan 26..=30 fall after Feb 1 minus seven days.
    assert_eq!(report.flows.len(), 5);
    assert_eq!(report.flows[0].date, d(2026, 1, 26));
    assert_eq!(report.flows[0].cumulative_flow, 10.0);
    assert_eq!(report.summary.monthly, 10.0);
}

// ── Scrape and backfill ──────────────────────────────────────────────

#[test]
fn scrape_rewrites_history_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let shares = FakeShares::new([
        ("EWY", SharesSnapshot { as_of: d(2026, 2, 25), shares_outstanding: 116_000_000 }),
        ("EWJ", SharesSnapshot { as_of: d(2026, 2, 25), shares_outstanding: 250_000_000 }),
    ]);

    let (summary, history) = run_scrape(&config, &tickers(), &shares).unwrap();
    assert_eq!(summary.stored_count(), 2);
    assert_eq!(history.len(), 2);

    let csv = std::fs::read_to_string(&config.history_csv).unwrap();
    assert_eq!(
        csv,
        "date,ticker,shares_outstanding\n\
         2026-02-25,EWJ,250000000\n\
         2026-02-25,EWY,116000000\n"
    );

    // Same answer again: nothing changes on disk.
    let (again, _) = run_scrape(&config, &tickers(), &shares).unwrap();
    assert_eq!(again.changed_count(), 0);
    assert_eq!(std::fs::read_to_string(&config.history_csv).unwrap(), csv);
}

#[test]
fn backfill_saves_only_when_something_was_added() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let shares = FakeShares::new([]);
    let opts = BackfillOptions {
        start: d(2026, 2, 9),
        end: d(2026, 2, 15),
        delay: config.request_delay(),
    };

    let (report, history) = run_backfill(&config, &tickers(), &shares, &opts).unwrap();
    assert_eq!(report.total_added(), 10);
    assert_eq!(history.get(d(2026, 2, 13), "EWJ"), Some(1_000_013));
    assert!(config.history_csv.exists());

    std::fs::remove_file(&config.history_csv).unwrap();
    let empty_range = BackfillOptions {
        start: d(2026, 2, 14),
        end: d(2026, 2, 15),
        ..opts
    };
    let (report, _) = run_backfill(&config, &tickers(), &shares, &empty_range).unwrap();
    assert_eq!(report.total_added(), 0);
    assert!(!config.history_csv.exists());
}

#[test]
fn failing_fund_does_not_cut_short_the_next_backfill() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let server = MockServer::start();

    let ewy_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/us/products/239681/ishares-msci-south-korea-capped-etf/1467271812596.ajax");
        then.status(503);
    });
    let days = [d(2026, 2, 9), d(2026, 2, 10), d(2026, 2, 11), d(2026, 2, 12), d(2026, 2, 13)];
    for day in days {
        let body = format!(
            "iShares MSCI Japan ETF\nFund Holdings as of,\"{}\"\nShares Outstanding,\"250,000,000.00\"\n",
            day.format("%b %d, %Y")
        );
        server.mock(move |when, then| {
            when.method(GET)
                .path("/us/products/239665/ishares-msci-japan-etf/1467271812596.ajax")
                .query_param("asOfDate", day.format("%Y%m%d").to_string());
            then.status(200).body(body);
        });
    }

    let shares =
        ISharesProvider::with_base_url(server.base_url(), Arc::new(CircuitBreaker::default_provider()))
            .unwrap();
    let opts = BackfillOptions {
        start: d(2026, 2, 9),
        end: d(2026, 2, 13),
        delay: config.request_delay(),
    };

    let (report, history) = run_backfill(&config, &tickers(), &shares, &opts).unwrap();

    ewy_mock.assert_hits(5);
    let ewy = &report.tickers[0];
    assert_eq!((ewy.added, ewy.request_failures, ewy.abandoned), (0, 5, 0));
    let ewj = &report.tickers[1];
    assert_eq!((ewj.added, ewj.request_failures, ewj.abandoned), (5, 0, 0));
    for day in days {
        assert_eq!(history.get(day, "EWJ"), Some(250_000_000));
    }
}
