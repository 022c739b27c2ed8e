//! HTTP providers against a local mock server.

use chrono::NaiveDate;
use fundflow_core::data::{
    CircuitBreaker, DataError, FundDataProvider, ISharesProvider, PriceProvider, SharesProvider,
    YahooEndpoints, YahooProvider,
};
use fundflow_core::TickerConfig;
use httpmock::{Method::GET, MockServer};
use std::sync::Arc;
use std::time::Duration;

const EXPORT_PATH: &str = "/us/products/239681/ishares-msci-south-korea-capped-etf/1467271812596.ajax";

const SNAPSHOT: &str = "\u{feff}iShares MSCI South Korea ETF\n\
Fund Holdings as of,\"Feb 25, 2026\"\n\
Inception Date,\"May 09, 2000\"\n\
Shares Outstanding,\"116,000,000.00\"\n\
\n\
Ticker,Name,Weight (%)\n";

fn ewy() -> TickerConfig {
    TickerConfig::new("EWY").with_ishares("239681", "ishares-msci-south-korea-capped-etf")
}

fn breaker() -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new(Duration::from_secs(60)))
}

fn yahoo(server: &MockServer, cb: Arc<CircuitBreaker>) -> YahooProvider {
    YahooProvider::with_endpoints(
        YahooEndpoints {
            chart: server.url("/v8/finance/chart"),
            summary: server.url("/v10/finance/quoteSummary"),
            cookie: server.url("/consent"),
            crumb: server.url("/v1/test/getcrumb"),
        },
        cb,
    )
    .unwrap()
    .with_retry(2, Duration::from_millis(1))
}

// ── iShares ──────────────────────────────────────────────────────────

#[test]
fn ishares_latest_snapshot() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path(EXPORT_PATH)
            .query_param("fileType", "csv")
            .query_param("fileName", "EWY_holdings")
            .query_param("dataType", "fund");
        then.status(200).body(SNAPSHOT);
    });

    let provider = ISharesProvider::with_base_url(server.base_url(), breaker()).unwrap();
    let snap = provider.fetch_snapshot(&ewy(), None).unwrap();

    mock.assert();
    assert_eq!(snap.as_of, NaiveDate::from_ymd_opt(2026, 2, 25).unwrap());
    assert_eq!(snap.shares_outstanding, 116_000_000);
}

#[test]
fn ishares_historical_request_sends_as_of_date() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path(EXPORT_PATH)
            .query_param("asOfDate", "20260225");
        then.status(200).body(SNAPSHOT);
    });

    let provider = ISharesProvider::with_base_url(server.base_url(), breaker()).unwrap();
    let requested = NaiveDate::from_ymd_opt(2026, 2, 25).unwrap();
    let snap = provider.fetch_snapshot(&ewy(), Some(requested)).unwrap();

    mock.assert();
    assert_eq!(snap.as_of, requested);
}

#[test]
fn ishares_unparseable_body_is_snapshot_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(EXPORT_PATH);
        then.status(200).body("<html>maintenance</html>");
    });

    let provider = ISharesProvider::with_base_url(server.base_url(), breaker()).unwrap();
    let err = provider.fetch_snapshot(&ewy(), None).unwrap_err();
    assert!(err.is_unparseable(), "got {err:?}");
}

#[test]
fn ishares_forbidden_trips_breaker() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(EXPORT_PATH);
        then.status(403);
    });

    let cb = breaker();
    let provider = ISharesProvider::with_base_url(server.base_url(), cb.clone()).unwrap();
    assert!(matches!(
        provider.fetch_snapshot(&ewy(), None),
        Err(DataError::CircuitBreakerTripped)
    ));
    assert!(!provider.is_available());

    // Subsequent calls are refused without touching the network.
    assert!(matches!(
        provider.fetch_snapshot(&ewy(), None),
        Err(DataError::CircuitBreakerTripped)
    ));
    mock.assert_hits(1);
}

#[test]
fn ishares_transient_errors_on_one_fund_leave_the_next_reachable() {
    let server = MockServer::start();
    let ewy_mock = server.mock(|when, then| {
        when.method(GET).path(EXPORT_PATH);
        then.status(503);
    });
    let ewj_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/us/products/239665/ishares-msci-japan-etf/1467271812596.ajax");
        then.status(200).body(SNAPSHOT);
    });

    let cb = Arc::new(CircuitBreaker::default_provider());
    let provider = ISharesProvider::with_base_url(server.base_url(), cb).unwrap();
    for _ in 0..5 {
        assert!(matches!(provider.fetch_snapshot(&ewy(), None), Err(DataError::Other(_))));
    }
    ewy_mock.assert_hits(5);

    assert!(provider.is_available());
    let ewj = TickerConfig::new("EWJ").with_ishares("239665", "ishares-msci-japan-etf");
    let snap = provider.fetch_snapshot(&ewj, None).unwrap();
    assert_eq!(snap.shares_outstanding, 116_000_000);
    ewj_mock.assert();
}

// ── Yahoo chart ──────────────────────────────────────────────────────

const CHART: &str = r#"{"chart":{"result":[{
    "meta":{"currency":"USD","symbol":"EWY","gmtoffset":-18000},
    "timestamp":[1704205800,1704292200,1704378600],
    "indicators":{"quote":[{
        "open":[60.1,60.5,null],"high":[61.0,61.2,null],"low":[59.8,60.0,null],
        "close":[60.7,61.1,null],"volume":[1000,1200,null]}]}}],"error":null}}"#;

#[test]
fn yahoo_chart_fetches_full_history() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v8/finance/chart/EWY")
            .query_param("range", "max")
            .query_param("interval", "1d");
        then.status(200)
            .header("content-type", "application/json")
            .body(CHART);
    });

    let result = yahoo(&server, breaker()).fetch_prices("EWY").unwrap();
    mock.assert();

    assert_eq!(result.bars.len(), 2);
    assert_eq!(result.bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    assert_eq!(result.bars[1].close, 61.1);
}

#[test]
fn yahoo_unknown_symbol() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/NOPE");
        then.status(404).body(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        );
    });

    let err = yahoo(&server, breaker()).fetch_prices("NOPE").unwrap_err();
    assert!(matches!(err, DataError::SymbolNotFound { symbol } if symbol == "NOPE"));
}

#[test]
fn yahoo_server_errors_are_retried_then_reported() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/EWY");
        then.status(502);
    });

    let cb = Arc::new(CircuitBreaker::with_threshold(Duration::from_secs(60), 10));
    let err = yahoo(&server, cb).fetch_prices("EWY").unwrap_err();

    assert!(matches!(err, DataError::Other(_)), "got {err:?}");
    mock.assert_hits(3);
}

// ── Yahoo quoteSummary ───────────────────────────────────────────────

fn mock_auth(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/consent");
        then.status(404).header("set-cookie", "A3=session; Path=/");
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1/test/getcrumb");
        then.status(200).body("abc123");
    });
}

#[test]
fn yahoo_profile_reads_summary_modules() {
    let server = MockServer::start();
    mock_auth(&server);
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v10/finance/quoteSummary/EWY")
            .query_param("crumb", "abc123");
        then.status(200).body(
            r#"{"quoteSummary":{"result":[{
                "price":{"longName":"iShares MSCI South Korea ETF","shortName":"EWY","currency":"USD"},
                "summaryDetail":{"totalAssets":{"raw":5123456789.0},"navPrice":{"raw":61.234},"previousClose":{"raw":60.0}},
                "defaultKeyStatistics":{"sharesOutstanding":{"raw":116000000}},
                "fundProfile":{"feesExpensesInvestment":{"annualReportExpenseRatio":{"raw":0.0059}}}
            }],"error":null}}"#,
        );
    });

    let profile = yahoo(&server, breaker()).fetch_profile("EWY").unwrap();
    mock.assert();

    assert_eq!(profile.name.as_deref(), Some("iShares MSCI South Korea ETF"));
    assert_eq!(profile.aum, Some(5_123_456_789.0));
    assert_eq!(profile.nav, Some(61.234));
    assert_eq!(profile.expense_ratio, Some(0.0059));
    assert_eq!(profile.shares_outstanding, Some(116_000_000));
    assert_eq!(profile.currency.as_deref(), Some("USD"));
}

#[test]
fn yahoo_holdings_and_sectors() {
    let server = MockServer::start();
    mock_auth(&server);
    server.mock(|when, then| {
        when.method(GET)
            .path("/v10/finance/quoteSummary/EWY")
            .query_param("modules", "topHoldings");
        then.status(200).body(
            r#"{"quoteSummary":{"result":[{"topHoldings":{
                "holdings":[
                    {"symbol":"005930.KS","holdingName":"Samsung Electronics Co Ltd","holdingPercent":{"raw":0.2212}},
                    {"symbol":"000660.KS","holdingName":"SK Hynix Inc","holdingPercent":{"raw":0.0934}}
                ],
                "sectorWeightings":[{"technology":{"raw":0.38}},{"financial_services":{"raw":0.12}}]
            }}],"error":null}}"#,
        );
    });

    let holdings = yahoo(&server, breaker()).fetch_holdings("EWY").unwrap();
    assert_eq!(holdings.holdings.len(), 2);
    assert_eq!(holdings.holdings[0].symbol, "005930.KS");
    assert_eq!(holdings.holdings[1].weight, 0.0934);
    assert_eq!(holdings.sectors.get("technology"), Some(0.38));
    assert_eq!(holdings.sectors.len(), 2);
    let order: Vec<_> = holdings.sectors.iter().map(|(name, _)| name).collect();
    assert_eq!(order, ["technology", "financial_services"]);
}
