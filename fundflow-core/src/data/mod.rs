//! External data: provider traits, HTTP providers, snapshot parsing and the price cache

pub mod cache;
pub mod calendar;
pub mod circuit_breaker;
pub mod http;
pub mod ishares;
pub mod provider;
pub mod snapshot;
pub mod yahoo;

pub use cache::{CacheEntry, PriceCache};
pub use calendar::business_days;
pub use circuit_breaker::CircuitBreaker;
pub use http::{RetryPolicy, BROWSER_USER_AGENT};
pub use ishares::{ISharesProvider, DEFAULT_ISHARES_BASE_URL};
pub use provider::{
    DataError, DataSource, FetchResult, FundDataProvider, FundHoldings, FundProfile, Holding,
    PriceProvider, SectorWeights, SharesProvider,
};
pub use snapshot::{parse_snapshot, SnapshotError};
pub use yahoo::{exchange_date, YahooEndpoints, YahooProvider};
