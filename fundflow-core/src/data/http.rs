//! HTTP plumbing shared by the iShares and Yahoo providers.
//!
//! Both sources sit behind the same status rules: 403 is a block and opens
//! the breaker at once, 429 and 5xx count as failures and may be retried,
//! 401 and 404 are final answers.

use super::circuit_breaker::CircuitBreaker;
use super::provider::DataError;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::time::Duration;

pub const BROWSER_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) ",
    "Chrome/122.0.0.0 Safari/537.36"
);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Seconds assumed when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub(crate) fn build_client(cookie_store: bool) -> Result<Client, DataError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(BROWSER_USER_AGENT)
        .cookie_store(cookie_store)
        .build()
        .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))
}

/// Extra attempts after the first, with exponential backoff from `base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// One attempt, no backoff.
    pub const SINGLE: Self = Self {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

enum Verdict {
    Accept,
    Retry(DataError),
    Reject(DataError),
}

fn retry_after_secs(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn judge(status: StatusCode, headers: &HeaderMap, label: &str, breaker: &CircuitBreaker) -> Verdict {
    match status {
        StatusCode::FORBIDDEN => {
            breaker.trip();
            Verdict::Reject(DataError::CircuitBreakerTripped)
        }
        StatusCode::TOO_MANY_REQUESTS => {
            breaker.record_failure();
            Verdict::Retry(DataError::RateLimited {
                retry_after_secs: retry_after_secs(headers),
            })
        }
        StatusCode::UNAUTHORIZED => {
            Verdict::Reject(DataError::AuthenticationRequired(format!("{label}: HTTP 401")))
        }
        StatusCode::NOT_FOUND => Verdict::Reject(DataError::SymbolNotFound {
            symbol: label.to_string(),
        }),
        s if s.is_success() => {
            breaker.record_success();
            Verdict::Accept
        }
        s => {
            breaker.record_failure();
            Verdict::Retry(DataError::Other(format!("HTTP {s} for {label}")))
        }
    }
}

/// Send `request()` until it succeeds, fails for good, or the policy runs out.
///
/// The breaker is consulted before every attempt. `label` names the request
/// in errors and logs; a 404 reports it as the unknown symbol.
pub(crate) fn send_guarded(
    breaker: &CircuitBreaker,
    policy: RetryPolicy,
    label: &str,
    request: impl Fn() -> RequestBuilder,
) -> Result<Response, DataError> {
    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            tracing::debug!(label, attempt, delay_ms = delay.as_millis() as u64, "retrying");
            std::thread::sleep(delay);
        }
        if !breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let resp = match request().send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                breaker.record_failure();
                last_error = Some(DataError::NetworkUnreachable(format!("{label}: {e}")));
                continue;
            }
            Err(e) => return Err(DataError::NetworkUnreachable(format!("{label}: {e}"))),
        };

        match judge(resp.status(), resp.headers(), label, breaker) {
            Verdict::Accept => return Ok(resp),
            Verdict::Reject(e) => return Err(e),
            Verdict::Retry(e) => last_error = Some(e),
        }
    }

    Err(last_error.unwrap_or_else(|| DataError::Other(format!("{label}: no attempts made"))))
}
