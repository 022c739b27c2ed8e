//! Shares-outstanding snapshot parsing.
//!
//! A holdings export opens with a short metadata header before the holdings
//! table itself:
//!
//! ```text
//! iShares MSCI South Korea ETF
//! Fund Holdings as of,"Feb 25, 2026"
//! Inception Date,"May 09, 2000"
//! Shares Outstanding,"116,000,000.00"
//! ```
//!
//! Only the as-of date and the shares count are extracted.

use crate::domain::SharesSnapshot;
use chrono::NaiveDate;
use thiserror::Error;

/// Number of leading lines searched for metadata.
const HEADER_LINES: usize = 10;

const AS_OF_LABEL: &str = "fund holdings as of";
const SHARES_LABEL: &str = "shares outstanding";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("no 'Fund Holdings as of' line in snapshot header")]
    MissingAsOfDate,

    #[error("no 'Shares Outstanding' line in snapshot header")]
    MissingSharesOutstanding,

    #[error("invalid as-of date '{0}'")]
    InvalidDate(String),

    #[error("invalid shares outstanding '{0}'")]
    InvalidShares(String),
}

pub fn parse_snapshot(text: &str) -> Result<SharesSnapshot, SnapshotError> {
    let mut as_of = None;
    let mut shares = None;

    for line in text.lines().take(HEADER_LINES) {
        let line = line.trim().trim_start_matches('\u{feff}');
        let Some((label, value)) = line.split_once(',') else {
            continue;
        };
        let label = label.trim().trim_matches('"').to_ascii_lowercase();

        if as_of.is_none() && label.starts_with(AS_OF_LABEL) {
            as_of = Some(parse_as_of(value)?);
        } else if shares.is_none() && label.starts_with(SHARES_LABEL) {
            shares = Some(parse_shares(value)?);
        }
    }

    Ok(SharesSnapshot {
        as_of: as_of.ok_or(SnapshotError::MissingAsOfDate)?,
        shares_outstanding: shares.ok_or(SnapshotError::MissingSharesOutstanding)?,
    })
}

fn parse_as_of(raw: &str) -> Result<NaiveDate, SnapshotError> {
    let value = raw.replace('"', "");
    let value = value.trim().trim_end_matches(',').trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%b %d, %Y") {
        return Ok(date);
    }

    // Split across columns: `"Feb 25"," 2026"` leaves irregular spacing.
    let joined = value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    NaiveDate::parse_from_str(&joined, "%b %d, %Y")
        .map_err(|_| SnapshotError::InvalidDate(value.to_string()))
}

fn parse_shares(raw: &str) -> Result<u64, SnapshotError> {
    let value: String = raw.chars().filter(|c| *c != '"' && *c != ',').collect();
    let value = value.trim();
    let invalid = || SnapshotError::InvalidShares(value.to_string());

    let parsed: f64 = value.parse().map_err(|_| invalid())?;
    if !parsed.is_finite() || parsed < 0.0 || parsed >= u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(parsed.trunc() as u64)
}
