//! Series merge: put the sparse shares series onto the trading-day price index.
//!
//! Each price date takes the most recent shares value observed on or before it
//! (last observation carried forward). Price dates before the first shares
//! observation have no value and are dropped, never zero-filled.

use crate::domain::{MergedRow, MergedSeries, PriceObservation, SharesPoint};

/// Merge a price series with a shares series.
///
/// Inputs need not be sorted. Duplicate dates keep the last entry given.
/// An empty `shares` slice yields an empty series.
pub fn merge(prices: &[PriceObservation], shares: &[SharesPoint]) -> MergedSeries {
    if shares.is_empty() || prices.is_empty() {
        return MergedSeries::default();
    }

    let prices = canonical_prices(prices);
    let shares = canonical_shares(shares);

    let mut rows = Vec::with_capacity(prices.len());
    let mut cursor = 0;
    let mut current: Option<u64> = None;

    for price in &prices {
        while cursor < shares.len() && shares[cursor].date <= price.date {
            current = Some(shares[cursor].shares);
            cursor += 1;
        }

        if let Some(shares) = current {
            rows.push(MergedRow {
                date: price.date,
                close: price.close,
                shares,
            });
        }
    }

    MergedSeries::from_sorted(rows)
}

/// Sort ascending by date; a repeated date keeps its last observation.
fn canonical_prices(prices: &[PriceObservation]) -> Vec<PriceObservation> {
    let mut sorted = prices.to_vec();
    sorted.sort_by_key(|p| p.date);
    dedup_keep_last(sorted, |p| p.date)
}

fn canonical_shares(shares: &[SharesPoint]) -> Vec<SharesPoint> {
    let mut sorted = shares.to_vec();
    sorted.sort_by_key(|s| s.date);
    dedup_keep_last(sorted, |s| s.date)
}

fn dedup_keep_last<T, K: PartialEq>(sorted: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(sorted.len());
    for item in sorted {
        match out.last_mut() {
            Some(last) if key(last) == key(&item) => *last = item,
            _ => out.push(item),
        }
    }
    out
}
