//! Date-integrity guard for historical snapshots.
//!
//! When a snapshot is requested for a specific date, providers may answer
//! with the closest date they have instead. Storing that answer under either
//! date would put a mislabeled value into the forward-fill series, so only an
//! exact match is accepted.

use crate::domain::{SharesObservation, SharesSnapshot};
use chrono::NaiveDate;

/// Outcome of checking a snapshot against the date it was requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Accept(SharesObservation),
    DateMismatch {
        requested: NaiveDate,
        returned: NaiveDate,
    },
}

pub fn reconcile(symbol: &str, requested: NaiveDate, snapshot: SharesSnapshot) -> Reconciled {
    if snapshot.as_of == requested {
        Reconciled::Accept(snapshot.into_observation(symbol))
    } else {
        Reconciled::DateMismatch {
            requested,
            returned: snapshot.as_of,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    #[test]
    fn exact_date_is_accepted() {
        let snap = SharesSnapshot {
            as_of: d(25),
            shares_outstanding: 42,
        };
        match reconcile("EWY", d(25), snap) {
            Reconciled::Accept(obs) => {
                assert_eq!(obs.date, d(25));
                assert_eq!(obs.symbol, "EWY");
                assert_eq!(obs.shares_outstanding, 42);
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn stale_snapshot_is_rejected() {
        let snap = SharesSnapshot {
            as_of: d(24),
            shares_outstanding: 42,
        };
        assert_eq!(
            reconcile("EWY", d(25), snap),
            Reconciled::DateMismatch {
                requested: d(25),
                returned: d(24),
            }
        );
    }
}
