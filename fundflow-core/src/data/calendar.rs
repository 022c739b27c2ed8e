//! Weekday calendar used to plan historical snapshot requests.

use chrono::{Datelike, NaiveDate, Weekday};

/// Monday through Friday dates in `[start, end]`. Holidays are not excluded;
/// a provider answering a holiday with the prior session's snapshot is caught
/// by the date-integrity guard.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[test]
    fn skips_weekends() {
        // 2026-02-20 is a Friday.
        let days = business_days(d(2, 20), d(2, 24));
        assert_eq!(days, vec![d(2, 20), d(2, 23), d(2, 24)]);
    }

    #[test]
    fn inclusive_single_day() {
        assert_eq!(business_days(d(2, 25), d(2, 25)), vec![d(2, 25)]);
        assert!(business_days(d(2, 21), d(2, 21)).is_empty());
    }

    #[test]
    fn reversed_range_is_empty() {
        assert!(business_days(d(3, 1), d(2, 1)).is_empty());
    }
}
