//! Trailing rolling sums with a one-observation minimum.

/// Trailing sum over the last `window` positions, skipping absent values.
///
/// A position whose window holds no defined value is `None`; otherwise the
/// result is the sum of whatever defined values the window contains, so
/// partial windows at the start of the series still produce a value.
pub fn rolling_sum(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    assert!(window >= 1, "rolling window must be >= 1");

    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let mut sum = 0.0;
        let mut seen = false;
        for v in values[start..=i].iter().flatten() {
            sum += v;
            seen = true;
        }
        out.push(seen.then_some(sum));
    }
    out
}

/// Running total, absent values counted as zero.
pub fn cumulative_sum(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v.unwrap_or(0.0);
            Some(*acc)
        })
        .collect()
}
