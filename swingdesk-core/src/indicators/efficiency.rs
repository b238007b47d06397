//! Trend efficiency: |net move| / path length over a lookback, scaled 0–100.
//!
//! A straight line scores 100; a series that ends where it started scores 0.

/// Efficiency at the last index, using the final `lookback + 1` values.
/// `None` when history is short, a value is non-finite, or the path is flat.
pub fn efficiency_ratio(values: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || values.len() < lookback + 1 {
        return None;
    }
    let window = &values[values.len() - lookback - 1..];
    if window.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let net = (window[lookback] - window[0]).abs();
    let path: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    if path > 0.0 {
        Some(100.0 * net / path)
    } else {
        None
    }
}
