//! Indicator primitives over daily bars and close series.
//!
//! Every function returns a series the same length as its input, with `NaN`
//! during warmup and wherever an input window contains `NaN`. No value at
//! index t depends on data after t.
//!
//! `atr` is the single ATR implementation: the technicals builder, the ADX
//! computation, and the trailing-stop path all go through it.

pub mod adx;
pub mod atr;
pub mod channel;
pub mod efficiency;
pub mod moving_average;

pub use adx::{directional, Directional};
pub use atr::{atr, latest_atr, true_range, wilder_smooth};
pub use channel::{rolling_max, rolling_min};
pub use efficiency::efficiency_ratio;
pub use moving_average::{ema, sma};

/// Last finite value of a series.
pub fn last_finite(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}

/// Close prices of a bar slice.
pub fn closes(bars: &[crate::domain::Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "TEST".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
