//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR uses Wilder smoothing (alpha = 1/period), seeded with the mean of the
//! first `period` proper true ranges. TR[0] has no previous close and is
//! excluded, so the first ATR value lands at index `period`.

use crate::domain::Bar;

/// True Range series. TR[0] = high[0] - low[0].
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let value = if i == 0 {
            bar.high - bar.low
        } else {
            let pc = bars[i - 1].close;
            (bar.high - bar.low)
                .max((bar.high - pc).abs())
                .max((bar.low - pc).abs())
        };
        // NaN inputs poison max(); make it explicit.
        if bar.high.is_nan() || bar.low.is_nan() || (i > 0 && bars[i - 1].close.is_nan()) {
            tr.push(f64::NAN);
        } else {
            tr.push(value);
        }
    }
    tr
}

/// Wilder smoothing. Seed is the mean of the first run of `period`
/// consecutive finite values; a `NaN` after the seed invalidates the rest.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut run = 0;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        if v.is_finite() {
            run += 1;
            if run == period {
                seed_end = Some(i + 1);
                break;
            }
        } else {
            run = 0;
        }
    }
    let Some(seed_end) = seed_end else {
        return result;
    };

    let seed = values[seed_end - period..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        if !values[i].is_finite() {
            return result;
        }
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

/// ATR series over `bars`.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let mut tr = true_range(bars);
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }
    wilder_smooth(&tr, period)
}

/// ATR at the last bar, if it can be computed.
pub fn latest_atr(bars: &[Bar], period: usize) -> Option<f64> {
    super::last_finite(&atr(bars, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    fn ohlc(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                symbol: "TEST".to_string(),
                date: base + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn sample() -> Vec<Bar> {
        ohlc(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = 6
            (101.0, 106.0, 100.0, 105.0), // TR = 6
        ])
    }

    #[test]
    fn true_range_uses_previous_close() {
        let tr = true_range(&sample());
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = ohlc(&[(98.0, 102.0, 97.0, 100.0), (110.0, 115.0, 108.0, 112.0)]);
        assert_approx(true_range(&bars)[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3_known_values() {
        let result = atr(&sample(), 3);
        assert!(result[..3].iter().all(|v| v.is_nan()));
        // Seed from TR[1..=3] = [8, 9, 6]
        assert_approx(result[3], 23.0 / 3.0, DEFAULT_EPSILON);
        // (1/3)*6 + (2/3)*(23/3) = 64/9
        assert_approx(result[4], 64.0 / 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn latest_atr_returns_last_value() {
        let value = latest_atr(&sample(), 3).unwrap();
        assert_approx(value, 64.0 / 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn latest_atr_none_with_short_history() {
        assert!(latest_atr(&sample()[..2], 3).is_none());
        assert!(latest_atr(&[], 14).is_none());
    }

    #[test]
    fn wilder_seed_skips_leading_nan() {
        let values = [f64::NAN, 2.0, 4.0, 6.0];
        let result = wilder_smooth(&values, 2);
        assert!(result[1].is_nan());
        assert_approx(result[2], 3.0, DEFAULT_EPSILON);
        // 0.5*6 + 0.5*3
        assert_approx(result[3], 4.5, DEFAULT_EPSILON);
    }

    #[test]
    fn wilder_nan_after_seed_stops_series() {
        let values = [2.0, 4.0, f64::NAN, 6.0];
        let result = wilder_smooth(&values, 2);
        assert_approx(result[1], 3.0, DEFAULT_EPSILON);
        assert!(result[2].is_nan());
        assert!(result[3].is_nan());
    }

    #[test]
    fn atr_nan_high_breaks_seed() {
        let mut bars = sample();
        bars[1].high = f64::NAN;
        let result = atr(&bars, 2);
        assert!(result[1].is_nan());
        // Seed re-forms from TR[2..=3]
        assert_approx(result[3], 7.5, DEFAULT_EPSILON);
    }
}
