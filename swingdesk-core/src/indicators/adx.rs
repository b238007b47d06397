//! ADX and directional indicators (Wilder).
//!
//! 1. +DM / -DM from consecutive highs and lows
//! 2. Wilder-smooth +DM, -DM and TR (TR from the shared ATR primitive)
//! 3. +DI = 100·sm(+DM)/sm(TR), -DI = 100·sm(-DM)/sm(TR)
//! 4. DX = 100·|+DI − -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! Lookback: 2·period.

use crate::domain::Bar;
use crate::indicators::atr::{true_range, wilder_smooth};

/// +DI, -DI and ADX series, each the length of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Directional {
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
    pub adx: Vec<f64>,
}

impl Directional {
    /// (ADX, +DI, -DI) at the last bar, NaN where unavailable.
    pub fn latest(&self) -> (f64, f64, f64) {
        let last = |s: &[f64]| s.last().copied().unwrap_or(f64::NAN);
        (last(&self.adx), last(&self.plus_di), last(&self.minus_di))
    }
}

pub fn directional(bars: &[Bar], period: usize) -> Directional {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        let (cur, prev) = (&bars[i], &bars[i - 1]);
        if cur.high.is_nan() || cur.low.is_nan() || prev.high.is_nan() || prev.low.is_nan() {
            continue;
        }
        let up = cur.high - prev.high;
        let down = prev.low - cur.low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let mut tr = true_range(bars);
    if let Some(first) = tr.first_mut() {
        *first = f64::NAN;
    }
    let s_tr = wilder_smooth(&tr, period);
    let s_plus = wilder_smooth(&plus_dm, period);
    let s_minus = wilder_smooth(&minus_dm, period);

    let mut plus_di = vec![f64::NAN; n];
    let mut minus_di = vec![f64::NAN; n];
    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if !(s_tr[i].is_finite() && s_plus[i].is_finite() && s_minus[i].is_finite())
            || s_tr[i] == 0.0
        {
            continue;
        }
        let p = 100.0 * s_plus[i] / s_tr[i];
        let m = 100.0 * s_minus[i] / s_tr[i];
        plus_di[i] = p;
        minus_di[i] = m;
        dx[i] = if p + m == 0.0 {
            0.0
        } else {
            100.0 * (p - m).abs() / (p + m)
        };
    }

    Directional {
        plus_di,
        minus_di,
        adx: wilder_smooth(&dx, period),
    }
}
