//! Builds an `InstrumentSnapshot` from daily bar history.
//!
//! This is the caller-side helper for sources that hold raw bars rather than
//! pre-computed technicals. Regime fields are left unset; the collector
//! stamps them from the benchmark reading.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, DataIssue, InstrumentSnapshot, UniverseMember, VolRegime};
use crate::indicators::{self, directional, efficiency_ratio, rolling_max, rolling_min};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalsConfig {
    pub atr_period: usize,
    pub adx_period: usize,
    pub ma_long: usize,
    pub ma_mid: usize,
    pub ma_short: usize,
    pub ema_period: usize,
    pub breakout_lookback: usize,
    /// Range window for the early-bird range position.
    pub range_lookback: usize,
    pub volume_lookback: usize,
    pub efficiency_lookback: usize,
    pub rs_lookback: usize,
    /// Open above previous close by more than this many ATRs sets `chase_gap`.
    pub chase_gap_atr: f64,
    /// Close above MA20 by more than this fraction sets `chase_extended`.
    pub chase_extension_frac: f64,
    /// ATR relative to its own average above this is a HIGH vol regime.
    pub vol_high_ratio: f64,
    /// ... and below this is LOW.
    pub vol_low_ratio: f64,
}

impl Default for TechnicalsConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            adx_period: 14,
            ma_long: 200,
            ma_mid: 50,
            ma_short: 20,
            ema_period: 20,
            breakout_lookback: 20,
            range_lookback: 55,
            volume_lookback: 20,
            efficiency_lookback: 20,
            rs_lookback: 63,
            chase_gap_atr: 1.0,
            chase_extension_frac: 0.10,
            vol_high_ratio: 1.5,
            vol_low_ratio: 0.75,
        }
    }
}

/// Compute a snapshot for `member` from its bars (oldest first). The
/// benchmark series, when given, feeds relative strength.
pub fn build_snapshot(
    member: &UniverseMember,
    bars: &[Bar],
    benchmark: Option<&[Bar]>,
    config: &TechnicalsConfig,
) -> InstrumentSnapshot {
    let mut snap = InstrumentSnapshot::for_member(member);
    let n = bars.len();
    if n < 2 {
        snap.data_issues.push(DataIssue::ShortHistory {
            needed: config.ma_long,
            available: n,
        });
        return snap;
    }
    if n < config.ma_long {
        snap.data_issues.push(DataIssue::ShortHistory {
            needed: config.ma_long,
            available: n,
        });
    }

    let closes = indicators::closes(bars);
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let last = &bars[n - 1];

    snap.close = last.close;
    snap.low = last.low;
    snap.high = last.high;
    snap.prev_close = bars[n - 2].close;

    let at_last = |series: Vec<f64>| series.last().copied().unwrap_or(f64::NAN);
    snap.ma200 = at_last(indicators::sma(&closes, config.ma_long));
    snap.ma50 = at_last(indicators::sma(&closes, config.ma_mid));
    snap.ma20 = at_last(indicators::sma(&closes, config.ma_short));
    snap.ema20 = at_last(indicators::ema(&closes, config.ema_period));

    let (adx, plus_di, minus_di) = directional(bars, config.adx_period).latest();
    snap.adx = adx;
    snap.plus_di = plus_di;
    snap.minus_di = minus_di;

    let atr_series = indicators::atr(bars, config.atr_period);
    snap.atr = atr_series[n - 1];
    if snap.atr.is_finite() && snap.close > 0.0 {
        snap.atr_pct = 100.0 * snap.atr / snap.close;
    }
    snap.vol_regime = vol_regime(&atr_series, config);

    // Channel over the sessions before today, so today's bar can break out of it.
    snap.high_20 = rolling_max(&highs[..n - 1], config.breakout_lookback)
        .last()
        .copied()
        .unwrap_or(f64::NAN);
    snap.low_20 = rolling_min(&lows[..n - 1], config.breakout_lookback)
        .last()
        .copied()
        .unwrap_or(f64::NAN);
    snap.high_55 = rolling_max(&highs, config.range_lookback)
        .last()
        .copied()
        .filter(|v| v.is_finite());
    snap.low_55 = rolling_min(&lows, config.range_lookback)
        .last()
        .copied()
        .filter(|v| v.is_finite());

    snap.vol_ratio = volume_ratio(bars, config.volume_lookback);
    snap.efficiency = efficiency_ratio(&closes, config.efficiency_lookback).unwrap_or(f64::NAN);
    snap.relative_strength = benchmark.and_then(|b| relative_strength(bars, b, config.rs_lookback));

    if snap.atr.is_finite() && snap.atr > 0.0 {
        snap.chase_gap = last.open - snap.prev_close > config.chase_gap_atr * snap.atr;
    }
    if snap.ma20.is_finite() && snap.ma20 > 0.0 {
        snap.chase_extended = snap.close / snap.ma20 - 1.0 > config.chase_extension_frac;
    }

    snap
}

/// Today's volume over the average of the preceding `lookback` sessions.
fn volume_ratio(bars: &[Bar], lookback: usize) -> f64 {
    let n = bars.len();
    if lookback == 0 || n < lookback + 1 {
        return f64::NAN;
    }
    let avg = bars[n - 1 - lookback..n - 1]
        .iter()
        .map(|b| b.volume as f64)
        .sum::<f64>()
        / lookback as f64;
    if avg > 0.0 {
        bars[n - 1].volume as f64 / avg
    } else {
        f64::NAN
    }
}

/// Instrument return minus benchmark return over `lookback` sessions.
fn relative_strength(bars: &[Bar], benchmark: &[Bar], lookback: usize) -> Option<f64> {
    let ret = |series: &[Bar]| -> Option<f64> {
        let n = series.len();
        if n < lookback + 1 {
            return None;
        }
        let start = series[n - 1 - lookback].close;
        let end = series[n - 1].close;
        (start > 0.0 && end.is_finite()).then(|| end / start - 1.0)
    };
    Some(ret(bars)? - ret(benchmark)?)
}

fn vol_regime(atr_series: &[f64], config: &TechnicalsConfig) -> VolRegime {
    let finite: Vec<f64> = atr_series.iter().copied().filter(|v| v.is_finite()).collect();
    let Some(&current) = finite.last() else {
        return VolRegime::Normal;
    };
    let window = &finite[finite.len().saturating_sub(50)..];
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    if mean <= 0.0 {
        return VolRegime::Normal;
    }
    let ratio = current / mean;
    if ratio > config.vol_high_ratio {
        VolRegime::High
    } else if ratio < config.vol_low_ratio {
        VolRegime::Low
    } else {
        VolRegime::Normal
    }
}
