//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use swingdesk_core::domain::{Bar, InstrumentSnapshot, Sleeve};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bars from closes: open = previous close, high/low one point outside the
/// body, flat volume.
pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    let start = date(2023, 1, 2);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: symbol.to_string(),
                date: start + Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1_000,
            }
        })
        .collect()
}

/// READY breakout: trigger 100.8, stop 97.8, close 100.
pub fn ready_snapshot(symbol: &str, sleeve: Sleeve) -> InstrumentSnapshot {
    InstrumentSnapshot {
        symbol: symbol.into(),
        sleeve,
        close: 100.0,
        low: 98.5,
        high: 100.5,
        prev_close: 99.0,
        ma200: 80.0,
        ma50: 95.0,
        ma20: 98.0,
        ema20: 98.0,
        adx: 30.0,
        plus_di: 30.0,
        minus_di: 15.0,
        atr: 2.0,
        atr_pct: 2.0,
        high_20: 100.6,
        low_20: 90.0,
        vol_ratio: 1.5,
        efficiency: 50.0,
        ..InstrumentSnapshot::default()
    }
}
