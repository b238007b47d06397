//! Regime classifier: market condition from a benchmark's close vs. its MA200.
//!
//! - BULLISH: close ≥ (1 + band)·MA200
//! - BEARISH: close ≤ (1 − band)·MA200
//! - SIDEWAYS: inside the band
//! - UNKNOWN: MA200 missing or non-positive
//!
//! A regime is *stable* only after `stability_days` consecutive observations
//! of the same raw regime within the last `history_window` observations.
//! An unstable SIDEWAYS reading falls back to BULLISH/BEARISH by side of MA200
//! (the raw reading is kept on `RegimeReading::raw`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Bar, MarketRegime};
use crate::indicators;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Half-width of the SIDEWAYS band around MA200, as a fraction.
    pub band: f64,
    pub stability_days: usize,
    pub history_window: usize,
    pub ma_long: usize,
    pub ma_short: usize,
    /// Resolve an unstable SIDEWAYS to the side of MA200.
    pub sideways_fallback: bool,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            band: 0.02,
            stability_days: 3,
            history_window: 10,
            ma_long: 200,
            ma_short: 50,
            sideways_fallback: true,
        }
    }
}

/// One benchmark observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkObservation {
    pub close: f64,
    pub ma50: f64,
    pub ma200: f64,
}

/// Regime reading for one benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeReading {
    /// Effective regime after the SIDEWAYS fallback.
    pub regime: MarketRegime,
    /// Regime as classified from the latest observation.
    pub raw: MarketRegime,
    pub stable: bool,
    /// Consecutive trailing observations sharing the raw regime.
    pub streak: usize,
    /// Close above MA50 on the latest observation.
    pub above_ma50: Option<bool>,
}

impl RegimeReading {
    pub fn unknown() -> Self {
        Self {
            regime: MarketRegime::Unknown,
            raw: MarketRegime::Unknown,
            stable: false,
            streak: 0,
            above_ma50: None,
        }
    }
}

/// Per-benchmark readings and the combined regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DualRegime {
    pub primary: RegimeReading,
    pub secondary: RegimeReading,
    pub combined: MarketRegime,
    pub stable: bool,
}

/// Classify a single observation.
pub fn classify(obs: &BenchmarkObservation, band: f64) -> MarketRegime {
    if !(obs.ma200.is_finite() && obs.ma200 > 0.0 && obs.close.is_finite()) {
        return MarketRegime::Unknown;
    }
    if obs.close >= (1.0 + band) * obs.ma200 {
        MarketRegime::Bullish
    } else if obs.close <= (1.0 - band) * obs.ma200 {
        MarketRegime::Bearish
    } else {
        MarketRegime::Sideways
    }
}

/// UNKNOWN if either is unknown, BEARISH if either is bearish, BULLISH only
/// if both are bullish, otherwise SIDEWAYS.
pub fn combine(a: MarketRegime, b: MarketRegime) -> MarketRegime {
    use MarketRegime::*;
    match (a, b) {
        (Unknown, _) | (_, Unknown) => Unknown,
        (Bearish, _) | (_, Bearish) => Bearish,
        (Bullish, Bullish) => Bullish,
        _ => Sideways,
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Classify an observation history (oldest first; last is current).
    pub fn classify_history(&self, history: &[BenchmarkObservation]) -> RegimeReading {
        let Some(current) = history.last() else {
            return RegimeReading::unknown();
        };
        let window = &history[history.len().saturating_sub(self.config.history_window)..];
        let raw = classify(current, self.config.band);
        let streak = window
            .iter()
            .rev()
            .take_while(|obs| classify(obs, self.config.band) == raw)
            .count();
        let stable = raw != MarketRegime::Unknown && streak >= self.config.stability_days;

        let regime = if raw == MarketRegime::Sideways && !stable && self.config.sideways_fallback {
            if current.close >= current.ma200 {
                MarketRegime::Bullish
            } else {
                MarketRegime::Bearish
            }
        } else {
            raw
        };

        let above_ma50 = (current.ma50.is_finite() && current.close.is_finite())
            .then(|| current.close > current.ma50);

        debug!(
            regime = %regime,
            raw = %raw,
            streak,
            stable,
            "Classified benchmark regime"
        );

        RegimeReading {
            regime,
            raw,
            stable,
            streak,
            above_ma50,
        }
    }

    /// Classify from raw bars.
    pub fn classify_bars(&self, bars: &[Bar]) -> RegimeReading {
        self.classify_series(&indicators::closes(bars))
    }

    /// Classify a close series: MA series come from the shared SMA, and the
    /// last `history_window` closes become the observation history.
    pub fn classify_series(&self, closes: &[f64]) -> RegimeReading {
        self.classify_history(&self.observations(closes))
    }

    pub fn observations(&self, closes: &[f64]) -> Vec<BenchmarkObservation> {
        let ma200 = indicators::sma(closes, self.config.ma_long);
        let ma50 = indicators::sma(closes, self.config.ma_short);
        let start = closes.len().saturating_sub(self.config.history_window);
        (start..closes.len())
            .map(|i| BenchmarkObservation {
                close: closes[i],
                ma50: ma50[i],
                ma200: ma200[i],
            })
            .collect()
    }

    /// Dual form: both benchmarks plus the combined regime. Stable only when
    /// both readings are stable.
    pub fn classify_dual(
        &self,
        primary: &[BenchmarkObservation],
        secondary: &[BenchmarkObservation],
    ) -> DualRegime {
        let primary = self.classify_history(primary);
        let secondary = self.classify_history(secondary);
        DualRegime {
            primary,
            secondary,
            combined: combine(primary.regime, secondary.regime),
            stable: primary.stable && secondary.stable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(close: f64) -> BenchmarkObservation {
        BenchmarkObservation {
            close,
            ma50: 100.0,
            ma200: 100.0,
        }
    }

    fn history(closes: &[f64]) -> Vec<BenchmarkObservation> {
        closes.iter().map(|&c| obs(c)).collect()
    }

    // ── Single observation ──

    #[test]
    fn band_edges_classify_inclusive() {
        assert_eq!(classify(&obs(102.0), 0.02), MarketRegime::Bullish);
        assert_eq!(classify(&obs(98.0), 0.02), MarketRegime::Bearish);
        assert_eq!(classify(&obs(101.9), 0.02), MarketRegime::Sideways);
        assert_eq!(classify(&obs(98.1), 0.02), MarketRegime::Sideways);
    }

    #[test]
    fn missing_ma_is_unknown() {
        let o = BenchmarkObservation {
            close: 100.0,
            ma50: f64::NAN,
            ma200: f64::NAN,
        };
        assert_eq!(classify(&o, 0.02), MarketRegime::Unknown);
    }

    // ── Stability ──

    #[test]
    fn stable_after_three_consecutive() {
        let c = RegimeClassifier::default();
        let reading = c.classify_history(&history(&[95.0, 105.0, 106.0, 107.0]));
        assert_eq!(reading.regime, MarketRegime::Bullish);
        assert_eq!(reading.streak, 3);
        assert!(reading.stable);
    }

    #[test]
    fn two_observations_are_unstable() {
        let c = RegimeClassifier::default();
        let reading = c.classify_history(&history(&[95.0, 105.0, 106.0]));
        assert_eq!(reading.streak, 2);
        assert!(!reading.stable);
    }

    #[test]
    fn insufficient_history_is_unstable() {
        let c = RegimeClassifier::default();
        assert!(!c.classify_history(&history(&[105.0])).stable);
        assert_eq!(c.classify_history(&[]).regime, MarketRegime::Unknown);
    }

    #[test]
    fn streak_limited_to_history_window() {
        let c = RegimeClassifier::new(RegimeConfig {
            history_window: 2,
            ..RegimeConfig::default()
        });
        let reading = c.classify_history(&history(&[105.0; 8]));
        assert_eq!(reading.streak, 2);
        assert!(!reading.stable);
    }

    #[test]
    fn unstable_sideways_falls_back_by_side_of_ma() {
        let c = RegimeClassifier::default();
        let reading = c.classify_history(&history(&[105.0, 105.0, 101.0]));
        assert_eq!(reading.raw, MarketRegime::Sideways);
        assert_eq!(reading.regime, MarketRegime::Bullish);
        assert!(!reading.stable);

        let reading = c.classify_history(&history(&[95.0, 99.0]));
        assert_eq!(reading.regime, MarketRegime::Bearish);
    }

    #[test]
    fn stable_sideways_is_kept() {
        let c = RegimeClassifier::default();
        let reading = c.classify_history(&history(&[100.5, 101.0, 99.5]));
        assert_eq!(reading.regime, MarketRegime::Sideways);
        assert!(reading.stable);
    }

    #[test]
    fn fallback_can_be_disabled() {
        let c = RegimeClassifier::new(RegimeConfig {
            sideways_fallback: false,
            ..RegimeConfig::default()
        });
        let reading = c.classify_history(&history(&[105.0, 101.0]));
        assert_eq!(reading.regime, MarketRegime::Sideways);
    }

    // ── Dual ──

    #[test]
    fn combine_rules() {
        use MarketRegime::*;
        assert_eq!(combine(Bullish, Bullish), Bullish);
        assert_eq!(combine(Bullish, Sideways), Sideways);
        assert_eq!(combine(Bullish, Bearish), Bearish);
        assert_eq!(combine(Sideways, Bearish), Bearish);
        assert_eq!(combine(Unknown, Bearish), Unknown);
        assert_eq!(combine(Sideways, Sideways), Sideways);
    }

    #[test]
    fn dual_requires_both_stable() {
        let c = RegimeClassifier::default();
        let dual = c.classify_dual(
            &history(&[105.0, 106.0, 107.0]),
            &history(&[105.0, 106.0]),
        );
        assert_eq!(dual.combined, MarketRegime::Bullish);
        assert!(dual.primary.stable);
        assert!(!dual.stable);
    }

    // ── From bars ──

    #[test]
    fn classify_bars_uptrend_is_bullish() {
        let closes: Vec<f64> = (0..260).map(|i| 100.0 + i as f64).collect();
        let bars = crate::indicators::make_bars(&closes);
        let reading = RegimeClassifier::default().classify_bars(&bars);
        assert_eq!(reading.regime, MarketRegime::Bullish);
        assert!(reading.stable);
        assert_eq!(reading.above_ma50, Some(true));
    }

    #[test]
    fn classify_bars_short_history_is_unknown() {
        let bars = crate::indicators::make_bars(&[100.0; 50]);
        let reading = RegimeClassifier::default().classify_bars(&bars);
        assert_eq!(reading.regime, MarketRegime::Unknown);
        assert!(!reading.stable);
    }
}
