//! Breakout quality sub-scores.

use serde::{Deserialize, Serialize};

use super::{bounded, ScoringConfig};
use crate::domain::{InstrumentSnapshot, MarketRegime, VolRegime};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BqsBreakdown {
    pub trend: f64,
    pub dominance: f64,
    pub vol_health: f64,
    pub proximity: f64,
    pub composite: f64,
    pub relative_strength: f64,
    pub volume: f64,
    pub weekly: f64,
    pub pattern_bonus: f64,
    pub sector_bonus: f64,
}

impl BqsBreakdown {
    pub fn total(&self) -> f64 {
        let sum = self.trend
            + self.dominance
            + self.vol_health
            + self.proximity
            + self.composite
            + self.relative_strength
            + self.volume
            + self.weekly
            + self.pattern_bonus
            + self.sector_bonus;
        sum.clamp(0.0, 100.0)
    }
}

pub(super) fn breakdown(snap: &InstrumentSnapshot, cfg: &ScoringConfig) -> BqsBreakdown {
    BqsBreakdown {
        trend: trend(snap.adx, cfg),
        dominance: bounded(
            cfg.dominance_weight * (snap.plus_di - snap.minus_di),
            0.0,
            cfg.dominance_max,
        ),
        vol_health: vol_health(snap.atr_pct, cfg),
        proximity: proximity(snap, cfg),
        composite: composite(snap, cfg),
        relative_strength: snap
            .relative_strength
            .map_or(0.0, |rs| bounded(cfg.rs_weight * rs, 0.0, cfg.rs_max)),
        volume: if snap.vol_ratio >= cfg.volume_surge_ratio {
            cfg.volume_surge_bonus
        } else {
            0.0
        },
        weekly: if snap.weekly_confirmed {
            cfg.weekly_bonus
        } else {
            0.0
        },
        pattern_bonus: snap
            .pattern_bonus
            .map_or(0.0, |b| bounded(b, 0.0, cfg.bonus_cap)),
        sector_bonus: snap
            .sector_bonus
            .map_or(0.0, |b| bounded(b, 0.0, cfg.bonus_cap)),
    }
}

/// 0 at the ADX floor, linear up to `trend_max` at `adx_full`.
fn trend(adx: f64, cfg: &ScoringConfig) -> f64 {
    let span = cfg.adx_full - cfg.adx_floor;
    if span <= 0.0 {
        return 0.0;
    }
    bounded(
        (adx - cfg.adx_floor) / span * cfg.trend_max,
        0.0,
        cfg.trend_max,
    )
}

fn vol_health(atr_pct: f64, cfg: &ScoringConfig) -> f64 {
    if !atr_pct.is_finite() {
        return 0.0;
    }
    let outside = if atr_pct < cfg.atr_band_low {
        cfg.atr_band_low - atr_pct
    } else if atr_pct > cfg.atr_band_high {
        atr_pct - cfg.atr_band_high
    } else {
        0.0
    };
    bounded(
        cfg.vol_health_max - cfg.vol_health_step * outside,
        0.0,
        cfg.vol_health_max,
    )
}

/// Distance from close up to the 20-day high, in percent of close.
fn proximity(snap: &InstrumentSnapshot, cfg: &ScoringConfig) -> f64 {
    if !(snap.close > 0.0 && snap.high_20.is_finite()) {
        return 0.0;
    }
    let distance_pct = (snap.high_20 - snap.close) / snap.close * 100.0;
    bounded(
        cfg.proximity_max - cfg.proximity_step * distance_pct.max(0.0),
        0.0,
        cfg.proximity_max,
    )
}

fn composite(snap: &InstrumentSnapshot, cfg: &ScoringConfig) -> f64 {
    let regime = match snap.regime {
        Some(MarketRegime::Bullish) => cfg.regime_bull,
        Some(MarketRegime::Bearish) => cfg.regime_bear,
        _ => 0.0,
    };
    let vol = match snap.vol_regime {
        VolRegime::Low | VolRegime::Normal => cfg.vol_regime_calm,
        VolRegime::High => cfg.vol_regime_high,
    };
    let aligned = if snap.dual_aligned {
        cfg.alignment_bonus
    } else {
        0.0
    };
    bounded(regime + vol + aligned, -10.0, 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn trend_is_linear_between_floor_and_full() {
        assert_eq!(trend(15.0, &cfg()), 0.0);
        assert!((trend(27.5, &cfg()) - 12.5).abs() < 1e-9);
        assert_eq!(trend(40.0, &cfg()), 25.0);
        assert_eq!(trend(60.0, &cfg()), 25.0);
        assert_eq!(trend(f64::NAN, &cfg()), 0.0);
    }

    #[test]
    fn vol_health_band() {
        assert_eq!(vol_health(1.5, &cfg()), 15.0);
        assert_eq!(vol_health(4.0, &cfg()), 15.0);
        assert!((vol_health(5.0, &cfg()) - 10.0).abs() < 1e-9);
        assert!((vol_health(1.0, &cfg()) - 12.5).abs() < 1e-9);
        assert_eq!(vol_health(9.0, &cfg()), 0.0);
    }

    #[test]
    fn proximity_full_above_the_high() {
        let snap = InstrumentSnapshot {
            close: 105.0,
            high_20: 100.0,
            ..InstrumentSnapshot::default()
        };
        assert_eq!(proximity(&snap, &cfg()), 15.0);
    }

    #[test]
    fn proximity_decays_with_distance() {
        let snap = InstrumentSnapshot {
            close: 100.0,
            high_20: 102.0,
            ..InstrumentSnapshot::default()
        };
        assert!((proximity(&snap, &cfg()) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn composite_extremes() {
        let bull = InstrumentSnapshot {
            regime: Some(MarketRegime::Bullish),
            dual_aligned: true,
            ..InstrumentSnapshot::default()
        };
        assert_eq!(composite(&bull, &cfg()), 20.0);

        let bear = InstrumentSnapshot {
            regime: Some(MarketRegime::Bearish),
            vol_regime: VolRegime::High,
            ..InstrumentSnapshot::default()
        };
        assert_eq!(composite(&bear, &cfg()), -10.0);
    }

    #[test]
    fn bonuses_are_capped() {
        let snap = InstrumentSnapshot {
            pattern_bonus: Some(12.0),
            sector_bonus: Some(-3.0),
            ..InstrumentSnapshot::default()
        };
        let parts = breakdown(&snap, &cfg());
        assert_eq!(parts.pattern_bonus, 5.0);
        assert_eq!(parts.sector_bonus, 0.0);
    }
}
