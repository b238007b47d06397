//! Fragility / weakness sub-scores. Higher is worse.

use serde::{Deserialize, Serialize};

use super::{bounded, ScoringConfig};
use crate::domain::{InstrumentSnapshot, VolRegime};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FwsBreakdown {
    pub volume_deficit: f64,
    pub extension: f64,
    pub marginal_trend: f64,
    pub vol_shock: f64,
    pub instability: f64,
}

impl FwsBreakdown {
    pub fn total(&self) -> f64 {
        (self.volume_deficit + self.extension + self.marginal_trend + self.vol_shock + self.instability)
            .clamp(0.0, 100.0)
    }
}

pub(super) fn breakdown(snap: &InstrumentSnapshot, cfg: &ScoringConfig) -> FwsBreakdown {
    FwsBreakdown {
        volume_deficit: bounded(
            cfg.volume_deficit_weight * (1.0 - snap.vol_ratio),
            0.0,
            cfg.volume_deficit_max,
        ),
        extension: extension(snap, cfg),
        marginal_trend: bounded(
            cfg.marginal_trend_ceiling - snap.adx,
            0.0,
            cfg.marginal_trend_max,
        ),
        vol_shock: vol_shock(snap, cfg),
        instability: if snap.regime_stable == Some(false) {
            cfg.instability
        } else {
            0.0
        },
    }
}

fn extension(snap: &InstrumentSnapshot, cfg: &ScoringConfig) -> f64 {
    let base = bounded(cfg.extension_weight * snap.extension(), 0.0, cfg.extension_max);
    if snap.chase_gap && snap.chase_extended {
        (2.0 * base).min(cfg.extension_chase_max)
    } else {
        base
    }
}

fn vol_shock(snap: &InstrumentSnapshot, cfg: &ScoringConfig) -> f64 {
    let base = if snap.vol_regime == VolRegime::High {
        cfg.vol_shock_base
    } else {
        0.0
    };
    base + bounded(
        cfg.atr_shock_weight * (snap.atr_pct - cfg.atr_shock_threshold),
        0.0,
        cfg.atr_shock_max,
    )
}
