//! Dual-quality scorer: breakout quality (BQS), fragility/weakness (FWS),
//! exposure and event penalties, and the net composite (NCS).
//!
//! Scoring is advisory. The resulting action annotates a candidate but never
//! gates it; the scan's filters and risk gates remain the only hard stops.

mod bqs;
mod fws;
mod penalty;

pub use bqs::BqsBreakdown;
pub use fws::FwsBreakdown;
pub use penalty::Penalties;

use serde::{Deserialize, Serialize};

use crate::domain::InstrumentSnapshot;

/// Scorer thresholds and weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    // ── BQS ──
    pub adx_floor: f64,
    pub adx_full: f64,
    pub trend_max: f64,
    pub dominance_weight: f64,
    pub dominance_max: f64,
    pub atr_band_low: f64,
    pub atr_band_high: f64,
    pub vol_health_max: f64,
    /// Points lost per ATR% point outside the healthy band.
    pub vol_health_step: f64,
    pub proximity_max: f64,
    pub proximity_step: f64,
    pub regime_bull: f64,
    pub regime_bear: f64,
    pub vol_regime_calm: f64,
    pub vol_regime_high: f64,
    pub alignment_bonus: f64,
    pub rs_weight: f64,
    pub rs_max: f64,
    pub volume_surge_ratio: f64,
    pub volume_surge_bonus: f64,
    pub weekly_bonus: f64,
    /// Cap applied to each pre-computed bonus.
    pub bonus_cap: f64,

    // ── FWS ──
    pub volume_deficit_weight: f64,
    pub volume_deficit_max: f64,
    pub extension_weight: f64,
    pub extension_max: f64,
    pub extension_chase_max: f64,
    pub marginal_trend_ceiling: f64,
    pub marginal_trend_max: f64,
    pub vol_shock_base: f64,
    pub atr_shock_threshold: f64,
    pub atr_shock_weight: f64,
    pub atr_shock_max: f64,
    pub instability: f64,

    // ── Penalties ──
    /// (max days to earnings, penalty), checked in order.
    pub earnings_tiers: Vec<(i64, f64)>,
    /// Flat penalty when only the earnings-soon flag is known.
    pub earnings_flag: f64,
    pub super_cluster_cap: f64,
    /// Exposure ratio at which the cluster penalties start.
    pub exposure_onset: f64,
    pub cluster_ramp: f64,
    pub cluster_slope: f64,
    pub super_cluster_ramp: f64,
    pub super_cluster_slope: f64,
    pub penalty_cap: f64,

    // ── NCS and action ──
    pub ncs_fws_weight: f64,
    pub ncs_offset: f64,
    pub reject_fws: f64,
    pub accept_ncs: f64,
    pub accept_fws: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            adx_floor: 15.0,
            adx_full: 40.0,
            trend_max: 25.0,
            dominance_weight: 0.5,
            dominance_max: 10.0,
            atr_band_low: 1.5,
            atr_band_high: 4.0,
            vol_health_max: 15.0,
            vol_health_step: 5.0,
            proximity_max: 15.0,
            proximity_step: 5.0,
            regime_bull: 10.0,
            regime_bear: -10.0,
            vol_regime_calm: 5.0,
            vol_regime_high: -5.0,
            alignment_bonus: 5.0,
            rs_weight: 50.0,
            rs_max: 10.0,
            volume_surge_ratio: 1.5,
            volume_surge_bonus: 5.0,
            weekly_bonus: 5.0,
            bonus_cap: 5.0,

            volume_deficit_weight: 30.0,
            volume_deficit_max: 25.0,
            extension_weight: 15.0,
            extension_max: 20.0,
            extension_chase_max: 40.0,
            marginal_trend_ceiling: 30.0,
            marginal_trend_max: 20.0,
            vol_shock_base: 10.0,
            atr_shock_threshold: 5.0,
            atr_shock_weight: 5.0,
            atr_shock_max: 15.0,
            instability: 15.0,

            earnings_tiers: vec![(3, 20.0), (7, 10.0), (14, 5.0)],
            earnings_flag: 10.0,
            super_cluster_cap: 0.50,
            exposure_onset: 0.8,
            cluster_ramp: 20.0,
            cluster_slope: 30.0,
            super_cluster_ramp: 25.0,
            super_cluster_slope: 40.0,
            penalty_cap: 40.0,

            ncs_fws_weight: 0.8,
            ncs_offset: 10.0,
            reject_fws: 65.0,
            accept_ncs: 70.0,
            accept_fws: 30.0,
        }
    }
}

/// Advisory action derived from the scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreAction {
    AutoAccept,
    Conditional,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub bqs: BqsBreakdown,
    pub fws: FwsBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualScore {
    pub bqs: f64,
    pub fws: f64,
    pub ncs: f64,
    pub penalties: Penalties,
    pub components: ScoreComponents,
    pub action: ScoreAction,
    pub annotations: Vec<String>,
}

/// Score one snapshot. Regime and stability are read from the snapshot;
/// absent enrichments contribute their neutral value. `cluster_cap` is the
/// risk layer's cluster cap, against which the cluster penalty is measured.
pub fn score(snapshot: &InstrumentSnapshot, config: &ScoringConfig, cluster_cap: f64) -> DualScore {
    let bqs_parts = bqs::breakdown(snapshot, config);
    let fws_parts = fws::breakdown(snapshot, config);
    let penalties = penalty::assess(snapshot, config, cluster_cap);

    let bqs = bqs_parts.total();
    let fws = fws_parts.total();
    let gross = (bqs - config.ncs_fws_weight * fws + config.ncs_offset).clamp(0.0, 100.0);
    let ncs = (gross - penalties.total).clamp(0.0, 100.0);

    let action = if fws > config.reject_fws {
        ScoreAction::Reject
    } else if ncs >= config.accept_ncs && fws <= config.accept_fws {
        ScoreAction::AutoAccept
    } else {
        ScoreAction::Conditional
    };

    let mut annotations = Vec::new();
    if penalties.earnings > 0.0 {
        annotations.push("earnings headwind".to_string());
    }

    DualScore {
        bqs,
        fws,
        ncs,
        penalties,
        components: ScoreComponents {
            bqs: bqs_parts,
            fws: fws_parts,
        },
        action,
        annotations,
    }
}

/// Clamp a finite value into [lo, hi]; a non-finite input contributes the
/// neutral value (0, or the nearest bound when 0 is out of range).
pub(crate) fn bounded(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        0.0_f64.clamp(lo, hi)
    }
}
