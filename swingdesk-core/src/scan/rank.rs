//! Rank score. Orders candidates; never gates them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::classify::CandidateStatus;
use crate::domain::InstrumentSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankWeights {
    /// Multiplied by the sleeve preference (STOCK_CORE 3 … HEDGE 0).
    pub sleeve: f64,
    pub ready: f64,
    pub wait_pullback: f64,
    pub watch: f64,
    pub far: f64,
    pub adx: f64,
    pub adx_cap: f64,
    pub volume: f64,
    pub volume_cap: f64,
    pub efficiency: f64,
    pub relative_strength: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            sleeve: 10.0,
            ready: 30.0,
            wait_pullback: 15.0,
            watch: 10.0,
            far: 0.0,
            adx: 0.5,
            adx_cap: 50.0,
            volume: 5.0,
            volume_cap: 3.0,
            efficiency: 0.2,
            relative_strength: 20.0,
        }
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

pub fn rank_score(snap: &InstrumentSnapshot, status: CandidateStatus, w: &RankWeights) -> f64 {
    let status_bonus = match status {
        CandidateStatus::Ready => w.ready,
        CandidateStatus::WaitPullback => w.wait_pullback,
        CandidateStatus::Watch => w.watch,
        CandidateStatus::Far => w.far,
    };
    w.sleeve * f64::from(snap.sleeve.preference())
        + status_bonus
        + w.adx * finite_or_zero(snap.adx).min(w.adx_cap)
        + w.volume * finite_or_zero(snap.vol_ratio).min(w.volume_cap)
        + w.efficiency * finite_or_zero(snap.efficiency)
        + w.relative_strength * snap.relative_strength.map_or(0.0, |rs| finite_or_zero(rs.clamp(-1.0, 1.0)))
}

/// Descending score, then ascending symbol.
pub fn rank_order(a: (f64, &str), b: (f64, &str)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}
