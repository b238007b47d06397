//! Earnings and exposure penalties subtracted from the net composite.

use serde::{Deserialize, Serialize};

use super::ScoringConfig;
use crate::domain::InstrumentSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalties {
    pub earnings: f64,
    pub cluster: f64,
    pub super_cluster: f64,
    /// Sum of the above, capped.
    pub total: f64,
}

pub(super) fn assess(snap: &InstrumentSnapshot, cfg: &ScoringConfig, cluster_cap: f64) -> Penalties {
    let earnings = earnings(snap, cfg);
    let cluster = exposure(
        snap.cluster_exposure,
        cluster_cap,
        cfg.exposure_onset,
        cfg.cluster_ramp,
        cfg.cluster_slope,
    );
    let super_cluster = exposure(
        snap.super_cluster_exposure,
        cfg.super_cluster_cap,
        cfg.exposure_onset,
        cfg.super_cluster_ramp,
        cfg.super_cluster_slope,
    );
    Penalties {
        earnings,
        cluster,
        super_cluster,
        total: (earnings + cluster + super_cluster).min(cfg.penalty_cap),
    }
}

fn earnings(snap: &InstrumentSnapshot, cfg: &ScoringConfig) -> f64 {
    match snap.days_to_earnings {
        Some(days) if days >= 0 => cfg
            .earnings_tiers
            .iter()
            .find(|(max_days, _)| days <= *max_days)
            .map_or(0.0, |(_, penalty)| *penalty),
        Some(_) => 0.0,
        None if snap.earnings_soon == Some(true) => cfg.earnings_flag,
        None => 0.0,
    }
}

/// Zero below `onset`, linear to `ramp` at ratio 1.0, then `slope` per unit over.
fn exposure(exposure: Option<f64>, cap: f64, onset: f64, ramp: f64, slope: f64) -> f64 {
    let Some(exposure) = exposure.filter(|e| e.is_finite()) else {
        return 0.0;
    };
    if cap <= 0.0 {
        return 0.0;
    }
    let ratio = exposure / cap;
    if ratio < onset {
        0.0
    } else if ratio <= 1.0 {
        if onset < 1.0 {
            ramp * (ratio - onset) / (1.0 - onset)
        } else {
            ramp
        }
    } else {
        ramp + slope * (ratio - 1.0)
    }
}
