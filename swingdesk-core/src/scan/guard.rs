//! Anti-chase and pullback-continuation guards.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::InstrumentSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionKind {
    FirstAfterWeekend,
    Subsequent,
}

impl SessionKind {
    pub fn for_date(date: NaiveDate) -> Self {
        if date.weekday() == Weekday::Mon {
            SessionKind::FirstAfterWeekend
        } else {
            SessionKind::Subsequent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChaseTier {
    /// Blocks when (price − trigger)/ATR is strictly above this.
    pub max_gap_atr: f64,
    /// Blocks when price is this many percent or more above the trigger.
    pub max_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiChaseConfig {
    pub first_session: ChaseTier,
    pub subsequent: ChaseTier,
}

impl Default for AntiChaseConfig {
    fn default() -> Self {
        Self {
            first_session: ChaseTier {
                max_gap_atr: 0.75,
                max_pct: 3.0,
            },
            subsequent: ChaseTier {
                max_gap_atr: 1.0,
                max_pct: 4.0,
            },
        }
    }
}

impl AntiChaseConfig {
    pub fn tier(&self, session: SessionKind) -> &ChaseTier {
        match session {
            SessionKind::FirstAfterWeekend => &self.first_session,
            SessionKind::Subsequent => &self.subsequent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullbackConfig {
    /// Half-width of the pullback zone around the anchor, in ATRs.
    pub zone_atr: f64,
    /// Stop distance below the pullback low, in ATRs.
    pub stop_atr: f64,
}

impl Default for PullbackConfig {
    fn default() -> Self {
        Self {
            zone_atr: 0.5,
            stop_atr: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardBlock {
    ChaseGap { gap_atr: f64, limit: f64 },
    ChasePercent { pct: f64, limit: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardOutcome {
    Clear,
    Blocked { reason: GuardBlock },
    PullbackTriggered { entry: f64, stop: f64 },
    PullbackPending { zone_low: f64, zone_high: f64 },
}

impl GuardOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, GuardOutcome::Blocked { .. })
    }
}

pub fn anti_chase(
    price: f64,
    trigger: f64,
    atr: f64,
    session: SessionKind,
    config: &AntiChaseConfig,
) -> GuardOutcome {
    if !(price > trigger) || trigger <= 0.0 {
        return GuardOutcome::Clear;
    }
    let tier = config.tier(session);
    if atr > 0.0 {
        let gap_atr = (price - trigger) / atr;
        if gap_atr > tier.max_gap_atr {
            return GuardOutcome::Blocked {
                reason: GuardBlock::ChaseGap {
                    gap_atr,
                    limit: tier.max_gap_atr,
                },
            };
        }
    }
    let pct = (price - trigger) / trigger * 100.0;
    if pct >= tier.max_pct {
        return GuardOutcome::Blocked {
            reason: GuardBlock::ChasePercent {
                pct,
                limit: tier.max_pct,
            },
        };
    }
    GuardOutcome::Clear
}

/// Zone = anchor ± zone_atr·ATR. Triggers when the day's low tagged the zone
/// and the close finished above it.
pub fn pullback(snap: &InstrumentSnapshot, config: &PullbackConfig) -> GuardOutcome {
    let anchor = snap.anchor();
    let zone_low = anchor - config.zone_atr * snap.atr;
    let zone_high = anchor + config.zone_atr * snap.atr;
    let tagged = snap.low >= zone_low && snap.low <= zone_high;
    if tagged && snap.close > zone_high {
        let low = snap
            .pullback_low
            .filter(|l| l.is_finite())
            .unwrap_or(snap.low);
        GuardOutcome::PullbackTriggered {
            entry: snap.close,
            stop: low - config.stop_atr * snap.atr,
        }
    } else {
        GuardOutcome::PullbackPending {
            zone_low,
            zone_high,
        }
    }
}
