//! R-multiple protection ladder.
//!
//! | R    | Level          | Stop                                         |
//! |------|----------------|----------------------------------------------|
//! | 1.5  | BREAKEVEN      | entry                                        |
//! | 2.5  | LOCK_08R       | entry + 0.5R                                 |
//! | 3.0  | LOCK_1R_TRAIL  | max(entry + 1.0R, price − 2·ATR), ATR if any |

use serde::{Deserialize, Serialize};

use crate::domain::{OpenPosition, ProtectionLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    pub breakeven_r: f64,
    pub lock_r: f64,
    pub lock_offset_r: f64,
    pub trail_r: f64,
    pub trail_lock_r: f64,
    pub trail_atr_mult: f64,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            breakeven_r: 1.5,
            lock_r: 2.5,
            lock_offset_r: 0.5,
            trail_r: 3.0,
            trail_lock_r: 1.0,
            trail_atr_mult: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LadderStep {
    pub level: ProtectionLevel,
    pub stop: f64,
}

/// Highest rung reached at `price`, or `None` below the first rung.
pub fn rung(position: &OpenPosition, price: f64, atr: Option<f64>, config: &LadderConfig) -> Option<LadderStep> {
    let entry = position.entry_price;
    let risk = position.initial_risk;
    let r = position.r_multiple(price);

    if r >= config.trail_r {
        let floor = entry + config.trail_lock_r * risk;
        let stop = match atr {
            Some(atr) => floor.max(price - config.trail_atr_mult * atr),
            None => floor,
        };
        Some(LadderStep {
            level: ProtectionLevel::Lock1RTrail,
            stop,
        })
    } else if r >= config.lock_r {
        Some(LadderStep {
            level: ProtectionLevel::Lock08R,
            stop: entry + config.lock_offset_r * risk,
        })
    } else if r >= config.breakeven_r {
        Some(LadderStep {
            level: ProtectionLevel::Breakeven,
            stop: entry,
        })
    } else {
        None
    }
}

/// The rung to move to, only when it outranks the current level and its
/// stop is strictly above the current stop.
pub fn next_step(
    position: &OpenPosition,
    price: f64,
    atr: Option<f64>,
    config: &LadderConfig,
) -> Option<LadderStep> {
    rung(position, price, atr, config)
        .filter(|step| step.level > position.protection_level && step.stop > position.current_stop)
}
