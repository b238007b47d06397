//! ATR trailing stop and sideways chop tightening.

use serde::{Deserialize, Serialize};

use super::ratchet::StopRatchet;
use crate::domain::OpenPosition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingConfig {
    pub enabled: bool,
    pub atr_mult: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            atr_mult: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChopConfig {
    pub enabled: bool,
    pub atr_mult: f64,
}

impl Default for ChopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            atr_mult: 1.5,
        }
    }
}

/// Highest close since entry including today's price.
pub fn highest_close(position: &OpenPosition, price: f64) -> f64 {
    position
        .highest_close
        .filter(|h| h.is_finite())
        .unwrap_or(position.entry_price)
        .max(price)
}

/// Trailing level `highest − mult·ATR`, ratcheted against the persisted
/// trailing stop. Without ATR the persisted level carries forward unchanged.
pub fn trailing_stop(
    position: &OpenPosition,
    highest: f64,
    atr: Option<f64>,
    config: &TrailingConfig,
) -> Option<f64> {
    let mut ratchet = StopRatchet::from_level(position.trailing_stop);
    match atr {
        Some(atr) if config.enabled => Some(ratchet.apply(highest - config.atr_mult * atr)),
        _ => ratchet.current_level(),
    }
}

/// `close − mult·ATR`, for non-ETF positions in a sideways market.
pub fn chop_stop(price: f64, atr: Option<f64>, config: &ChopConfig) -> Option<f64> {
    match atr {
        Some(atr) if config.enabled => Some(price - config.atr_mult * atr),
        _ => None,
    }
}
