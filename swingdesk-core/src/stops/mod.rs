//! Stop manager: protection ladder, ATR trailing stop, chop tightening,
//! held-position advisories, and the monotonic write boundary.
//!
//! States only advance: INITIAL → BREAKEVEN → LOCK_08R → LOCK_1R_TRAIL.
//! The stop only rises. `StopManager::review` computes, `StopLedger` writes.

pub mod advisory;
pub mod ladder;
pub mod ledger;
pub mod manager;
pub mod ratchet;
pub mod trailing;

pub use advisory::{Advisory, AdvisoryConfig};
pub use ladder::{LadderConfig, LadderStep};
pub use ledger::{StopChange, StopLedger};
pub use manager::{StopContext, StopManager, StopRecommendation, StopReview};
pub use ratchet::StopRatchet;
pub use trailing::{ChopConfig, TrailingConfig};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopConfig {
    pub ladder: LadderConfig,
    pub trailing: TrailingConfig,
    pub chop: ChopConfig,
    pub advisory: AdvisoryConfig,
    /// ATR period when ATR is derived from bars.
    pub atr_period: usize,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            ladder: LadderConfig::default(),
            trailing: TrailingConfig::default(),
            chop: ChopConfig::default(),
            advisory: AdvisoryConfig::default(),
            atr_period: 14,
        }
    }
}
