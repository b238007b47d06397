//! Monotonic write boundary for stops.
//!
//! Every stop change to an `OpenPosition` goes through `StopLedger`. A lower
//! stop or a lower protection level is rejected and the position is left
//! untouched; an equal stop is accepted.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::manager::{StopRecommendation, StopReview};
use super::ratchet::StopRatchet;
use crate::domain::{OpenPosition, ProtectionLevel};
use crate::error::EngineError;

/// One accepted stop write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopChange {
    pub symbol: String,
    pub old_stop: f64,
    pub new_stop: f64,
    pub old_level: ProtectionLevel,
    pub new_level: ProtectionLevel,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct StopLedger {
    history: Vec<StopChange>,
}

impl StopLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        position: &mut OpenPosition,
        recommendation: &StopRecommendation,
    ) -> Result<StopChange, EngineError> {
        if recommendation.symbol != position.symbol {
            return Err(EngineError::invalid(
                "symbol",
                format!(
                    "recommendation for {} applied to {}",
                    recommendation.symbol, position.symbol
                ),
            ));
        }
        self.write_stop(
            position,
            recommendation.new_stop,
            recommendation.new_level,
            &recommendation.reason,
        )
    }

    pub fn write_stop(
        &mut self,
        position: &mut OpenPosition,
        new_stop: f64,
        new_level: ProtectionLevel,
        reason: &str,
    ) -> Result<StopChange, EngineError> {
        if !new_stop.is_finite() {
            return Err(EngineError::invalid("stop", format!("non-finite stop {new_stop}")));
        }
        let mut ratchet = StopRatchet::from_level(Some(position.current_stop));
        if let Err(current) = ratchet.try_raise(new_stop) {
            error!(
                symbol = %position.symbol,
                current,
                attempted = new_stop,
                "Rejected stop decrease"
            );
            return Err(EngineError::StopDecrease {
                symbol: position.symbol.clone(),
                current,
                attempted: new_stop,
            });
        }
        if new_level < position.protection_level {
            error!(
                symbol = %position.symbol,
                current = %position.protection_level,
                attempted = %new_level,
                "Rejected protection level regression"
            );
            return Err(EngineError::ProtectionRegression {
                symbol: position.symbol.clone(),
                current: position.protection_level,
                attempted: new_level,
            });
        }

        let change = StopChange {
            symbol: position.symbol.clone(),
            old_stop: position.current_stop,
            new_stop,
            old_level: position.protection_level,
            new_level,
            reason: reason.to_string(),
        };
        position.current_stop = new_stop;
        position.protection_level = new_level;

        info!(
            symbol = %change.symbol,
            old_stop = change.old_stop,
            new_stop = change.new_stop,
            level = %change.new_level,
            "Stop raised"
        );
        self.history.push(change.clone());
        Ok(change)
    }

    /// Persist the review's high-water marks (highest close and trailing
    /// level). Both only move up.
    pub fn observe(position: &mut OpenPosition, review: &StopReview) {
        if review.symbol != position.symbol {
            return;
        }
        if review.highest_close.is_finite() {
            position.highest_close = Some(
                position
                    .highest_close
                    .map_or(review.highest_close, |h| h.max(review.highest_close)),
            );
        }
        if let Some(trail) = review.trailing_stop {
            let mut ratchet = StopRatchet::from_level(position.trailing_stop);
            position.trailing_stop = Some(ratchet.apply(trail));
        }
        position.last_price = Some(review.price);
    }

    pub fn history(&self) -> &[StopChange] {
        &self.history
    }

    pub fn into_history(self) -> Vec<StopChange> {
        self.history
    }
}
