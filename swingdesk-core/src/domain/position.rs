//! Open position and its protection level.
//!
//! Positions are owned by the persistence collaborator. Inside the engine the
//! only mutation path is `stops::StopLedger`, which enforces that
//! `current_stop` never decreases and `protection_level` never regresses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::tags::Sleeve;

/// Rung of the protection ladder. Ordering follows the ladder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum ProtectionLevel {
    #[default]
    #[serde(rename = "INITIAL")]
    Initial,
    #[serde(rename = "BREAKEVEN")]
    Breakeven,
    #[serde(rename = "LOCK_08R")]
    Lock08R,
    #[serde(rename = "LOCK_1R_TRAIL")]
    Lock1RTrail,
}

impl ProtectionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ProtectionLevel::Initial => "INITIAL",
            ProtectionLevel::Breakeven => "BREAKEVEN",
            ProtectionLevel::Lock08R => "LOCK_08R",
            ProtectionLevel::Lock1RTrail => "LOCK_1R_TRAIL",
        }
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProtectionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INITIAL" | "" => Ok(ProtectionLevel::Initial),
            "BREAKEVEN" => Ok(ProtectionLevel::Breakeven),
            "LOCK_08R" => Ok(ProtectionLevel::Lock08R),
            "LOCK_1R_TRAIL" => Ok(ProtectionLevel::Lock1RTrail),
            other => Err(format!("unknown protection level '{other}'")),
        }
    }
}

/// A held long position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: f64,
    /// Risk per share at entry (entry − initial stop). Frozen for the life of the position.
    pub initial_risk: f64,
    pub current_stop: f64,
    #[serde(default)]
    pub protection_level: ProtectionLevel,
    /// Latest observed price. Falls back to entry price when unknown.
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub highest_close: Option<f64>,
    /// High-water mark of the trailing-ATR stop.
    #[serde(default)]
    pub trailing_stop: Option<f64>,
    #[serde(default)]
    pub adds_taken: u32,
    #[serde(default)]
    pub sleeve: Sleeve,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub fx_rate: Option<f64>,
}

impl OpenPosition {
    pub fn new(
        symbol: impl Into<String>,
        entry_date: NaiveDate,
        entry_price: f64,
        shares: f64,
        initial_stop: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            entry_date,
            entry_price,
            shares,
            initial_risk: entry_price - initial_stop,
            current_stop: initial_stop,
            protection_level: ProtectionLevel::Initial,
            last_price: None,
            highest_close: None,
            trailing_stop: None,
            adds_taken: 0,
            sleeve: Sleeve::default(),
            cluster: None,
            sector: None,
            fx_rate: None,
        }
    }

    pub fn mark_price(&self) -> f64 {
        match self.last_price {
            Some(p) if p.is_finite() && p > 0.0 => p,
            _ => self.entry_price,
        }
    }

    pub fn fx(&self) -> f64 {
        match self.fx_rate {
            Some(fx) if fx.is_finite() && fx > 0.0 => fx,
            _ => 1.0,
        }
    }

    /// Market value in account currency.
    pub fn market_value(&self) -> f64 {
        self.shares * self.mark_price() * self.fx()
    }

    /// Cash at risk if the stop is hit from the current mark, in account
    /// currency. A stop at or above the mark contributes zero.
    pub fn open_risk(&self) -> f64 {
        ((self.mark_price() - self.current_stop).max(0.0)) * self.shares * self.fx()
    }

    /// Profit as a multiple of initial risk at `price`.
    pub fn r_multiple(&self, price: f64) -> f64 {
        if self.initial_risk > 0.0 {
            (price - self.entry_price) / self.initial_risk
        } else {
            0.0
        }
    }
}
