//! Account equity, static risk profile, and exit history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Static per-account risk policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskProfile {
    /// Percent of equity risked per new trade (0.75 = 0.75%).
    pub risk_per_trade_pct: f64,
    pub max_positions: usize,
    /// Ceiling on aggregate open risk, percent of equity.
    pub max_open_risk_pct: f64,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 0.75,
            max_positions: 8,
            max_open_risk_pct: 7.0,
        }
    }
}

/// Account state for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Total equity in account currency.
    pub equity: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub profile: RiskProfile,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Account {
    pub fn new(equity: f64) -> Self {
        Self {
            equity,
            currency: default_currency(),
            profile: RiskProfile::default(),
        }
    }

    /// Cash risked on one new trade.
    pub fn risk_cash(&self) -> f64 {
        self.equity * self.profile.risk_per_trade_pct / 100.0
    }
}

/// How a closed position exited. Feeds whipsaw and re-entry rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitKind {
    StopHit,
    Manual,
    Target,
}

/// A closed trade from the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub symbol: String,
    pub exit_date: NaiveDate,
    pub kind: ExitKind,
    /// Realized result in R.
    pub r_multiple: f64,
}
