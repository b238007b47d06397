//! Effective limits (momentum expansion, breadth valve) and the risk budget
//! snapshot reported alongside every scan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::book::Book;
use super::caps::PortfolioStage;
use super::{ConcentrationBasis, RiskConfig};
use crate::domain::{RiskProfile, Sleeve};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumExpansion {
    pub enabled: bool,
    /// Benchmark ADX must exceed this.
    pub adx_threshold: f64,
    pub multiplier: f64,
    /// Absolute open-risk ceiling in percent.
    pub ceiling_pct: f64,
}

impl Default for MomentumExpansion {
    fn default() -> Self {
        Self {
            enabled: true,
            adx_threshold: 25.0,
            multiplier: 1.2,
            ceiling_pct: 8.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreadthValve {
    pub enabled: bool,
    /// Share of the universe above MA50 below which the valve closes.
    pub threshold: f64,
    pub max_positions: usize,
}

impl Default for BreadthValve {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.40,
            max_positions: 4,
        }
    }
}

/// Market inputs that move the limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketBackdrop {
    pub benchmark_adx: Option<f64>,
    /// Fraction (0–1) of non-hedge instruments above MA50.
    pub breadth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub base_open_risk_pct: f64,
    pub max_open_risk_pct: f64,
    pub max_positions: usize,
    pub expansion_active: bool,
    pub breadth_valve_active: bool,
}

impl RiskLimits {
    /// Limits straight from the profile, with no market adjustment.
    pub fn from_profile(profile: &RiskProfile) -> Self {
        Self {
            base_open_risk_pct: profile.max_open_risk_pct,
            max_open_risk_pct: profile.max_open_risk_pct,
            max_positions: profile.max_positions,
            expansion_active: false,
            breadth_valve_active: false,
        }
    }

    pub fn resolve(profile: &RiskProfile, config: &RiskConfig, backdrop: &MarketBackdrop) -> Self {
        let mut limits = Self::from_profile(profile);

        let momentum = &config.momentum;
        if momentum.enabled
            && backdrop
                .benchmark_adx
                .is_some_and(|adx| adx > momentum.adx_threshold)
        {
            let expanded = (profile.max_open_risk_pct * momentum.multiplier).min(momentum.ceiling_pct);
            if expanded > limits.max_open_risk_pct {
                limits.max_open_risk_pct = expanded;
                limits.expansion_active = true;
            }
        }

        let valve = &config.breadth;
        if valve.enabled
            && backdrop.breadth.is_some_and(|b| b < valve.threshold)
            && valve.max_positions < limits.max_positions
        {
            limits.max_positions = valve.max_positions;
            limits.breadth_valve_active = true;
        }

        if limits.expansion_active || limits.breadth_valve_active {
            info!(
                max_open_risk_pct = limits.max_open_risk_pct,
                max_positions = limits.max_positions,
                expansion = limits.expansion_active,
                breadth_valve = limits.breadth_valve_active,
                "Adjusted risk limits"
            );
        }
        limits
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleeveUtilisation {
    /// Sleeve share of the concentration basis, in percent.
    pub value_pct: f64,
    pub cap_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBudget {
    pub used_risk_pct: f64,
    pub max_risk_pct: f64,
    pub base_max_risk_pct: f64,
    pub used_positions: usize,
    pub max_positions: usize,
    pub stage: PortfolioStage,
    pub sleeves: BTreeMap<Sleeve, SleeveUtilisation>,
    pub expansion_active: bool,
    pub breadth_valve_active: bool,
}

impl RiskBudget {
    pub fn compute(book: &Book, limits: &RiskLimits, config: &RiskConfig) -> Self {
        let used_risk_pct = if book.equity > 0.0 {
            100.0 * book.open_risk / book.equity
        } else {
            0.0
        };
        let basis = match config.concentration_basis {
            ConcentrationBasis::InvestedValue => book.invested,
            ConcentrationBasis::Equity => book.equity,
        };
        let stage = config.caps.stage(book.open_count);
        let caps = config.caps.caps(stage);

        let sleeves = Sleeve::ALL
            .iter()
            .filter_map(|&sleeve| {
                let cap = caps.sleeve.get(sleeve)?;
                let value_pct = if basis > 0.0 {
                    100.0 * book.sleeve_value(sleeve) / basis
                } else {
                    0.0
                };
                Some((
                    sleeve,
                    SleeveUtilisation {
                        value_pct,
                        cap_pct: 100.0 * cap,
                    },
                ))
            })
            .collect();

        Self {
            used_risk_pct,
            max_risk_pct: limits.max_open_risk_pct,
            base_max_risk_pct: limits.base_open_risk_pct,
            used_positions: book.open_count,
            max_positions: limits.max_positions,
            stage,
            sleeves,
            expansion_active: limits.expansion_active,
            breadth_valve_active: limits.breadth_valve_active,
        }
    }

    pub fn remaining_risk_pct(&self) -> f64 {
        (self.max_risk_pct - self.used_risk_pct).max(0.0)
    }

    pub fn remaining_positions(&self) -> usize {
        self.max_positions.saturating_sub(self.used_positions)
    }
}
