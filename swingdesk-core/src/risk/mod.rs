//! Risk gate engine: portfolio gates, cap schedule, risk budget, pyramid
//! eligibility, cluster heat and re-entry discipline.
//!
//! The hedge sleeve is excluded from every aggregate.

pub mod book;
pub mod budget;
pub mod caps;
pub mod gates;
pub mod heat;
pub mod pyramid;
pub mod reentry;

pub use book::{Book, Exposure};
pub use budget::{BreadthValve, MarketBackdrop, MomentumExpansion, RiskBudget, RiskLimits, SleeveUtilisation};
pub use caps::{CapSchedule, PortfolioStage, SleeveCaps, StageCaps};
pub use gates::{all_passed, evaluate, failed_gates, GateKind, GateResult};
pub use heat::{cluster_heat, heat_check, ClusterHeat, HeatBlock, HeatCheckConfig};
pub use pyramid::{check_pyramid, PyramidBlock, PyramidCheck, PyramidConfig};
pub use reentry::{fast_follower, reentry_block, FastFollower, FastFollowerConfig, ReentryBlock, ReentryConfig};

use serde::{Deserialize, Serialize};

/// Denominator for the concentration gates (sleeve, cluster, sector,
/// position size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConcentrationBasis {
    /// Existing ex-hedge market value plus the candidate. A first position
    /// on an empty book is 100% of this basis.
    #[default]
    InvestedValue,
    /// Account equity.
    Equity,
}

impl ConcentrationBasis {
    /// Denominator for an existing book, before any candidate is added.
    pub fn of(self, book: &Book) -> f64 {
        match self {
            ConcentrationBasis::InvestedValue => book.invested,
            ConcentrationBasis::Equity => book.equity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub concentration_basis: ConcentrationBasis,
    /// Cluster share cap, as a fraction.
    pub cluster_cap: f64,
    pub sector_cap: f64,
    pub caps: CapSchedule,
    pub momentum: MomentumExpansion,
    pub breadth: BreadthValve,
    pub pyramid: PyramidConfig,
    pub reentry: ReentryConfig,
    pub heat: HeatCheckConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            concentration_basis: ConcentrationBasis::default(),
            cluster_cap: 0.20,
            sector_cap: 0.25,
            caps: CapSchedule::default(),
            momentum: MomentumExpansion::default(),
            breadth: BreadthValve::default(),
            pyramid: PyramidConfig::default(),
            reentry: ReentryConfig::default(),
            heat: HeatCheckConfig::default(),
        }
    }
}
