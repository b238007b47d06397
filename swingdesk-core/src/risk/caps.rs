//! Sleeve and per-position caps, tightening as the book fills up.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Sleeve;

/// Portfolio maturity by number of open ex-hedge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortfolioStage {
    Building,
    MidStage,
    Mature,
}

impl fmt::Display for PortfolioStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortfolioStage::Building => "BUILDING",
            PortfolioStage::MidStage => "MID_STAGE",
            PortfolioStage::Mature => "MATURE",
        })
    }
}

/// One cap per non-hedge sleeve, as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleeveCaps {
    pub etf_core: f64,
    pub stock_core: f64,
    pub stock_high_risk: f64,
}

impl SleeveCaps {
    /// `None` for the hedge sleeve, which carries no cap.
    pub fn get(&self, sleeve: Sleeve) -> Option<f64> {
        match sleeve {
            Sleeve::EtfCore => Some(self.etf_core),
            Sleeve::StockCore => Some(self.stock_core),
            Sleeve::StockHighRisk => Some(self.stock_high_risk),
            Sleeve::Hedge => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageCaps {
    /// Max single-position share of the concentration basis.
    pub position: SleeveCaps,
    /// Max whole-sleeve share of the concentration basis.
    pub sleeve: SleeveCaps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapSchedule {
    pub mid_stage_at: usize,
    pub mature_at: usize,
    pub building: StageCaps,
    pub mid_stage: StageCaps,
    pub mature: StageCaps,
}

impl Default for CapSchedule {
    fn default() -> Self {
        Self {
            mid_stage_at: 5,
            mature_at: 8,
            building: StageCaps {
                position: SleeveCaps {
                    etf_core: 0.20,
                    stock_core: 0.18,
                    stock_high_risk: 0.12,
                },
                sleeve: SleeveCaps {
                    etf_core: 0.80,
                    stock_core: 0.80,
                    stock_high_risk: 0.40,
                },
            },
            mid_stage: StageCaps {
                position: SleeveCaps {
                    etf_core: 0.18,
                    stock_core: 0.15,
                    stock_high_risk: 0.10,
                },
                sleeve: SleeveCaps {
                    etf_core: 0.60,
                    stock_core: 0.70,
                    stock_high_risk: 0.30,
                },
            },
            mature: StageCaps {
                position: SleeveCaps {
                    etf_core: 0.15,
                    stock_core: 0.12,
                    stock_high_risk: 0.08,
                },
                sleeve: SleeveCaps {
                    etf_core: 0.50,
                    stock_core: 0.60,
                    stock_high_risk: 0.25,
                },
            },
        }
    }
}

impl CapSchedule {
    pub fn stage(&self, open_count: usize) -> PortfolioStage {
        if open_count >= self.mature_at {
            PortfolioStage::Mature
        } else if open_count >= self.mid_stage_at {
            PortfolioStage::MidStage
        } else {
            PortfolioStage::Building
        }
    }

    pub fn caps(&self, stage: PortfolioStage) -> &StageCaps {
        match stage {
            PortfolioStage::Building => &self.building,
            PortfolioStage::MidStage => &self.mid_stage,
            PortfolioStage::Mature => &self.mature,
        }
    }

    pub fn position_cap(&self, sleeve: Sleeve, open_count: usize) -> Option<f64> {
        self.caps(self.stage(open_count)).position.get(sleeve)
    }

    pub fn sleeve_cap(&self, sleeve: Sleeve, open_count: usize) -> Option<f64> {
        self.caps(self.stage(open_count)).sleeve.get(sleeve)
    }
}
