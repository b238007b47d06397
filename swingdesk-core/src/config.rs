//! Engine-wide configuration: one section per component.

use serde::{Deserialize, Serialize};

use crate::regime::RegimeConfig;
use crate::risk::RiskConfig;
use crate::scan::ScanConfig;
use crate::scoring::ScoringConfig;
use crate::sizing::SizingConfig;
use crate::stops::StopConfig;
use crate::technicals::TechnicalsConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub scan: ScanConfig,
    pub risk: RiskConfig,
    pub sizing: SizingConfig,
    pub stops: StopConfig,
    pub regime: RegimeConfig,
    pub technicals: TechnicalsConfig,
}
