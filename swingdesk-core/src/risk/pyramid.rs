//! Pyramid (add-on) eligibility for held positions.

use serde::{Deserialize, Serialize};

use crate::domain::{MarketRegime, OpenPosition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    pub max_adds: u32,
    /// R-multiple step per add: add n needs entry + n·step·initial risk.
    pub add_step_r: f64,
    /// ATR multiple above entry required for add n (index n−1).
    pub atr_levels: Vec<f64>,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            max_adds: 2,
            add_step_r: 1.0,
            atr_levels: vec![0.5, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PyramidBlock {
    MaxAddsReached { adds_taken: u32 },
    HedgeSleeve,
    BearishRegime,
    BelowRTrigger { required: f64 },
    BelowAtrTrigger { required: f64 },
    NoInitialRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidCheck {
    pub symbol: String,
    /// 1-based number of the add being considered.
    pub add_number: u32,
    pub eligible: bool,
    pub r_trigger: Option<f64>,
    pub atr_trigger: Option<f64>,
    pub blocks: Vec<PyramidBlock>,
}

pub fn check_pyramid(
    position: &OpenPosition,
    price: f64,
    atr: Option<f64>,
    regime: MarketRegime,
    config: &PyramidConfig,
) -> PyramidCheck {
    let add_number = position.adds_taken + 1;
    let mut blocks = Vec::new();

    if position.adds_taken >= config.max_adds {
        blocks.push(PyramidBlock::MaxAddsReached {
            adds_taken: position.adds_taken,
        });
    }
    if position.sleeve.is_hedge() {
        blocks.push(PyramidBlock::HedgeSleeve);
    }
    if regime == MarketRegime::Bearish {
        blocks.push(PyramidBlock::BearishRegime);
    }

    let r_trigger = (position.initial_risk > 0.0).then(|| {
        position.entry_price + f64::from(add_number) * config.add_step_r * position.initial_risk
    });
    match r_trigger {
        Some(required) if price < required => {
            blocks.push(PyramidBlock::BelowRTrigger { required });
        }
        Some(_) => {}
        None => blocks.push(PyramidBlock::NoInitialRisk),
    }

    let atr_trigger = atr
        .filter(|a| a.is_finite() && *a > 0.0)
        .zip(config.atr_levels.get(add_number as usize - 1))
        .map(|(atr, level)| position.entry_price + level * atr);
    if let Some(required) = atr_trigger {
        if price < required {
            blocks.push(PyramidBlock::BelowAtrTrigger { required });
        }
    }

    PyramidCheck {
        symbol: position.symbol.clone(),
        add_number,
        eligible: blocks.is_empty(),
        r_trigger,
        atr_trigger,
        blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sleeve;
    use chrono::NaiveDate;

    fn position() -> OpenPosition {
        OpenPosition::new(
            "MSFT",
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            100.0,
            50.0,
            95.0,
        )
    }

    #[test]
    fn first_add_at_one_r() {
        let cfg = PyramidConfig::default();
        let check = check_pyramid(&position(), 105.0, Some(4.0), MarketRegime::Bullish, &cfg);
        assert!(check.eligible, "{:?}", check.blocks);
        assert_eq!(check.add_number, 1);
        assert_eq!(check.r_trigger, Some(105.0));
        assert_eq!(check.atr_trigger, Some(102.0));
    }

    #[test]
    fn below_r_trigger_blocks() {
        let cfg = PyramidConfig::default();
        let check = check_pyramid(&position(), 104.0, None, MarketRegime::Bullish, &cfg);
        assert!(!check.eligible);
        assert_eq!(check.blocks, vec![PyramidBlock::BelowRTrigger { required: 105.0 }]);
        assert_eq!(check.atr_trigger, None);
    }

    #[test]
    fn second_add_needs_both_triggers() {
        let mut p = position();
        p.adds_taken = 1;
        let cfg = PyramidConfig::default();
        // R trigger 110, ATR trigger 100 + 1.0·12 = 112
        let check = check_pyramid(&p, 111.0, Some(12.0), MarketRegime::Bullish, &cfg);
        assert_eq!(check.blocks, vec![PyramidBlock::BelowAtrTrigger { required: 112.0 }]);
    }

    #[test]
    fn max_adds_hedge_and_bearish_block() {
        let mut p = position();
        p.adds_taken = 2;
        p.sleeve = Sleeve::Hedge;
        let check = check_pyramid(&p, 200.0, None, MarketRegime::Bearish, &PyramidConfig::default());
        assert!(!check.eligible);
        assert!(check.blocks.contains(&PyramidBlock::MaxAddsReached { adds_taken: 2 }));
        assert!(check.blocks.contains(&PyramidBlock::HedgeSleeve));
        assert!(check.blocks.contains(&PyramidBlock::BearishRegime));
    }
}
