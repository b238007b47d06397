//! Held-position advisories. Informational only; nothing here moves a stop.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::OpenPosition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub laggard_days: i64,
    /// Loss from entry, in percent.
    pub laggard_loss_pct: f64,
    /// Close above MA20, in percent.
    pub climax_extension_pct: f64,
    pub climax_vol_ratio: f64,
    pub trim_fraction: f64,
    pub climax_tighten_atr: f64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            laggard_days: 10,
            laggard_loss_pct: 2.0,
            climax_extension_pct: 18.0,
            climax_vol_ratio: 3.0,
            trim_fraction: 0.5,
            climax_tighten_atr: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Advisory {
    StopHit {
        close: f64,
        stop: f64,
    },
    Laggard {
        days_held: i64,
        loss_pct: f64,
    },
    Climax {
        extension_pct: f64,
        vol_ratio: f64,
        trim_fraction: f64,
        /// Optional alternative to trimming: tighten to this level.
        tighten_to: Option<f64>,
    },
}

/// Market context an advisory pass needs beyond the position itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvisoryInput {
    pub price: f64,
    pub as_of: NaiveDate,
    pub atr: Option<f64>,
    pub ma20: Option<f64>,
    pub vol_ratio: Option<f64>,
}

pub fn advise(position: &OpenPosition, input: &AdvisoryInput, config: &AdvisoryConfig) -> Vec<Advisory> {
    let mut out = Vec::new();
    let price = input.price;

    if price <= position.current_stop {
        out.push(Advisory::StopHit {
            close: price,
            stop: position.current_stop,
        });
    }

    let days_held = (input.as_of - position.entry_date).num_days();
    if position.entry_price > 0.0 {
        let loss_pct = 100.0 * (position.entry_price - price) / position.entry_price;
        if days_held >= config.laggard_days && loss_pct >= config.laggard_loss_pct {
            out.push(Advisory::Laggard { days_held, loss_pct });
        }
    }

    if let (Some(ma20), Some(vol_ratio)) = (
        input.ma20.filter(|m| m.is_finite() && *m > 0.0),
        input.vol_ratio.filter(|v| v.is_finite()),
    ) {
        let extension_pct = 100.0 * (price / ma20 - 1.0);
        if extension_pct >= config.climax_extension_pct && vol_ratio >= config.climax_vol_ratio {
            let tighten_to = input
                .atr
                .map(|atr| (price - config.climax_tighten_atr * atr).max(position.current_stop));
            out.push(Advisory::Climax {
                extension_pct,
                vol_ratio,
                trim_fraction: config.trim_fraction,
                tighten_to,
            });
        }
    }

    out
}
