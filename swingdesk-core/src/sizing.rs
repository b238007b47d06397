//! Position sizer: fixed-fractional risk sizing with a value cap, a
//! correlation scalar, and a final guard that sized risk never exceeds the
//! risk budget.
//!
//! # Formula
//! ```text
//! risk_cash      = equity · risk_pct / 100
//! risk_per_share = (entry − stop) · fx
//! shares         = floor_inc(risk_cash / risk_per_share)
//! shares         = min(shares, floor_inc(equity · value_cap / (entry · fx)))
//! shares         = floor_inc(shares · correlation_scalar)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationTier {
    pub min_correlation: f64,
    pub scalar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Minimum tradable increment (1.0 = whole shares).
    pub increment: f64,
    /// Checked in order; first tier whose threshold is met applies.
    pub correlation_tiers: Vec<CorrelationTier>,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            increment: 1.0,
            correlation_tiers: vec![
                CorrelationTier {
                    min_correlation: 0.93,
                    scalar: 0.25,
                },
                CorrelationTier {
                    min_correlation: 0.85,
                    scalar: 0.50,
                },
                CorrelationTier {
                    min_correlation: 0.75,
                    scalar: 0.75,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingRequest {
    pub equity: f64,
    pub risk_pct: f64,
    pub entry: f64,
    pub stop: f64,
    /// Instrument currency to account currency.
    pub fx: f64,
    /// Max position value as a fraction of equity.
    pub value_cap: Option<f64>,
    /// Correlation to the most-correlated open position.
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingResult {
    pub shares: f64,
    /// Shares before the correlation scalar.
    pub base_shares: f64,
    pub risk_cash: f64,
    pub risk_per_share: f64,
    pub position_value: f64,
    pub actual_risk: f64,
    pub correlation_scalar: f64,
    pub capped_by_value: bool,
}

/// Largest multiple of `increment` not above `x`. Never rounds up.
pub fn floor_to_increment(x: f64, increment: f64) -> f64 {
    if !(x.is_finite() && x > 0.0 && increment > 0.0) {
        return 0.0;
    }
    let steps = (x / increment).floor();
    let mut value = steps * increment;
    if value > x {
        value = (steps - 1.0).max(0.0) * increment;
    }
    value
}

pub fn correlation_scalar(correlation: Option<f64>, tiers: &[CorrelationTier]) -> f64 {
    let Some(r) = correlation.filter(|r| r.is_finite()) else {
        return 1.0;
    };
    tiers
        .iter()
        .find(|t| r >= t.min_correlation)
        .map_or(1.0, |t| t.scalar.clamp(0.0, 1.0))
}

/// Scale `base` shares, floored to the increment. Never exceeds `base`.
pub fn apply_scalar(base: f64, scalar: f64, increment: f64) -> f64 {
    floor_to_increment(base * scalar.clamp(0.0, 1.0), increment).min(base)
}

pub fn size_position(req: &SizingRequest, config: &SizingConfig) -> Result<SizingResult, EngineError> {
    for (field, value) in [
        ("equity", req.equity),
        ("risk_pct", req.risk_pct),
        ("entry", req.entry),
        ("stop", req.stop),
        ("fx", req.fx),
        ("increment", config.increment),
    ] {
        if !(value.is_finite() && value > 0.0) {
            return Err(EngineError::invalid(field, format!("must be finite and positive, got {value}")));
        }
    }
    if req.stop >= req.entry {
        return Err(EngineError::invalid(
            "stop",
            format!("stop {} must be below entry {}", req.stop, req.entry),
        ));
    }

    let inc = config.increment;
    let risk_cash = req.equity * req.risk_pct / 100.0;
    let risk_per_share = (req.entry - req.stop) * req.fx;

    let mut base = floor_to_increment(risk_cash / risk_per_share, inc);
    let mut capped_by_value = false;
    if let Some(cap) = req.value_cap.filter(|c| c.is_finite() && *c > 0.0) {
        let max_shares = floor_to_increment(req.equity * cap / (req.entry * req.fx), inc);
        if max_shares < base {
            base = max_shares;
            capped_by_value = true;
        }
    }

    let scalar = correlation_scalar(req.correlation, &config.correlation_tiers);
    let mut shares = apply_scalar(base, scalar, inc);
    while shares > 0.0 && shares * risk_per_share > risk_cash {
        shares = (shares - inc).max(0.0);
    }

    Ok(SizingResult {
        shares,
        base_shares: base,
        risk_cash,
        risk_per_share,
        position_value: shares * req.entry * req.fx,
        actual_risk: shares * risk_per_share,
        correlation_scalar: scalar,
        capped_by_value,
    })
}

/// Symmetric pairwise correlations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pairs: BTreeMap<String, BTreeMap<String, f64>>,
}

impl CorrelationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    fn key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn insert(&mut self, a: &str, b: &str, correlation: f64) {
        let (lo, hi) = Self::key(a, b);
        self.pairs
            .entry(lo.to_string())
            .or_default()
            .insert(hi.to_string(), correlation);
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let (lo, hi) = Self::key(a, b);
        self.pairs.get(lo)?.get(hi).copied()
    }

    /// Highest correlation between `symbol` and any of `others`, skipping
    /// `symbol` itself.
    pub fn max_against<'a>(
        &self,
        symbol: &str,
        others: impl IntoIterator<Item = &'a str>,
    ) -> Option<(String, f64)> {
        others
            .into_iter()
            .filter(|other| *other != symbol)
            .filter_map(|other| self.get(symbol, other).map(|r| (other, r)))
            .filter(|(_, r)| r.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(other, r)| (other.to_string(), r))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
