//! The six portfolio risk gates.
//!
//! Every gate is evaluated independently against the candidate plus the
//! existing (ex-hedge) book; a candidate passes risk gating only when all
//! applicable gates pass. Values and limits are reported in percent.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::book::{Book, Exposure};
use super::budget::RiskLimits;
use super::{ConcentrationBasis, RiskConfig};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateKind {
    OpenRisk,
    MaxPositions,
    SleeveCap,
    ClusterCap,
    SectorCap,
    PositionSizeCap,
}

impl GateKind {
    pub const ALL: [GateKind; 6] = [
        GateKind::OpenRisk,
        GateKind::MaxPositions,
        GateKind::SleeveCap,
        GateKind::ClusterCap,
        GateKind::SectorCap,
        GateKind::PositionSizeCap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GateKind::OpenRisk => "OPEN_RISK",
            GateKind::MaxPositions => "MAX_POSITIONS",
            GateKind::SleeveCap => "SLEEVE_CAP",
            GateKind::ClusterCap => "CLUSTER_CAP",
            GateKind::SectorCap => "SECTOR_CAP",
            GateKind::PositionSizeCap => "POSITION_SIZE_CAP",
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: GateKind,
    pub passed: bool,
    pub value: f64,
    pub limit: f64,
    /// False when the gate does not apply (hedge candidate, untagged
    /// cluster or sector). Inapplicable gates always pass.
    pub applicable: bool,
}

impl GateResult {
    fn check(gate: GateKind, value: f64, limit: f64) -> Self {
        Self {
            gate,
            passed: value <= limit,
            value,
            limit,
            applicable: true,
        }
    }

    fn not_applicable(gate: GateKind) -> Self {
        Self {
            gate,
            passed: true,
            value: 0.0,
            limit: 0.0,
            applicable: false,
        }
    }
}

pub fn all_passed(results: &[GateResult]) -> bool {
    results.iter().all(|r| r.passed)
}

pub fn failed_gates(results: &[GateResult]) -> Vec<GateKind> {
    results.iter().filter(|r| !r.passed).map(|r| r.gate).collect()
}

/// Evaluate all six gates for `candidate` against `book`.
pub fn evaluate(
    candidate: &Exposure,
    book: &Book,
    limits: &RiskLimits,
    config: &RiskConfig,
) -> Result<Vec<GateResult>, EngineError> {
    if !(book.equity.is_finite() && book.equity > 0.0) {
        return Err(EngineError::invalid("equity", "equity must be positive"));
    }
    if !(candidate.value.is_finite() && candidate.value >= 0.0) {
        return Err(EngineError::invalid(
            "candidate_value",
            "candidate value must be finite and non-negative",
        ));
    }
    if !candidate.risk.is_finite() {
        return Err(EngineError::invalid("candidate_risk", "candidate risk must be finite"));
    }

    if candidate.sleeve.is_hedge() {
        return Ok(GateKind::ALL
            .iter()
            .map(|&g| GateResult::not_applicable(g))
            .collect());
    }

    let basis = match config.concentration_basis {
        ConcentrationBasis::InvestedValue => book.invested + candidate.value,
        ConcentrationBasis::Equity => book.equity,
    };
    let share = |value: f64| if basis > 0.0 { 100.0 * value / basis } else { 0.0 };
    let stage_count = book.open_count;

    let mut results = Vec::with_capacity(GateKind::ALL.len());

    results.push(GateResult::check(
        GateKind::OpenRisk,
        100.0 * (book.open_risk + candidate.risk.max(0.0)) / book.equity,
        limits.max_open_risk_pct,
    ));

    results.push(GateResult {
        gate: GateKind::MaxPositions,
        passed: book.open_count < limits.max_positions,
        value: book.open_count as f64,
        limit: limits.max_positions as f64,
        applicable: true,
    });

    results.push(match config.caps.sleeve_cap(candidate.sleeve, stage_count) {
        Some(cap) => GateResult::check(
            GateKind::SleeveCap,
            share(book.sleeve_value(candidate.sleeve) + candidate.value),
            100.0 * cap,
        ),
        None => GateResult::not_applicable(GateKind::SleeveCap),
    });

    results.push(match &candidate.cluster {
        Some(cluster) => GateResult::check(
            GateKind::ClusterCap,
            share(book.cluster_value(cluster) + candidate.value),
            100.0 * config.cluster_cap,
        ),
        None => GateResult::not_applicable(GateKind::ClusterCap),
    });

    results.push(match &candidate.sector {
        Some(sector) => GateResult::check(
            GateKind::SectorCap,
            share(book.sector_value(sector) + candidate.value),
            100.0 * config.sector_cap,
        ),
        None => GateResult::not_applicable(GateKind::SectorCap),
    });

    results.push(
        match config.caps.position_cap(candidate.sleeve, stage_count) {
            Some(cap) => GateResult::check(
                GateKind::PositionSizeCap,
                share(candidate.value),
                100.0 * cap,
            ),
            None => GateResult::not_applicable(GateKind::PositionSizeCap),
        },
    );

    for failed in results.iter().filter(|r| !r.passed) {
        debug!(
            symbol = %candidate.symbol,
            gate = %failed.gate,
            value = failed.value,
            limit = failed.limit,
            "Risk gate failed"
        );
    }

    Ok(results)
}
