//! Per-instrument scan record.

use chrono::NaiveDate;
use serde::Serialize;

use super::classify::{CandidateStatus, EntryLevels};
use super::filter::{EarlyBird, FilterCheck};
use super::guard::GuardOutcome;
use crate::domain::{DataIssue, Sleeve};
use crate::risk::{FastFollower, GateResult, HeatBlock, PyramidCheck};
use crate::scoring::DualScore;
use crate::sizing::SizingResult;

/// Furthest pipeline stage a candidate cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStage {
    Universe,
    Filtered,
    Classified,
    Ranked,
    RiskGated,
    GuardChecked,
    Sized,
}

/// Why an otherwise actionable candidate was not gated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateBlock {
    AlreadyHeld,
    Whipsaw { until: NaiveDate },
    ReentryCooldown { until: NaiveDate },
    /// Another instrument on the same underlying was preferred.
    DuplicateUnderlying { kept: String },
    /// Crowded cluster and the rank falls short of the premium.
    HeatCheck(HeatBlock),
    SizingRejected { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntrySource {
    Breakout,
    Pullback,
    /// Re-entry after a stop-out, at the reclaimed high.
    FastFollower,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntryPlan {
    pub entry: f64,
    pub stop: f64,
    pub source: EntrySource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub symbol: String,
    pub sleeve: Sleeve,
    pub stage: ScanStage,
    pub filters: Vec<FilterCheck>,
    pub status: Option<CandidateStatus>,
    pub levels: Option<EntryLevels>,
    /// Set once the candidate is actionable (READY, or a triggered pullback).
    pub entry: Option<EntryPlan>,
    pub rank_score: Option<f64>,
    pub score: Option<DualScore>,
    pub block: Option<CandidateBlock>,
    /// Add-on eligibility when the symbol is already held.
    pub pyramid: Option<PyramidCheck>,
    pub gates: Vec<GateResult>,
    pub guard: Option<GuardOutcome>,
    pub sizing: Option<SizingResult>,
    pub data_issues: Vec<DataIssue>,
    /// Set when the trend filters were waived for an early-bird setup.
    pub early_bird: Option<EarlyBird>,
    pub fast_follower: Option<FastFollower>,
    /// Among the top relative-strength names in a bullish market.
    pub priority_entry: bool,
}

impl Candidate {
    pub(crate) fn new(symbol: String, sleeve: Sleeve) -> Self {
        Self {
            symbol,
            sleeve,
            stage: ScanStage::Universe,
            filters: Vec::new(),
            status: None,
            levels: None,
            entry: None,
            rank_score: None,
            score: None,
            block: None,
            pyramid: None,
            gates: Vec::new(),
            guard: None,
            sizing: None,
            data_issues: Vec::new(),
            early_bird: None,
            fast_follower: None,
            priority_entry: false,
        }
    }

    pub fn passed_filters(&self) -> bool {
        self.stage >= ScanStage::Filtered
    }

    /// Sized with a non-zero share count.
    pub fn is_tradeable(&self) -> bool {
        self.stage == ScanStage::Sized
    }
}
