//! Scan pipeline.
//!
//! Per candidate: UNIVERSE → FILTERED → CLASSIFIED → RANKED → RISK_GATED →
//! GUARD_CHECKED → SIZED.
//!
//! The first four stages are independent per instrument and run in parallel.
//! Gating and sizing then walk the ranked list in order against a pro-forma
//! book, so each accepted candidate consumes budget before the next is seen.

pub mod advisory;
pub mod candidate;
pub mod classify;
pub mod filter;
pub mod guard;
pub mod rank;

pub use advisory::{PriorityConfig, SwapConfig, SwapReason, SwapSuggestion};
pub use candidate::{Candidate, CandidateBlock, EntryPlan, EntrySource, ScanStage};
pub use classify::{BufferMode, CandidateStatus, EntryConfig, EntryLevels};
pub use filter::{EarlyBird, EarlyBirdConfig, FilterCheck, FilterConfig};
pub use guard::{AntiChaseConfig, ChaseTier, GuardBlock, GuardOutcome, PullbackConfig, SessionKind};
pub use rank::RankWeights;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::domain::{Account, ExitRecord, InstrumentSnapshot, MarketRegime, OpenPosition};
use crate::error::EngineError;
use crate::fingerprint::fingerprint;
use crate::risk::{
    self, check_pyramid, cluster_heat, fast_follower, heat_check, reentry_block, Book, ClusterHeat,
    Exposure, MarketBackdrop, ReentryBlock, RiskBudget, RiskLimits,
};
use crate::scoring::{self, DualScore};
use crate::sizing::{size_position, CorrelationMatrix, SizingRequest};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub filters: FilterConfig,
    pub entry: EntryConfig,
    pub rank: RankWeights,
    pub anti_chase: AntiChaseConfig,
    pub pullback: PullbackConfig,
    pub priority: PriorityConfig,
    pub swap: SwapConfig,
}

/// Everything one scan reads. Nothing here is mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ScanInput {
    pub as_of: NaiveDate,
    pub snapshots: Vec<InstrumentSnapshot>,
    pub account: Account,
    pub positions: Vec<OpenPosition>,
    pub exits: Vec<ExitRecord>,
    pub correlations: CorrelationMatrix,
    pub regime: MarketRegime,
    pub regime_stable: bool,
    pub backdrop: MarketBackdrop,
}

impl ScanInput {
    pub fn new(as_of: NaiveDate, snapshots: Vec<InstrumentSnapshot>, account: Account) -> Self {
        Self {
            as_of,
            snapshots,
            account,
            positions: Vec::new(),
            exits: Vec::new(),
            correlations: CorrelationMatrix::new(),
            regime: MarketRegime::Unknown,
            regime_stable: false,
            backdrop: MarketBackdrop::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub filtered_out: usize,
    pub by_status: BTreeMap<CandidateStatus, usize>,
    pub by_stage: BTreeMap<ScanStage, usize>,
    pub gate_failed: usize,
    pub guard_blocked: usize,
    pub blocked: usize,
    pub sized: usize,
    pub with_data_issues: usize,
}

impl ScanSummary {
    fn tally(candidates: &[Candidate]) -> Self {
        let mut summary = Self {
            total: candidates.len(),
            ..Self::default()
        };
        for c in candidates {
            *summary.by_stage.entry(c.stage).or_default() += 1;
            if let Some(status) = c.status {
                *summary.by_status.entry(status).or_default() += 1;
            }
            if !c.passed_filters() {
                summary.filtered_out += 1;
            }
            if !risk::all_passed(&c.gates) {
                summary.gate_failed += 1;
            }
            if c.guard.is_some_and(|g| g.is_blocked()) {
                summary.guard_blocked += 1;
            }
            if c.block.is_some() {
                summary.blocked += 1;
            }
            if c.is_tradeable() {
                summary.sized += 1;
            }
            if !c.data_issues.is_empty() {
                summary.with_data_issues += 1;
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub as_of: NaiveDate,
    pub regime: MarketRegime,
    pub regime_stable: bool,
    pub limits: RiskLimits,
    /// Ranked candidates first, then filtered-out ones by symbol.
    pub candidates: Vec<Candidate>,
    pub summary: ScanSummary,
    /// Budget of the book as held before the scan.
    pub budget: RiskBudget,
    /// Budget with every sized candidate added.
    pub pro_forma_budget: RiskBudget,
    /// Priority entries, strongest relative strength first.
    pub priority: Vec<String>,
    pub swaps: Vec<SwapSuggestion>,
    /// blake3 over config and inputs.
    pub fingerprint: String,
}

impl ScanReport {
    pub fn tradeable(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| c.is_tradeable())
    }
}

/// Fraction of non-hedge instruments closing above MA50.
pub fn breadth(snapshots: &[InstrumentSnapshot]) -> Option<f64> {
    let (above, counted) = snapshots
        .iter()
        .filter(|s| !s.sleeve.is_hedge() && s.close.is_finite() && s.ma50.is_finite())
        .fold((0usize, 0usize), |(above, n), s| {
            (above + usize::from(s.close > s.ma50), n + 1)
        });
    (counted > 0).then(|| above as f64 / counted as f64)
}

pub fn run_scan(input: &ScanInput, config: &EngineConfig) -> Result<ScanReport, EngineError> {
    let equity = input.account.equity;
    if !(equity.is_finite() && equity > 0.0) {
        return Err(EngineError::invalid("equity", format!("must be finite and positive, got {equity}")));
    }
    info!(
        as_of = %input.as_of,
        universe = input.snapshots.len(),
        held = input.positions.len(),
        regime = %input.regime,
        "Scan started"
    );

    let fingerprint = fingerprint(&(config, input))?;

    let held: HashMap<&str, &OpenPosition> = input
        .positions
        .iter()
        .map(|p| (p.symbol.as_str(), p))
        .collect();
    let mut evaluated: Vec<(Candidate, &InstrumentSnapshot)> = input
        .snapshots
        .par_iter()
        .map(|snap| {
            let is_held = held.contains_key(snap.symbol.as_str());
            (evaluate(snap, input, config, is_held), snap)
        })
        .collect();
    evaluated.sort_by(|(a, _), (b, _)| match (a.rank_score, b.rank_score) {
        (Some(x), Some(y)) => rank::rank_order((x, a.symbol.as_str()), (y, b.symbol.as_str())),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.symbol.cmp(&b.symbol),
    });

    let backdrop = MarketBackdrop {
        breadth: input.backdrop.breadth.or_else(|| breadth(&input.snapshots)),
        ..input.backdrop
    };
    let limits = RiskLimits::resolve(&input.account.profile, &config.risk, &backdrop);
    let held_book = Book::new(equity, &input.positions);
    let mut book = held_book.clone();
    let budget = RiskBudget::compute(&book, &limits, &config.risk);

    let heat = held_cluster_heat(&evaluated, &input.positions);
    apply_heat_check(&mut evaluated, &held, &heat, config);
    let duplicates = duplicate_underlyings(&evaluated, &held);

    for (candidate, snap) in evaluated.iter_mut() {
        // Held names get an add-on check whatever their entry status.
        if let Some(position) = held.get(candidate.symbol.as_str()) {
            candidate.block = Some(CandidateBlock::AlreadyHeld);
            if snap.close.is_finite() {
                let atr = snap.atr.is_finite().then_some(snap.atr);
                candidate.pyramid = Some(check_pyramid(
                    position,
                    snap.close,
                    atr,
                    input.regime,
                    &config.risk.pyramid,
                ));
            }
            continue;
        }
        let Some(plan) = candidate.entry else {
            continue;
        };

        match reentry_block(&candidate.symbol, &input.exits, input.as_of, &config.risk.reentry) {
            Some(ReentryBlock::Whipsaw { until }) => {
                debug!(symbol = %candidate.symbol, %until, "Whipsaw blocked re-entry");
                candidate.block = Some(CandidateBlock::Whipsaw { until });
                continue;
            }
            // A fast follower skips the profit cooldown.
            Some(ReentryBlock::Cooldown { until }) if candidate.fast_follower.is_none() => {
                debug!(symbol = %candidate.symbol, %until, "Re-entry cooling down");
                candidate.block = Some(CandidateBlock::ReentryCooldown { until });
                continue;
            }
            _ => {}
        }
        if let Some(kept) = duplicates.get(candidate.symbol.as_str()) {
            candidate.block = Some(CandidateBlock::DuplicateUnderlying { kept: kept.clone() });
            continue;
        }

        let request = SizingRequest {
            equity,
            risk_pct: input.account.profile.risk_per_trade_pct,
            entry: plan.entry,
            stop: plan.stop,
            fx: snap.fx(),
            value_cap: config.risk.caps.position_cap(snap.sleeve, book.open_count),
            correlation: input
                .correlations
                .max_against(&candidate.symbol, book.symbols.iter().map(String::as_str))
                .map(|(_, r)| r),
        };
        let sizing = match size_position(&request, &config.sizing) {
            Ok(sizing) if sizing.shares > 0.0 => sizing,
            Ok(_) => {
                candidate.block = Some(CandidateBlock::SizingRejected {
                    reason: "risk budget buys zero shares".to_string(),
                });
                continue;
            }
            Err(err) => {
                candidate.block = Some(CandidateBlock::SizingRejected {
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let exposure = Exposure {
            symbol: candidate.symbol.clone(),
            sleeve: snap.sleeve,
            cluster: snap.cluster.clone(),
            sector: snap.sector.clone(),
            value: sizing.position_value,
            risk: sizing.actual_risk,
        };
        candidate.gates = risk::evaluate(&exposure, &book, &limits, &config.risk)?;
        candidate.sizing = Some(sizing);
        if !risk::all_passed(&candidate.gates) {
            continue;
        }
        candidate.stage = ScanStage::RiskGated;

        if plan.source != EntrySource::Pullback {
            let outcome = guard::anti_chase(
                snap.close,
                plan.entry,
                snap.atr,
                SessionKind::for_date(input.as_of),
                &config.scan.anti_chase,
            );
            candidate.guard = Some(outcome);
            if outcome.is_blocked() {
                debug!(symbol = %candidate.symbol, guard = ?outcome, "Anti-chase blocked entry");
                continue;
            }
        }
        candidate.stage = ScanStage::GuardChecked;

        book.add(&exposure);
        candidate.stage = ScanStage::Sized;
    }

    let priority = advisory::flag_priority(&mut evaluated, &held, input.regime, &config.scan.priority);
    let swaps = advisory::suggest_swaps(
        &evaluated,
        &input.positions,
        &held_book,
        config.risk.concentration_basis,
        config.risk.cluster_cap,
        &config.scan.swap,
    );
    if !swaps.is_empty() {
        debug!(swaps = swaps.len(), "Swap suggestions");
    }

    let candidates: Vec<Candidate> = evaluated.into_iter().map(|(c, _)| c).collect();
    let summary = ScanSummary::tally(&candidates);
    let pro_forma_budget = RiskBudget::compute(&book, &limits, &config.risk);

    info!(
        candidates = summary.total,
        filtered_out = summary.filtered_out,
        sized = summary.sized,
        fingerprint = %fingerprint,
        "Scan finished"
    );

    Ok(ScanReport {
        as_of: input.as_of,
        regime: input.regime,
        regime_stable: input.regime_stable,
        limits,
        candidates,
        summary,
        budget,
        pro_forma_budget,
        priority,
        swaps,
        fingerprint,
    })
}

/// Filter, classify, score and rank one instrument.
fn evaluate(snap: &InstrumentSnapshot, input: &ScanInput, config: &EngineConfig, held: bool) -> Candidate {
    let mut candidate = Candidate::new(snap.symbol.clone(), snap.sleeve);
    candidate.data_issues = snap.data_issues.clone();

    candidate.filters = filter::run_filters(snap, &config.scan.filters);
    if !filter::all_passed(&candidate.filters) && !held && filter::passed_except_trend(&candidate.filters) {
        let regime = snap.regime.unwrap_or(input.regime);
        candidate.early_bird = filter::early_bird(snap, regime, &config.scan.filters.early_bird);
    }
    if !filter::all_passed(&candidate.filters) && candidate.early_bird.is_none() {
        let failed: Vec<&str> = candidate
            .filters
            .iter()
            .filter(|f| !f.passed())
            .map(FilterCheck::name)
            .collect();
        debug!(symbol = %snap.symbol, ?failed, "Filtered out");
        return candidate;
    }
    if let Some(bird) = candidate.early_bird {
        debug!(symbol = %snap.symbol, range_position = bird.range_position, "Early bird waived trend filters");
    }
    candidate.stage = ScanStage::Filtered;

    let (mut status, levels) = classify::classify(snap, &config.scan.entry);
    if !held {
        candidate.fast_follower =
            fast_follower(&snap.symbol, &input.exits, input.as_of, snap, &config.risk.reentry.fast_follower);
        if candidate.fast_follower.is_some() {
            debug!(symbol = %snap.symbol, was = ?status, "Fast follower promoted to READY");
            status = CandidateStatus::Ready;
        }
    }
    candidate.status = Some(status);
    candidate.levels = Some(levels);
    candidate.stage = ScanStage::Classified;

    candidate.score = Some(score_in_regime(snap, input, config));
    candidate.rank_score = Some(rank::rank_score(snap, status, &config.scan.rank));
    candidate.stage = ScanStage::Ranked;

    match status {
        CandidateStatus::Ready => {
            let source = if candidate.fast_follower.is_some() {
                EntrySource::FastFollower
            } else {
                EntrySource::Breakout
            };
            candidate.entry = Some(EntryPlan {
                entry: levels.trigger,
                stop: levels.initial_stop,
                source,
            });
        }
        CandidateStatus::WaitPullback => {
            let outcome = guard::pullback(snap, &config.scan.pullback);
            if let GuardOutcome::PullbackTriggered { entry, stop } = outcome {
                candidate.entry = Some(EntryPlan {
                    entry,
                    stop,
                    source: EntrySource::Pullback,
                });
            }
            candidate.guard = Some(outcome);
        }
        CandidateStatus::Watch | CandidateStatus::Far => {}
    }
    candidate
}

/// Score with the scan's regime when the snapshot carries none.
fn score_in_regime(snap: &InstrumentSnapshot, input: &ScanInput, config: &EngineConfig) -> DualScore {
    let cluster_cap = config.risk.cluster_cap;
    if snap.regime.is_some() {
        return scoring::score(snap, &config.scoring, cluster_cap);
    }
    let mut stamped = snap.clone();
    stamped.regime = Some(input.regime);
    stamped.regime_stable = Some(input.regime_stable);
    scoring::score(&stamped, &config.scoring, cluster_cap)
}

/// Held names per cluster, ranked by this scan. The position's own cluster
/// wins over the snapshot's.
fn held_cluster_heat(
    evaluated: &[(Candidate, &InstrumentSnapshot)],
    positions: &[OpenPosition],
) -> BTreeMap<String, ClusterHeat> {
    let by_symbol: HashMap<&str, &(Candidate, &InstrumentSnapshot)> =
        evaluated.iter().map(|e| (e.0.symbol.as_str(), e)).collect();
    cluster_heat(positions.iter().filter_map(|p| {
        let found = by_symbol.get(p.symbol.as_str());
        let cluster = p
            .cluster
            .as_deref()
            .or_else(|| found.and_then(|(_, s)| s.cluster.as_deref()))?;
        Some((cluster, found.and_then(|(c, _)| c.rank_score)))
    }))
}

/// Hold back new READY/WATCH names in crowded clusters that do not out-rank
/// what is already held there.
fn apply_heat_check(
    evaluated: &mut [(Candidate, &InstrumentSnapshot)],
    held: &HashMap<&str, &OpenPosition>,
    heat: &BTreeMap<String, ClusterHeat>,
    config: &EngineConfig,
) {
    for (candidate, snap) in evaluated.iter_mut() {
        if held.contains_key(candidate.symbol.as_str()) {
            continue;
        }
        let live = candidate.entry.is_some()
            || matches!(candidate.status, Some(CandidateStatus::Ready | CandidateStatus::Watch));
        if !live {
            continue;
        }
        let Some(block) = heat_check(snap.cluster.as_deref(), candidate.rank_score, heat, &config.risk.heat) else {
            continue;
        };
        debug!(symbol = %candidate.symbol, cluster = %block.cluster, held = block.held, "Heat check blocked entry");
        if candidate.status == Some(CandidateStatus::Ready) {
            candidate.status = Some(CandidateStatus::Watch);
        }
        candidate.entry = None;
        candidate.block = Some(CandidateBlock::HeatCheck(block));
    }
}

/// For each underlying shared by several actionable candidates, map every
/// loser to the kept symbol. Best = sleeve preference, then rank, then symbol.
fn duplicate_underlyings(
    evaluated: &[(Candidate, &InstrumentSnapshot)],
    held: &HashMap<&str, &OpenPosition>,
) -> HashMap<String, String> {
    let mut groups: BTreeMap<&str, Vec<&Candidate>> = BTreeMap::new();
    for (candidate, snap) in evaluated {
        if candidate.entry.is_none() || held.contains_key(candidate.symbol.as_str()) {
            continue;
        }
        if let Some(underlying) = snap.underlying.as_deref() {
            groups.entry(underlying).or_default().push(candidate);
        }
    }

    let mut losers = HashMap::new();
    for (_, mut group) in groups {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| {
            b.sleeve
                .preference()
                .cmp(&a.sleeve.preference())
                .then_with(|| {
                    rank::rank_order(
                        (a.rank_score.unwrap_or(0.0), a.symbol.as_str()),
                        (b.rank_score.unwrap_or(0.0), b.symbol.as_str()),
                    )
                })
        });
        let kept = group[0].symbol.clone();
        for loser in &group[1..] {
            losers.insert(loser.symbol.clone(), kept.clone());
        }
    }
    losers
}
