//! Post-scan advisories. Neither changes what was sized.
//!
//! - Priority entries: in a bullish market, the strongest relative-strength
//!   names among new READY/WATCH candidates.
//! - Swap suggestions: a held name worth rotating out, either because its
//!   cluster is near the cap and a better-ranked leader waits there, or
//!   because it lags while a gate-clear READY name is available.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::candidate::{Candidate, ScanStage};
use super::classify::CandidateStatus;
use super::rank::rank_order;
use crate::domain::{InstrumentSnapshot, MarketRegime, OpenPosition};
use crate::risk::{Book, ConcentrationBasis};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub enabled: bool,
    pub count: usize,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    pub enabled: bool,
    /// Share of the cluster cap at which a cluster counts as full.
    pub cap_fraction: f64,
    /// A held name below this R-multiple with a weak status is a laggard.
    pub laggard_max_r: f64,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cap_fraction: 0.90,
            laggard_max_r: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapReason {
    ClusterAtCap {
        cluster: String,
        /// Cluster share of the concentration basis, in percent.
        cluster_pct: f64,
        held_rank: Option<f64>,
        leader_rank: f64,
    },
    Laggard {
        status: Option<CandidateStatus>,
        r_multiple: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapSuggestion {
    pub held: String,
    pub leader: String,
    pub reason: SwapReason,
}

/// Flag the top names by relative strength and return them in order.
pub(crate) fn flag_priority(
    evaluated: &mut [(Candidate, &InstrumentSnapshot)],
    held: &HashMap<&str, &OpenPosition>,
    regime: MarketRegime,
    config: &PriorityConfig,
) -> Vec<String> {
    if !config.enabled || regime != MarketRegime::Bullish {
        return Vec::new();
    }
    let mut ranked: Vec<(f64, usize)> = evaluated
        .iter()
        .enumerate()
        .filter(|(_, (c, _))| {
            !held.contains_key(c.symbol.as_str())
                && matches!(c.status, Some(CandidateStatus::Ready | CandidateStatus::Watch))
        })
        .filter_map(|(i, (_, snap))| snap.relative_strength.filter(|rs| rs.is_finite()).map(|rs| (rs, i)))
        .collect();
    ranked.sort_by(|a, b| {
        rank_order(
            (a.0, evaluated[a.1].0.symbol.as_str()),
            (b.0, evaluated[b.1].0.symbol.as_str()),
        )
    });
    ranked
        .into_iter()
        .take(config.count)
        .map(|(_, i)| {
            let candidate = &mut evaluated[i].0;
            candidate.priority_entry = true;
            candidate.symbol.clone()
        })
        .collect()
}

/// Swap suggestions for held positions against the book as it stood before
/// the scan. At most one per holding; the cluster reason wins.
pub(crate) fn suggest_swaps(
    evaluated: &[(Candidate, &InstrumentSnapshot)],
    positions: &[OpenPosition],
    book: &Book,
    basis: ConcentrationBasis,
    cluster_cap: f64,
    config: &SwapConfig,
) -> Vec<SwapSuggestion> {
    if !config.enabled {
        return Vec::new();
    }
    let by_symbol: HashMap<&str, &(Candidate, &InstrumentSnapshot)> =
        evaluated.iter().map(|e| (e.0.symbol.as_str(), e)).collect();
    let is_held = |symbol: &str| positions.iter().any(|p| p.symbol == symbol);

    let leaders: Vec<&(Candidate, &InstrumentSnapshot)> = evaluated
        .iter()
        .filter(|(c, _)| {
            c.status == Some(CandidateStatus::Ready)
                && c.block.is_none()
                && c.rank_score.is_some()
                && !is_held(&c.symbol)
        })
        .collect();
    if leaders.is_empty() {
        return Vec::new();
    }
    let basis_value = basis.of(book);
    let mut swaps = Vec::new();
    for position in positions.iter().filter(|p| !p.sleeve.is_hedge()) {
        let entry = by_symbol.get(position.symbol.as_str());
        let held_rank = entry.and_then(|(c, _)| c.rank_score);
        let cluster = position
            .cluster
            .clone()
            .or_else(|| entry.and_then(|(_, s)| s.cluster.clone()));

        if let Some(cluster) = cluster {
            let cluster_pct = if basis_value > 0.0 {
                100.0 * book.cluster_value(&cluster) / basis_value
            } else {
                0.0
            };
            if cluster_pct >= 100.0 * config.cap_fraction * cluster_cap {
                let same = leaders
                    .iter()
                    .filter(|(_, s)| s.cluster.as_deref() == Some(cluster.as_str()))
                    .map(|(c, _)| c);
                if let Some(leader) = best_ranked(same) {
                    let leader_rank = leader.rank_score.unwrap_or(f64::MIN);
                    if held_rank.map_or(true, |h| leader_rank > h) {
                        swaps.push(SwapSuggestion {
                            held: position.symbol.clone(),
                            leader: leader.symbol.clone(),
                            reason: SwapReason::ClusterAtCap {
                                cluster,
                                cluster_pct,
                                held_rank,
                                leader_rank,
                            },
                        });
                        continue;
                    }
                }
            }
        }

        let status = entry.and_then(|(c, _)| c.status);
        let weak = matches!(status, None | Some(CandidateStatus::Watch | CandidateStatus::Far));
        let price = entry
            .map(|(_, s)| s.close)
            .filter(|p| p.is_finite())
            .unwrap_or_else(|| position.mark_price());
        let r_multiple = position.r_multiple(price);
        if !(weak && r_multiple.is_finite() && r_multiple < config.laggard_max_r) {
            continue;
        }
        let gate_clear = leaders
            .iter()
            .map(|(c, _)| c)
            .filter(|c| c.stage >= ScanStage::RiskGated);
        if let Some(leader) = best_ranked(gate_clear) {
            swaps.push(SwapSuggestion {
                held: position.symbol.clone(),
                leader: leader.symbol.clone(),
                reason: SwapReason::Laggard { status, r_multiple },
            });
        }
    }
    swaps
}

fn best_ranked<'a>(pool: impl Iterator<Item = &'a Candidate>) -> Option<&'a Candidate> {
    pool.min_by(|a, b| {
        rank_order(
            (a.rank_score.unwrap_or(f64::MIN), a.symbol.as_str()),
            (b.rank_score.unwrap_or(f64::MIN), b.symbol.as_str()),
        )
    })
}
