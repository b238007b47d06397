//! Cluster heat check: once a cluster holds enough names, a new entry there
//! must out-rank the cluster's held names by a premium.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatCheckConfig {
    pub enabled: bool,
    /// Held names in a cluster at which the check starts.
    pub cluster_threshold: usize,
    /// Required margin over the held average rank, as a fraction.
    pub premium: f64,
}

impl Default for HeatCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cluster_threshold: 3,
            premium: 0.20,
        }
    }
}

/// Held names in one cluster and their average rank score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterHeat {
    pub held: usize,
    /// `None` when no held name in the cluster was ranked.
    pub average_rank: Option<f64>,
}

/// Why a new entry was held back in a crowded cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatBlock {
    pub cluster: String,
    pub held: usize,
    pub rank: Option<f64>,
    pub required: Option<f64>,
}

/// Aggregate held names per cluster from `(cluster, rank)` pairs.
pub fn cluster_heat<'a>(
    held: impl IntoIterator<Item = (&'a str, Option<f64>)>,
) -> BTreeMap<String, ClusterHeat> {
    let mut sums: BTreeMap<String, (usize, f64, usize)> = BTreeMap::new();
    for (cluster, rank) in held {
        let entry = sums.entry(cluster.to_string()).or_default();
        entry.0 += 1;
        if let Some(rank) = rank.filter(|r| r.is_finite()) {
            entry.1 += rank;
            entry.2 += 1;
        }
    }
    sums.into_iter()
        .map(|(cluster, (held, total, ranked))| {
            let average_rank = (ranked > 0).then(|| total / ranked as f64);
            (cluster, ClusterHeat { held, average_rank })
        })
        .collect()
}

/// Rank scores are higher-is-better. A missing candidate rank is blocked; a
/// missing held average lets the entry through.
pub fn heat_check(
    cluster: Option<&str>,
    rank: Option<f64>,
    heat: &BTreeMap<String, ClusterHeat>,
    config: &HeatCheckConfig,
) -> Option<HeatBlock> {
    if !config.enabled {
        return None;
    }
    let cluster = cluster?;
    let state = heat.get(cluster)?;
    if state.held < config.cluster_threshold {
        return None;
    }
    let rank = rank.filter(|r| r.is_finite());
    let block = |required: Option<f64>| HeatBlock {
        cluster: cluster.to_string(),
        held: state.held,
        rank,
        required,
    };
    let Some(rank) = rank else {
        return Some(block(None));
    };
    let average = state.average_rank?;
    let required = average + config.premium * average.abs();
    (rank < required).then(|| block(Some(required)))
}
