//! Fan-out/fan-in snapshot collection.
//!
//! Every member is fetched independently on the rayon pool. A failed fetch
//! becomes the documented all-missing snapshot flagged `FETCH_FAILED`; the
//! batch never aborts. Output order follows the universe.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use swingdesk_core::domain::{DataIssue, InstrumentSnapshot, MarketRegime, UniverseMember};

use crate::source::SnapshotSource;

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub snapshots: Vec<InstrumentSnapshot>,
    /// Symbols whose fetch failed and were substituted.
    pub substituted: Vec<String>,
}

impl Collection {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Fetch every member. Universe tags (sleeve, cluster, sector, underlying)
/// are authoritative and overwrite whatever the source reported.
pub fn collect_universe<S: SnapshotSource + ?Sized>(
    source: &S,
    members: &[UniverseMember],
) -> Collection {
    let name = source.name().to_string();
    let results: Vec<(InstrumentSnapshot, bool)> = members
        .par_iter()
        .map(|member| match source.fetch(member) {
            Ok(mut snap) => {
                stamp_member(&mut snap, member);
                (snap, false)
            }
            Err(e) => {
                warn!(
                    symbol = %member.symbol,
                    source = %name,
                    error = %e,
                    "Fetch failed; substituting missing snapshot"
                );
                let issue = DataIssue::FetchFailed {
                    source: name.clone(),
                    reason: e.to_string(),
                };
                (InstrumentSnapshot::missing(member, issue), true)
            }
        })
        .collect();

    let substituted: Vec<String> = results
        .iter()
        .filter(|(_, failed)| *failed)
        .map(|(snap, _)| snap.symbol.clone())
        .collect();
    let snapshots: Vec<InstrumentSnapshot> = results.into_iter().map(|(s, _)| s).collect();

    info!(
        source = %name,
        members = members.len(),
        substituted = substituted.len(),
        "Collected universe snapshots"
    );

    Collection {
        snapshots,
        substituted,
    }
}

fn stamp_member(snap: &mut InstrumentSnapshot, member: &UniverseMember) {
    snap.symbol = member.symbol.clone();
    snap.sleeve = member.sleeve;
    snap.cluster = member.cluster.clone();
    snap.super_cluster = member.super_cluster.clone();
    snap.sector = member.sector.clone();
    snap.underlying = member.underlying.clone();
}

/// Fill the market regime on snapshots that do not carry one.
pub fn stamp_regime(snapshots: &mut [InstrumentSnapshot], regime: MarketRegime, stable: bool) {
    for snap in snapshots.iter_mut() {
        if snap.regime.is_none() {
            snap.regime = Some(regime);
        }
        if snap.regime_stable.is_none() {
            snap.regime_stable = Some(stable);
        }
    }
}
