//! Snapshot sources: the market-data collaborator seen from the runner.
//!
//! A source turns a universe member into an `InstrumentSnapshot`. Failures
//! are returned, never retried; the collector substitutes the documented
//! default.

use std::collections::HashMap;
use thiserror::Error;

use swingdesk_core::domain::{Bar, InstrumentSnapshot, UniverseMember};
use swingdesk_core::technicals::{build_snapshot, TechnicalsConfig};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("no data for '{symbol}'")]
    NotFound { symbol: String },

    #[error("source unavailable for '{symbol}': {reason}")]
    Unavailable { symbol: String, reason: String },
}

/// Market-data collaborator. Implementations must be safe to call from
/// several threads at once.
pub trait SnapshotSource: Send + Sync {
    /// Short identifier used in logs and data-quality flags.
    fn name(&self) -> &str;

    fn fetch(&self, member: &UniverseMember) -> Result<InstrumentSnapshot, SourceError>;

    /// Whether the source can serve requests at all.
    fn is_available(&self) -> bool {
        true
    }
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, member: &UniverseMember) -> Result<InstrumentSnapshot, SourceError> {
        (**self).fetch(member)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

impl<S: SnapshotSource + ?Sized> SnapshotSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, member: &UniverseMember) -> Result<InstrumentSnapshot, SourceError> {
        (**self).fetch(member)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Pre-computed snapshots keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    snapshots: HashMap<String, InstrumentSnapshot>,
}

impl StaticSource {
    pub fn new(snapshots: impl IntoIterator<Item = InstrumentSnapshot>) -> Self {
        Self {
            snapshots: snapshots
                .into_iter()
                .map(|s| (s.symbol.clone(), s))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SnapshotSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(&self, member: &UniverseMember) -> Result<InstrumentSnapshot, SourceError> {
        self.snapshots
            .get(&member.symbol)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                symbol: member.symbol.clone(),
            })
    }
}

/// Daily bar history per symbol; snapshots are computed on fetch.
#[derive(Debug, Clone)]
pub struct BarHistorySource {
    bars: HashMap<String, Vec<Bar>>,
    benchmark: Option<String>,
    config: TechnicalsConfig,
}

impl BarHistorySource {
    pub fn new(bars: HashMap<String, Vec<Bar>>, config: TechnicalsConfig) -> Self {
        Self {
            bars,
            benchmark: None,
            config,
        }
    }

    /// Benchmark symbol used for relative strength.
    pub fn with_benchmark(mut self, symbol: impl Into<String>) -> Self {
        self.benchmark = Some(symbol.into());
        self
    }

    pub fn bars(&self, symbol: &str) -> Option<&[Bar]> {
        self.bars.get(symbol).map(Vec::as_slice)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }
}

impl SnapshotSource for BarHistorySource {
    fn name(&self) -> &str {
        "bars"
    }

    fn fetch(&self, member: &UniverseMember) -> Result<InstrumentSnapshot, SourceError> {
        let bars = self.bars(&member.symbol).ok_or_else(|| SourceError::NotFound {
            symbol: member.symbol.clone(),
        })?;
        let benchmark = self.benchmark.as_deref().and_then(|b| self.bars(b));
        Ok(build_snapshot(member, bars, benchmark, &self.config))
    }
}
