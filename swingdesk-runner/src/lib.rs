//! SwingDesk Runner: caller-side orchestration around `swingdesk-core`.
//!
//! This crate provides:
//! - `DeskConfig`, loaded from TOML, with a content hash
//! - The `SnapshotSource` seam and a read-through TTL cache with an injected clock
//! - Rayon fan-out snapshot collection with default substitution on failure
//! - CSV/JSON/TOML loading of universe, positions, account, exits and market data
//! - Scan, stop review and risk budget runs

pub mod cache;
pub mod collect;
pub mod config;
pub mod loader;
pub mod runner;
pub mod source;

pub use cache::{CacheStats, Clock, DeskSource, ManualClock, ReadThroughCache, SystemClock};
pub use collect::{collect_universe, stamp_regime, Collection};
pub use config::{BenchmarkConfig, CollectionConfig, ConfigError, ConfigHash, DeskConfig};
pub use loader::{
    load_account, load_bars, load_correlations, load_exits, load_positions, load_snapshots,
    load_universe, write_positions, LoadError,
};
pub use runner::{
    apply_reviews, assess_regime, contexts_from_bars, contexts_from_snapshots, review_stops,
    risk_budget, run_scan, DeskInputs, DeskScan, RegimeAssessment,
};
pub use source::{BarHistorySource, SnapshotSource, SourceError, StaticSource};
