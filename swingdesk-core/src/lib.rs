//! SwingDesk core: the swing-trading rules engine.
//!
//! - Regime classifier (benchmark vs. MA200, stability, dual benchmark)
//! - Dual-quality scorer (BQS / FWS / NCS)
//! - Scan pipeline (filters, classification, ranking, guards)
//! - Risk gate engine (six gates, cap schedule, budget, pyramiding, re-entry)
//! - Position sizer (risk-based, value cap, correlation scalar)
//! - Stop manager (protection ladder, trailing, monotonic write boundary)
//!
//! Pure computation: no I/O, no retries. Callers supply snapshots, positions
//! and account state; results are plain serde values.

pub mod config;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod regime;
pub mod risk;
pub mod scan;
pub mod scoring;
pub mod sizing;
pub mod stops;
pub mod technicals;

pub use config::EngineConfig;
pub use error::EngineError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine inputs, outputs and configs can cross
    /// threads, so callers can fan out scans and reviews.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::InstrumentSnapshot>();
        require_sync::<domain::InstrumentSnapshot>();
        require_send::<domain::OpenPosition>();
        require_sync::<domain::OpenPosition>();
        require_send::<domain::Account>();
        require_sync::<domain::Account>();
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();

        // Component entry points
        require_send::<regime::RegimeClassifier>();
        require_sync::<regime::RegimeClassifier>();
        require_send::<stops::StopManager>();
        require_sync::<stops::StopManager>();
        require_send::<stops::StopLedger>();
        require_sync::<stops::StopLedger>();
        require_send::<sizing::CorrelationMatrix>();
        require_sync::<sizing::CorrelationMatrix>();

        // Results
        require_send::<scan::ScanReport>();
        require_sync::<scan::ScanReport>();
        require_send::<scoring::DualScore>();
        require_sync::<scoring::DualScore>();
        require_send::<risk::RiskBudget>();
        require_sync::<risk::RiskBudget>();
        require_send::<stops::StopReview>();
        require_sync::<stops::StopReview>();
        require_send::<EngineError>();
        require_sync::<EngineError>();

        // Config
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
    }

    /// Scoring never sees the book: it takes a snapshot and configuration only.
    #[test]
    fn scorer_has_no_portfolio_parameter() {
        fn _check(snap: &domain::InstrumentSnapshot, cfg: &EngineConfig) -> scoring::DualScore {
            scoring::score(snap, &cfg.scoring, cfg.risk.cluster_cap)
        }
    }
}
