//! Desk runs: regime assessment, universe scan, stop review and the risk
//! budget, wired from loaded inputs and a `DeskConfig`.

use anyhow::{ensure, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use swingdesk_core::domain::{
    Account, Bar, ExitRecord, InstrumentSnapshot, MarketRegime, OpenPosition, UniverseMember,
};
use swingdesk_core::indicators::directional;
use swingdesk_core::regime::{combine, RegimeClassifier, RegimeReading};
use swingdesk_core::risk::{Book, MarketBackdrop, RiskBudget, RiskLimits};
use swingdesk_core::scan::{self, ScanInput, ScanReport};
use swingdesk_core::sizing::CorrelationMatrix;
use swingdesk_core::stops::{StopChange, StopContext, StopLedger, StopManager, StopReview};

use crate::collect::{collect_universe, stamp_regime};
use crate::config::{ConfigHash, DeskConfig};
use crate::source::SnapshotSource;

/// Benchmark-derived market state for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegimeAssessment {
    pub regime: MarketRegime,
    pub stable: bool,
    pub primary: RegimeReading,
    pub secondary: Option<RegimeReading>,
    /// Latest primary-benchmark ADX, feeding momentum expansion.
    pub benchmark_adx: Option<f64>,
}

impl RegimeAssessment {
    pub fn unknown() -> Self {
        Self {
            regime: MarketRegime::Unknown,
            stable: false,
            primary: RegimeReading::unknown(),
            secondary: None,
            benchmark_adx: None,
        }
    }

    pub fn backdrop(&self) -> MarketBackdrop {
        MarketBackdrop {
            benchmark_adx: self.benchmark_adx,
            breadth: None,
        }
    }
}

/// Classify the primary benchmark, and combine with the secondary when
/// one is configured.
pub fn assess_regime(primary: &[Bar], secondary: Option<&[Bar]>, config: &DeskConfig) -> RegimeAssessment {
    let classifier = RegimeClassifier::new(config.regime.clone());
    let primary_reading = classifier.classify_bars(primary);
    let secondary_reading = secondary.map(|bars| classifier.classify_bars(bars));

    let (regime, stable) = match secondary_reading {
        Some(sec) => (
            combine(primary_reading.regime, sec.regime),
            primary_reading.stable && sec.stable,
        ),
        None => (primary_reading.regime, primary_reading.stable),
    };

    let (adx, _, _) = directional(primary, config.technicals.adx_period).latest();
    let assessment = RegimeAssessment {
        regime,
        stable,
        primary: primary_reading,
        secondary: secondary_reading,
        benchmark_adx: adx.is_finite().then_some(adx),
    };
    info!(
        regime = %assessment.regime,
        stable = assessment.stable,
        benchmark_adx = ?assessment.benchmark_adx,
        "Assessed market regime"
    );
    assessment
}

/// Everything the persistence collaborator supplies for a scan.
#[derive(Debug, Clone)]
pub struct DeskInputs {
    pub as_of: NaiveDate,
    pub universe: Vec<UniverseMember>,
    pub account: Account,
    pub positions: Vec<OpenPosition>,
    pub exits: Vec<ExitRecord>,
    pub correlations: CorrelationMatrix,
}

impl DeskInputs {
    pub fn new(as_of: NaiveDate, universe: Vec<UniverseMember>, account: Account) -> Self {
        Self {
            as_of,
            universe,
            account,
            positions: Vec::new(),
            exits: Vec::new(),
            correlations: CorrelationMatrix::new(),
        }
    }
}

/// Scan output plus the run's provenance.
#[derive(Debug, Clone, Serialize)]
pub struct DeskScan {
    pub config_hash: ConfigHash,
    pub regime: RegimeAssessment,
    /// Symbols whose fetch failed and were scanned as missing data.
    pub substituted: Vec<String>,
    pub report: ScanReport,
}

/// Collect snapshots for the universe and run the scan pipeline.
///
/// Snapshots are fetched through `source` as given. Pass the session's
/// `DeskSource` so repeat runs inside the cache TTL reuse stored snapshots.
pub fn run_scan<S: SnapshotSource + ?Sized>(
    source: &S,
    inputs: &DeskInputs,
    regime: &RegimeAssessment,
    config: &DeskConfig,
) -> Result<DeskScan> {
    ensure!(!inputs.universe.is_empty(), "scan universe is empty");
    ensure!(
        source.is_available(),
        "snapshot source '{}' is unavailable",
        source.name()
    );

    config
        .validate_profile(&inputs.account.profile)
        .context("Account profile conflicts with config")?;
    let config_hash = config.config_hash().context("Failed to hash config")?;
    let mut collection = collect_universe(source, &inputs.universe);
    stamp_regime(&mut collection.snapshots, regime.regime, regime.stable);

    let input = ScanInput {
        as_of: inputs.as_of,
        snapshots: collection.snapshots,
        account: inputs.account.clone(),
        positions: inputs.positions.clone(),
        exits: inputs.exits.clone(),
        correlations: inputs.correlations.clone(),
        regime: regime.regime,
        regime_stable: regime.stable,
        backdrop: regime.backdrop(),
    };
    let report = scan::run_scan(&input, &config.engine()).context("Scan failed")?;

    Ok(DeskScan {
        config_hash,
        regime: *regime,
        substituted: collection.substituted,
        report,
    })
}

/// Stop-review inputs per held symbol from bar history.
pub fn contexts_from_bars(
    positions: &[OpenPosition],
    bars: &HashMap<String, Vec<Bar>>,
    regime: MarketRegime,
    config: &DeskConfig,
) -> HashMap<String, StopContext> {
    positions
        .iter()
        .filter_map(|p| {
            let series = bars.get(&p.symbol)?;
            let ctx = StopContext::from_bars(series, regime, config.stops.atr_period)?;
            Some((p.symbol.clone(), ctx))
        })
        .collect()
}

/// Stop-review inputs per held symbol from pre-computed snapshots.
pub fn contexts_from_snapshots(
    positions: &[OpenPosition],
    snapshots: &[InstrumentSnapshot],
    as_of: NaiveDate,
) -> HashMap<String, StopContext> {
    let by_symbol: HashMap<&str, &InstrumentSnapshot> =
        snapshots.iter().map(|s| (s.symbol.as_str(), s)).collect();
    positions
        .iter()
        .filter_map(|p| {
            let snap = by_symbol.get(p.symbol.as_str())?;
            snap.close
                .is_finite()
                .then(|| (p.symbol.clone(), StopContext::from_snapshot(snap, as_of)))
        })
        .collect()
}

/// Review every position that has market context. Positions without one
/// are skipped with a warning; an invalid position fails the run.
pub fn review_stops(
    positions: &[OpenPosition],
    contexts: &HashMap<String, StopContext>,
    config: &DeskConfig,
) -> Result<Vec<StopReview>> {
    let manager = StopManager::new(config.stops.clone());
    let mut reviews = Vec::with_capacity(positions.len());
    for position in positions {
        let Some(ctx) = contexts.get(&position.symbol) else {
            warn!(symbol = %position.symbol, "No market data for held position; stop not reviewed");
            continue;
        };
        let review = manager
            .review(position, ctx)
            .with_context(|| format!("Stop review failed for {}", position.symbol))?;
        reviews.push(review);
    }
    info!(
        positions = positions.len(),
        reviewed = reviews.len(),
        recommendations = reviews.iter().filter(|r| r.recommendation.is_some()).count(),
        "Reviewed stops"
    );
    Ok(reviews)
}

/// Write recommendations through the monotonic boundary and record the
/// reviews' high-water marks. Returns the applied changes.
pub fn apply_reviews(positions: &mut [OpenPosition], reviews: &[StopReview]) -> Result<Vec<StopChange>> {
    let mut ledger = StopLedger::new();
    for review in reviews {
        let Some(position) = positions.iter_mut().find(|p| p.symbol == review.symbol) else {
            warn!(symbol = %review.symbol, "Review for a position that is no longer held");
            continue;
        };
        if let Some(rec) = &review.recommendation {
            ledger
                .apply(position, rec)
                .with_context(|| format!("Stop write rejected for {}", rec.symbol))?;
        }
        // High-water marks persist only alongside an accepted write.
        StopLedger::observe(position, review);
    }
    Ok(ledger.into_history())
}

/// Current utilisation against the effective limits.
pub fn risk_budget(
    account: &Account,
    positions: &[OpenPosition],
    backdrop: &MarketBackdrop,
    config: &DeskConfig,
) -> Result<RiskBudget> {
    ensure!(
        account.equity.is_finite() && account.equity > 0.0,
        "account equity must be positive, got {}",
        account.equity
    );
    config
        .validate_profile(&account.profile)
        .context("Account profile conflicts with config")?;
    let limits = RiskLimits::resolve(&account.profile, &config.risk, backdrop);
    let book = Book::new(account.equity, positions);
    Ok(RiskBudget::compute(&book, &limits, &config.risk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swingdesk_core::domain::{ProtectionLevel, Sleeve};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use swingdesk_core::stops::StopRecommendation;

    use crate::cache::DeskSource;
    use crate::source::{SourceError, StaticSource};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                symbol: "SPY".into(),
                date: date(2023, 1, 2) + chrono::Duration::days(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1_000_000,
            })
            .collect()
    }

    #[test]
    fn uptrend_benchmark_is_stable_bullish() {
        let closes: Vec<f64> = (0..260).map(|i| 300.0 + i as f64).collect();
        let assessment = assess_regime(&bars(&closes), None, &DeskConfig::default());
        assert_eq!(assessment.regime, MarketRegime::Bullish);
        assert!(assessment.stable);
        assert!(assessment.benchmark_adx.is_some());
        assert!(assessment.secondary.is_none());
    }

    #[test]
    fn bearish_secondary_drags_combined_regime() {
        let up: Vec<f64> = (0..260).map(|i| 300.0 + i as f64).collect();
        let down: Vec<f64> = (0..260).map(|i| 600.0 - i as f64).collect();
        let assessment = assess_regime(&bars(&up), Some(&bars(&down)), &DeskConfig::default());
        assert_eq!(assessment.primary.regime, MarketRegime::Bullish);
        assert_eq!(assessment.regime, MarketRegime::Bearish);
    }

    #[test]
    fn short_benchmark_history_is_unknown() {
        let assessment = assess_regime(&bars(&[400.0; 30]), None, &DeskConfig::default());
        assert_eq!(assessment.regime, MarketRegime::Unknown);
        assert!(!assessment.stable);
    }

    #[test]
    fn review_and_apply_advances_ladder() {
        let mut positions = vec![OpenPosition::new("MSFT", date(2024, 1, 2), 100.0, 10.0, 90.0)];
        let mut contexts = HashMap::new();
        contexts.insert(
            "MSFT".to_string(),
            StopContext::new(116.0, None, MarketRegime::Bullish, date(2024, 3, 1)),
        );

        let reviews = review_stops(&positions, &contexts, &DeskConfig::default()).unwrap();
        assert_eq!(reviews.len(), 1);
        let changes = apply_reviews(&mut positions, &reviews).unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(positions[0].current_stop, 100.0);
        assert_eq!(positions[0].protection_level, ProtectionLevel::Breakeven);
        assert_eq!(positions[0].last_price, Some(116.0));
    }

    #[test]
    fn rejected_write_leaves_position_untouched() {
        let mut positions = vec![OpenPosition::new("NVDA", date(2024, 1, 2), 100.0, 10.0, 95.0)];
        positions[0].highest_close = Some(108.0);
        positions[0].last_price = Some(107.0);
        let before = positions[0].clone();

        let review = StopReview {
            symbol: "NVDA".into(),
            price: 120.0,
            r_multiple: 4.0,
            ladder: None,
            trailing_stop: Some(112.0),
            chop_stop: None,
            highest_close: 121.0,
            recommendation: Some(StopRecommendation {
                symbol: "NVDA".into(),
                old_stop: 95.0,
                new_stop: 94.0,
                old_level: ProtectionLevel::Initial,
                new_level: ProtectionLevel::Initial,
                reason: "stale".into(),
            }),
            advisories: Vec::new(),
        };

        let err = apply_reviews(&mut positions, &[review]).unwrap_err();
        assert!(err.to_string().contains("NVDA"));
        assert_eq!(positions[0], before);
    }

    #[test]
    fn repeat_scans_share_the_session_cache() {
        struct Counting {
            inner: StaticSource,
            calls: AtomicUsize,
        }

        impl SnapshotSource for Counting {
            fn name(&self) -> &str {
                "counting"
            }

            fn fetch(&self, member: &UniverseMember) -> Result<InstrumentSnapshot, SourceError> {
                self.calls.fetch_add(1, Ordering::Relaxed);
                self.inner.fetch(member)
            }
        }

        let members = vec![
            UniverseMember::new("AAPL", Sleeve::StockCore),
            UniverseMember::new("MSFT", Sleeve::StockCore),
        ];
        let counting = Counting {
            inner: StaticSource::new(members.iter().map(InstrumentSnapshot::for_member)),
            calls: AtomicUsize::new(0),
        };
        let config = DeskConfig::default();
        let source = DeskSource::new(&counting, &config.collection);
        let inputs = DeskInputs::new(date(2024, 6, 4), members, Account::new(100_000.0));
        let regime = RegimeAssessment::unknown();

        run_scan(&source, &inputs, &regime, &config).unwrap();
        run_scan(&source, &inputs, &regime, &config).unwrap();

        assert_eq!(counting.calls.load(Ordering::Relaxed), 2);
        let stats = source.cache_stats().unwrap();
        assert_eq!((stats.misses, stats.hits), (2, 2));
    }

    #[test]
    fn disabled_cache_is_a_direct_source() {
        let mut config = DeskConfig::default();
        config.collection.use_cache = false;
        let source = DeskSource::new(StaticSource::default(), &config.collection);
        assert!(source.cache_stats().is_none());
    }

    #[test]
    fn positions_without_context_are_skipped() {
        let positions = vec![OpenPosition::new("XLE", date(2024, 1, 2), 90.0, 5.0, 85.0)];
        let reviews = review_stops(&positions, &HashMap::new(), &DeskConfig::default()).unwrap();
        assert!(reviews.is_empty());
    }

    #[test]
    fn invalid_position_fails_review() {
        let mut bad = OpenPosition::new("BAD", date(2024, 1, 2), 100.0, 10.0, 90.0);
        bad.initial_risk = 0.0;
        let mut contexts = HashMap::new();
        contexts.insert(
            "BAD".to_string(),
            StopContext::new(110.0, Some(2.0), MarketRegime::Bullish, date(2024, 3, 1)),
        );
        let err = review_stops(&[bad], &contexts, &DeskConfig::default()).unwrap_err();
        assert!(err.to_string().contains("BAD"));
    }

    #[test]
    fn budget_on_empty_book() {
        let account = Account::new(100_000.0);
        let budget = risk_budget(&account, &[], &MarketBackdrop::default(), &DeskConfig::default()).unwrap();
        assert_eq!(budget.used_positions, 0);
        assert_eq!(budget.used_risk_pct, 0.0);
        assert_eq!(budget.max_positions, account.profile.max_positions);
    }

    #[test]
    fn budget_rejects_profile_above_expansion_ceiling() {
        let mut account = Account::new(100_000.0);
        account.profile.max_open_risk_pct = 9.0;
        let err = risk_budget(&account, &[], &MarketBackdrop::default(), &DeskConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("risk.momentum.ceiling_pct"));
    }

    #[test]
    fn budget_rejects_zero_equity() {
        assert!(risk_budget(&Account::new(0.0), &[], &MarketBackdrop::default(), &DeskConfig::default()).is_err());
    }

    #[test]
    fn contexts_from_snapshots_skip_missing_prices() {
        let positions = vec![
            OpenPosition::new("AAPL", date(2024, 1, 2), 100.0, 10.0, 95.0),
            OpenPosition::new("GONE", date(2024, 1, 2), 50.0, 10.0, 45.0),
        ];
        let mut aapl = InstrumentSnapshot::for_member(&UniverseMember::new("AAPL", Sleeve::StockCore));
        aapl.close = 104.0;
        aapl.atr = 2.0;
        let gone = InstrumentSnapshot::for_member(&UniverseMember::new("GONE", Sleeve::StockCore));

        let contexts = contexts_from_snapshots(&positions, &[aapl, gone], date(2024, 3, 1));
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts["AAPL"].price, 104.0);
        assert_eq!(contexts["AAPL"].atr, Some(2.0));
    }
}
