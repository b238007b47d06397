//! Property tests for engine invariants.
//!
//! 1. Monotonic stop: the persisted stop never decreases, and lower writes fail
//! 2. Protection level never regresses, even when price falls back
//! 3. Sizing never rounds up past the risk cash or the value cap
//! 4. The correlation scalar never increases size
//! 5. Scores stay within their bounds

use chrono::NaiveDate;
use proptest::prelude::*;
use swingdesk_core::domain::{InstrumentSnapshot, MarketRegime, OpenPosition, Sleeve};
use swingdesk_core::risk::RiskConfig;
use swingdesk_core::scoring::{score, ScoringConfig};
use swingdesk_core::sizing::{size_position, SizingConfig, SizingRequest};
use swingdesk_core::stops::{StopContext, StopLedger, StopManager};
use swingdesk_core::EngineError;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (50.0..250.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_regime() -> impl Strategy<Value = MarketRegime> {
    prop_oneof![
        Just(MarketRegime::Bullish),
        Just(MarketRegime::Sideways),
        Just(MarketRegime::Bearish),
        Just(MarketRegime::Unknown),
    ]
}

fn arb_increment() -> impl Strategy<Value = f64> {
    prop_oneof![Just(1.0), Just(0.5), Just(0.1), Just(0.01)]
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

// ── 1 & 2. Stop ratchet ──────────────────────────────────────────────

proptest! {
    /// Feeding any price path through review → apply → observe never lowers
    /// the stop or the protection level.
    #[test]
    fn stop_and_level_never_regress(
        path in prop::collection::vec((arb_price(), prop::option::of(0.5..8.0_f64), arb_regime()), 1..60),
    ) {
        let manager = StopManager::default();
        let mut ledger = StopLedger::new();
        let mut position = OpenPosition::new("PROP", as_of(), 100.0, 10.0, 90.0);

        for (price, atr, regime) in path {
            let before_stop = position.current_stop;
            let before_level = position.protection_level;

            let review = manager
                .review(&position, &StopContext::new(price, atr, regime, as_of()))
                .unwrap();
            if let Some(rec) = &review.recommendation {
                prop_assert!(rec.new_stop > rec.old_stop);
                ledger.apply(&mut position, rec).unwrap();
            }
            StopLedger::observe(&mut position, &review);

            prop_assert!(position.current_stop >= before_stop);
            prop_assert!(position.protection_level >= before_level);
        }
    }

    /// Any write below the current stop is refused and leaves the position
    /// untouched.
    #[test]
    fn lower_stop_write_is_rejected(current in 80.0..120.0_f64, drop in 0.01..30.0_f64) {
        let mut ledger = StopLedger::new();
        let mut position = OpenPosition::new("PROP", as_of(), 130.0, 10.0, current);
        let level = position.protection_level;

        let result = ledger.write_stop(&mut position, current - drop, level, "test");
        let is_decrease = matches!(result, Err(EngineError::StopDecrease { .. }));
        prop_assert!(is_decrease);
        prop_assert_eq!(position.current_stop, current);
        prop_assert!(ledger.history().is_empty());
    }
}

// ── 3 & 4. Sizing ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sizing_never_rounds_up(
        equity in 1_000.0..5_000_000.0_f64,
        risk_pct in 0.1..3.0_f64,
        entry in 1.0..1_000.0_f64,
        stop_frac in 0.005..0.5_f64,
        fx in 0.5..2.0_f64,
        cap in prop::option::of(0.02..0.5_f64),
        increment in arb_increment(),
    ) {
        let req = SizingRequest {
            equity,
            risk_pct,
            entry,
            stop: entry * (1.0 - stop_frac),
            fx,
            value_cap: cap,
            correlation: None,
        };
        let config = SizingConfig { increment, ..SizingConfig::default() };
        let result = size_position(&req, &config).unwrap();

        prop_assert!(result.shares >= 0.0);
        prop_assert!(result.actual_risk <= result.risk_cash * (1.0 + 1e-12));
        if let Some(cap) = cap {
            prop_assert!(result.position_value <= equity * cap * (1.0 + 1e-9));
        }
    }

    #[test]
    fn correlation_never_increases_size(
        equity in 10_000.0..1_000_000.0_f64,
        entry in 5.0..500.0_f64,
        stop_frac in 0.01..0.2_f64,
        correlation in -1.0..1.0_f64,
        increment in arb_increment(),
    ) {
        let base_req = SizingRequest {
            equity,
            risk_pct: 0.75,
            entry,
            stop: entry * (1.0 - stop_frac),
            fx: 1.0,
            value_cap: None,
            correlation: None,
        };
        let config = SizingConfig { increment, ..SizingConfig::default() };
        let base = size_position(&base_req, &config).unwrap();
        let correlated = size_position(
            &SizingRequest { correlation: Some(correlation), ..base_req },
            &config,
        )
        .unwrap();

        prop_assert!(correlated.shares <= base.shares);
        prop_assert!(correlated.correlation_scalar <= 1.0);
    }
}

// ── 5. Score bounds ──────────────────────────────────────────────────

fn arb_snapshot() -> impl Strategy<Value = InstrumentSnapshot> {
    (
        (arb_price(), 0.0..80.0_f64, 0.0..60.0_f64, 0.0..60.0_f64, 0.2..15.0_f64),
        (0.0..6.0_f64, 0.0..100.0_f64, prop::option::of(-0.5..0.5_f64), prop::option::of(0.0..4.0_f64)),
        (prop::option::of(-5i64..30), prop::option::of(0.0..2.0_f64), arb_regime(), any::<bool>()),
    )
        .prop_map(
            |(
                (close, adx, plus_di, minus_di, atr_pct),
                (vol_ratio, efficiency, rs, ext),
                (dte, cluster, regime, stable),
            )| {
                let atr = close * atr_pct / 100.0;
                InstrumentSnapshot {
                    symbol: "PROP".into(),
                    sleeve: Sleeve::StockCore,
                    close,
                    low: close - atr,
                    high: close + atr,
                    prev_close: close,
                    ma200: close * 0.9,
                    ma50: close * 0.95,
                    ma20: close * 0.98,
                    ema20: close * 0.98,
                    adx,
                    plus_di,
                    minus_di,
                    atr,
                    atr_pct,
                    high_20: close,
                    low_20: close * 0.9,
                    vol_ratio,
                    efficiency,
                    relative_strength: rs,
                    extension_atr: ext,
                    days_to_earnings: dte,
                    cluster_exposure: cluster,
                    regime: Some(regime),
                    regime_stable: Some(stable),
                    ..InstrumentSnapshot::default()
                }
            },
        )
}

proptest! {
    #[test]
    fn scores_stay_in_bounds(snap in arb_snapshot()) {
        let result = score(&snap, &ScoringConfig::default(), RiskConfig::default().cluster_cap);
        prop_assert!((0.0..=100.0).contains(&result.bqs), "bqs {}", result.bqs);
        prop_assert!((0.0..=100.0).contains(&result.fws), "fws {}", result.fws);
        prop_assert!((0.0..=100.0).contains(&result.ncs), "ncs {}", result.ncs);
        prop_assert!(result.penalties.total >= 0.0);
    }

    /// Missing core data degrades to neutral values, never NaN.
    #[test]
    fn missing_fields_score_finite(adx in prop::option::of(0.0..80.0_f64)) {
        let snap = InstrumentSnapshot {
            adx: adx.unwrap_or(f64::NAN),
            ..InstrumentSnapshot::default()
        };
        let result = score(&snap, &ScoringConfig::default(), RiskConfig::default().cluster_cap);
        prop_assert!(result.bqs.is_finite() && result.fws.is_finite() && result.ncs.is_finite());
    }
}
