//! Entry filters. All are required; each records what it saw and the
//! threshold it applied. A NaN input fails its check.
//!
//! An early-bird setup (a stock pinned to the top of its 55-session range on
//! heavy volume in a bullish market) waives the two trend checks.

use serde::{Deserialize, Serialize};

use crate::domain::{InstrumentSnapshot, MarketRegime, Sleeve};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_adx: f64,
    /// ATR% cap for every sleeve but STOCK_HIGH_RISK.
    pub atr_cap_pct: f64,
    pub high_risk_atr_cap_pct: f64,
    pub min_efficiency: f64,
    pub early_bird: EarlyBirdConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_adx: 20.0,
            atr_cap_pct: 8.0,
            high_risk_atr_cap_pct: 7.0,
            min_efficiency: 30.0,
            early_bird: EarlyBirdConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyBirdConfig {
    pub enabled: bool,
    /// Minimum position in the 55-session range (0.90 = top 10%).
    pub range_threshold: f64,
    pub min_vol_ratio: f64,
    /// Some directional movement is still required.
    pub min_adx: f64,
}

impl Default for EarlyBirdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            range_threshold: 0.90,
            min_vol_ratio: 1.5,
            min_adx: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyBird {
    pub range_position: f64,
    pub vol_ratio: f64,
    pub adx: f64,
}

impl FilterConfig {
    pub fn atr_cap(&self, sleeve: Sleeve) -> f64 {
        match sleeve {
            Sleeve::StockHighRisk => self.high_risk_atr_cap_pct,
            _ => self.atr_cap_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterCheck {
    DataPresent { passed: bool, missing: Vec<String> },
    AboveMa200 { passed: bool, close: f64, ma200: f64 },
    TrendStrength { passed: bool, adx: f64, min: f64 },
    DirectionalDominance { passed: bool, plus_di: f64, minus_di: f64 },
    AtrCap { passed: bool, atr_pct: f64, cap: f64 },
    Efficiency { passed: bool, efficiency: f64, min: f64 },
}

impl FilterCheck {
    pub fn passed(&self) -> bool {
        match self {
            FilterCheck::DataPresent { passed, .. }
            | FilterCheck::AboveMa200 { passed, .. }
            | FilterCheck::TrendStrength { passed, .. }
            | FilterCheck::DirectionalDominance { passed, .. }
            | FilterCheck::AtrCap { passed, .. }
            | FilterCheck::Efficiency { passed, .. } => *passed,
        }
    }

    /// Checks an early-bird setup may fail.
    pub fn is_trend_check(&self) -> bool {
        matches!(
            self,
            FilterCheck::TrendStrength { .. } | FilterCheck::DirectionalDominance { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterCheck::DataPresent { .. } => "DATA_PRESENT",
            FilterCheck::AboveMa200 { .. } => "ABOVE_MA200",
            FilterCheck::TrendStrength { .. } => "TREND_STRENGTH",
            FilterCheck::DirectionalDominance { .. } => "DIRECTIONAL_DOMINANCE",
            FilterCheck::AtrCap { .. } => "ATR_CAP",
            FilterCheck::Efficiency { .. } => "EFFICIENCY",
        }
    }
}

pub fn run_filters(snap: &InstrumentSnapshot, config: &FilterConfig) -> Vec<FilterCheck> {
    let missing: Vec<String> = snap
        .missing_core_fields()
        .into_iter()
        .map(String::from)
        .collect();
    let cap = config.atr_cap(snap.sleeve);
    vec![
        FilterCheck::DataPresent {
            passed: missing.is_empty(),
            missing,
        },
        FilterCheck::AboveMa200 {
            passed: snap.close > snap.ma200,
            close: snap.close,
            ma200: snap.ma200,
        },
        FilterCheck::TrendStrength {
            passed: snap.adx >= config.min_adx,
            adx: snap.adx,
            min: config.min_adx,
        },
        FilterCheck::DirectionalDominance {
            passed: snap.plus_di > snap.minus_di,
            plus_di: snap.plus_di,
            minus_di: snap.minus_di,
        },
        FilterCheck::AtrCap {
            passed: snap.atr_pct < cap,
            atr_pct: snap.atr_pct,
            cap,
        },
        FilterCheck::Efficiency {
            passed: snap.efficiency >= config.min_efficiency,
            efficiency: snap.efficiency,
            min: config.min_efficiency,
        },
    ]
}

pub fn all_passed(checks: &[FilterCheck]) -> bool {
    checks.iter().all(FilterCheck::passed)
}

/// Every check but the trend checks passed.
pub fn passed_except_trend(checks: &[FilterCheck]) -> bool {
    checks.iter().all(|c| c.passed() || c.is_trend_check())
}

/// Early-bird eligibility. ETF_CORE names never qualify, and the market must
/// be bullish.
pub fn early_bird(snap: &InstrumentSnapshot, regime: MarketRegime, config: &EarlyBirdConfig) -> Option<EarlyBird> {
    if !config.enabled || snap.sleeve == Sleeve::EtfCore || regime != MarketRegime::Bullish {
        return None;
    }
    let range_position = snap.range_position_55()?;
    let eligible = range_position >= config.range_threshold
        && snap.vol_ratio.is_finite()
        && snap.vol_ratio >= config.min_vol_ratio
        && snap.adx.is_finite()
        && snap.adx >= config.min_adx;
    eligible.then_some(EarlyBird {
        range_position,
        vol_ratio: snap.vol_ratio,
        adx: snap.adx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing() -> InstrumentSnapshot {
        InstrumentSnapshot {
            symbol: "MSFT".into(),
            close: 100.0,
            ma200: 90.0,
            atr: 2.0,
            atr_pct: 2.0,
            high_20: 101.0,
            adx: 25.0,
            plus_di: 28.0,
            minus_di: 14.0,
            efficiency: 45.0,
            ..InstrumentSnapshot::default()
        }
    }

    fn failed(checks: &[FilterCheck]) -> Vec<&'static str> {
        checks.iter().filter(|c| !c.passed()).map(FilterCheck::name).collect()
    }

    #[test]
    fn clean_snapshot_passes_everything() {
        let checks = run_filters(&passing(), &FilterConfig::default());
        assert_eq!(checks.len(), 6);
        assert!(all_passed(&checks));
    }

    #[test]
    fn adx_threshold_is_inclusive() {
        let mut snap = passing();
        snap.adx = 20.0;
        assert!(all_passed(&run_filters(&snap, &FilterConfig::default())));
        snap.adx = 19.9;
        assert_eq!(failed(&run_filters(&snap, &FilterConfig::default())), vec!["TREND_STRENGTH"]);
    }

    #[test]
    fn high_risk_sleeve_has_tighter_atr_cap() {
        let mut snap = passing();
        snap.atr_pct = 7.5;
        assert!(all_passed(&run_filters(&snap, &FilterConfig::default())));
        snap.sleeve = Sleeve::StockHighRisk;
        assert_eq!(failed(&run_filters(&snap, &FilterConfig::default())), vec!["ATR_CAP"]);
    }

    #[test]
    fn missing_data_fails_and_reports_fields() {
        let mut snap = passing();
        snap.ma200 = f64::NAN;
        let checks = run_filters(&snap, &FilterConfig::default());
        match &checks[0] {
            FilterCheck::DataPresent { passed, missing } => {
                assert!(!passed);
                assert_eq!(missing, &vec!["ma200".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(failed(&checks), vec!["DATA_PRESENT", "ABOVE_MA200"]);
    }

    fn early_setup() -> InstrumentSnapshot {
        InstrumentSnapshot {
            adx: 17.0,
            plus_di: 18.0,
            minus_di: 21.0,
            vol_ratio: 1.8,
            low_20: 95.0,
            high_55: Some(101.0),
            low_55: Some(80.0),
            ..passing()
        }
    }

    #[test]
    fn early_bird_waives_only_trend_checks() {
        let snap = early_setup();
        let checks = run_filters(&snap, &FilterConfig::default());
        assert_eq!(failed(&checks), vec!["TREND_STRENGTH", "DIRECTIONAL_DOMINANCE"]);
        assert!(passed_except_trend(&checks));

        let bird = early_bird(&snap, MarketRegime::Bullish, &EarlyBirdConfig::default()).unwrap();
        // (100 - 80) / (101 - 80)
        assert!((bird.range_position - 20.0 / 21.0).abs() < 1e-12);

        let mut volatile = snap.clone();
        volatile.atr_pct = 9.0;
        assert!(!passed_except_trend(&run_filters(&volatile, &FilterConfig::default())));
    }

    #[test]
    fn early_bird_conditions() {
        let cfg = EarlyBirdConfig::default();
        let snap = early_setup();
        assert!(early_bird(&snap, MarketRegime::Sideways, &cfg).is_none());

        let etf = InstrumentSnapshot {
            sleeve: Sleeve::EtfCore,
            ..snap.clone()
        };
        assert!(early_bird(&etf, MarketRegime::Bullish, &cfg).is_none());

        let mid_range = InstrumentSnapshot {
            low_55: Some(60.0),
            high_55: Some(120.0),
            ..snap.clone()
        };
        assert!(early_bird(&mid_range, MarketRegime::Bullish, &cfg).is_none());

        let quiet = InstrumentSnapshot {
            vol_ratio: 1.2,
            ..snap.clone()
        };
        assert!(early_bird(&quiet, MarketRegime::Bullish, &cfg).is_none());

        let trendless = InstrumentSnapshot { adx: 12.0, ..snap };
        assert!(early_bird(&trendless, MarketRegime::Bullish, &cfg).is_none());
    }

    #[test]
    fn di_dominance_is_strict() {
        let mut snap = passing();
        snap.minus_di = snap.plus_di;
        assert_eq!(
            failed(&run_filters(&snap, &FilterConfig::default())),
            vec!["DIRECTIONAL_DOMINANCE"]
        );
    }
}
