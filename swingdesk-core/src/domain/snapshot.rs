//! Per-symbol technical snapshot: the per-cycle input to the scan.
//!
//! Core technicals are plain `f64` and are `NaN` when absent; the data-present
//! filter rejects a snapshot whose core fields are missing. Enrichments are
//! `Option` and every consumer documents its neutral default.

use serde::{Deserialize, Serialize};

use super::tags::{MarketRegime, Sleeve, VolRegime};

/// Static description of a tradable instrument in the scan universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UniverseMember {
    pub symbol: String,
    #[serde(default)]
    pub sleeve: Sleeve,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub super_cluster: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    /// Shared underlying (e.g. a stock and its leveraged ETF wrapper).
    #[serde(default)]
    pub underlying: Option<String>,
}

impl UniverseMember {
    pub fn new(symbol: impl Into<String>, sleeve: Sleeve) -> Self {
        Self {
            symbol: symbol.into(),
            sleeve,
            ..Self::default()
        }
    }
}

/// A data-quality issue attached to a snapshot that was degraded rather
/// than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataIssue {
    /// Retrieval failed; the snapshot is the documented all-missing default.
    FetchFailed { source: String, reason: String },
    /// A core field was absent or non-finite.
    MissingField { field: String },
    /// Not enough bar history to compute an indicator.
    ShortHistory { needed: usize, available: usize },
}

/// Immutable per-symbol technical snapshot for one scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub sleeve: Sleeve,
    pub cluster: Option<String>,
    pub super_cluster: Option<String>,
    pub sector: Option<String>,
    pub underlying: Option<String>,

    // ── Price ──
    #[serde(with = "super::nan_f64")]
    pub close: f64,
    #[serde(with = "super::nan_f64")]
    pub low: f64,
    #[serde(with = "super::nan_f64")]
    pub high: f64,
    #[serde(with = "super::nan_f64")]
    pub prev_close: f64,

    // ── Trend ──
    #[serde(with = "super::nan_f64")]
    pub ma200: f64,
    #[serde(with = "super::nan_f64")]
    pub ma50: f64,
    #[serde(with = "super::nan_f64")]
    pub ma20: f64,
    #[serde(with = "super::nan_f64")]
    pub ema20: f64,
    #[serde(with = "super::nan_f64")]
    pub adx: f64,
    #[serde(with = "super::nan_f64")]
    pub plus_di: f64,
    #[serde(with = "super::nan_f64")]
    pub minus_di: f64,

    // ── Volatility / range ──
    #[serde(with = "super::nan_f64")]
    pub atr: f64,
    /// ATR as percent of close (2.5 = 2.5%).
    #[serde(with = "super::nan_f64")]
    pub atr_pct: f64,
    /// Highest high of the 20 sessions before today.
    #[serde(with = "super::nan_f64")]
    pub high_20: f64,
    #[serde(with = "super::nan_f64")]
    pub low_20: f64,
    /// 55-session range, today included.
    pub high_55: Option<f64>,
    pub low_55: Option<f64>,

    // ── Participation / quality ──
    #[serde(with = "super::nan_f64")]
    pub vol_ratio: f64,
    /// Net move over path length, 0–100.
    #[serde(with = "super::nan_f64")]
    pub efficiency: f64,
    /// Excess return vs. benchmark over the RS lookback, as a fraction.
    pub relative_strength: Option<f64>,

    // ── Chase / extension ──
    /// Pre-computed ATR-normalized extension above the anchor. Derived when absent.
    pub extension_atr: Option<f64>,
    pub chase_gap: bool,
    pub chase_extended: bool,
    pub pullback_low: Option<f64>,

    // ── Event / exposure ──
    pub days_to_earnings: Option<i64>,
    pub earnings_soon: Option<bool>,
    /// Current cluster exposure as a fraction of the cluster cap basis.
    pub cluster_exposure: Option<f64>,
    pub super_cluster_exposure: Option<f64>,

    // ── Context ──
    pub regime: Option<MarketRegime>,
    pub regime_stable: Option<bool>,
    pub dual_aligned: bool,
    pub vol_regime: VolRegime,
    pub weekly_confirmed: bool,
    pub fx_rate: Option<f64>,

    // ── Optional pre-computed bonuses ──
    pub pattern_bonus: Option<f64>,
    pub sector_bonus: Option<f64>,

    pub data_issues: Vec<DataIssue>,
}

impl Default for InstrumentSnapshot {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            sleeve: Sleeve::default(),
            cluster: None,
            super_cluster: None,
            sector: None,
            underlying: None,
            close: f64::NAN,
            low: f64::NAN,
            high: f64::NAN,
            prev_close: f64::NAN,
            ma200: f64::NAN,
            ma50: f64::NAN,
            ma20: f64::NAN,
            ema20: f64::NAN,
            adx: f64::NAN,
            plus_di: f64::NAN,
            minus_di: f64::NAN,
            atr: f64::NAN,
            atr_pct: f64::NAN,
            high_20: f64::NAN,
            low_20: f64::NAN,
            high_55: None,
            low_55: None,
            vol_ratio: f64::NAN,
            efficiency: f64::NAN,
            relative_strength: None,
            extension_atr: None,
            chase_gap: false,
            chase_extended: false,
            pullback_low: None,
            days_to_earnings: None,
            earnings_soon: None,
            cluster_exposure: None,
            super_cluster_exposure: None,
            regime: None,
            regime_stable: None,
            dual_aligned: false,
            vol_regime: VolRegime::default(),
            weekly_confirmed: false,
            fx_rate: None,
            pattern_bonus: None,
            sector_bonus: None,
            data_issues: Vec::new(),
        }
    }
}

impl InstrumentSnapshot {
    /// Empty snapshot carrying only the member's tags.
    pub fn for_member(member: &UniverseMember) -> Self {
        Self {
            symbol: member.symbol.clone(),
            sleeve: member.sleeve,
            cluster: member.cluster.clone(),
            super_cluster: member.super_cluster.clone(),
            sector: member.sector.clone(),
            underlying: member.underlying.clone(),
            ..Self::default()
        }
    }

    /// Documented default substituted for a failed retrieval: all technicals
    /// missing, flagged with the failure.
    pub fn missing(member: &UniverseMember, issue: DataIssue) -> Self {
        let mut snap = Self::for_member(member);
        snap.data_issues.push(issue);
        snap
    }

    /// FX multiplier to account currency (defaults to 1.0).
    pub fn fx(&self) -> f64 {
        match self.fx_rate {
            Some(fx) if fx.is_finite() && fx > 0.0 => fx,
            _ => 1.0,
        }
    }

    /// Pullback anchor: max(20-day high, EMA20), ignoring a missing EMA.
    pub fn anchor(&self) -> f64 {
        if self.ema20.is_finite() {
            self.high_20.max(self.ema20)
        } else {
            self.high_20
        }
    }

    /// ATR-normalized extension above the anchor. Uses the pre-computed value
    /// when supplied; 0.0 when it cannot be derived.
    pub fn extension(&self) -> f64 {
        if let Some(ext) = self.extension_atr.filter(|e| e.is_finite()) {
            return ext;
        }
        let anchor = self.anchor();
        if self.close.is_finite() && anchor.is_finite() && self.atr.is_finite() && self.atr > 0.0 {
            ((self.close - anchor) / self.atr).max(0.0)
        } else {
            0.0
        }
    }

    /// Names of core fields that are absent, non-finite or non-positive.
    pub fn missing_core_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("close", self.close),
            ("ma200", self.ma200),
            ("atr", self.atr),
            ("high_20", self.high_20),
        ] {
            if !(value.is_finite() && value > 0.0) {
                missing.push(name);
            }
        }
        for (name, value) in [
            ("adx", self.adx),
            ("plus_di", self.plus_di),
            ("minus_di", self.minus_di),
        ] {
            if !value.is_finite() {
                missing.push(name);
            }
        }
        missing
    }

    /// Where the close sits in the 55-session range (1.0 = at the high).
    /// Falls back to the 20-session low when the 55-session low is absent.
    pub fn range_position_55(&self) -> Option<f64> {
        let high = self.high_55.filter(|h| h.is_finite())?;
        let low = self
            .low_55
            .filter(|l| l.is_finite())
            .or_else(|| self.low_20.is_finite().then_some(self.low_20))?;
        let range = high - low;
        (self.close.is_finite() && range > 0.0).then(|| (self.close - low) / range)
    }

    pub fn has_data_issues(&self) -> bool {
        !self.data_issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> InstrumentSnapshot {
        InstrumentSnapshot {
            symbol: "NVDA".into(),
            close: 100.0,
            ma200: 80.0,
            atr: 4.0,
            high_20: 99.0,
            ema20: 97.0,
            adx: 28.0,
            plus_di: 30.0,
            minus_di: 15.0,
            ..InstrumentSnapshot::default()
        }
    }

    #[test]
    fn missing_snapshot_keeps_tags_and_flags_issue() {
        let mut member = UniverseMember::new("ASML", Sleeve::StockHighRisk);
        member.cluster = Some("SEMIS".into());
        let snap = InstrumentSnapshot::missing(
            &member,
            DataIssue::FetchFailed {
                source: "bars".into(),
                reason: "timeout".into(),
            },
        );
        assert_eq!(snap.sleeve, Sleeve::StockHighRisk);
        assert_eq!(snap.cluster.as_deref(), Some("SEMIS"));
        assert!(snap.close.is_nan());
        assert!(snap.has_data_issues());
        assert!(snap.missing_core_fields().contains(&"close"));
    }

    #[test]
    fn populated_snapshot_has_no_missing_core_fields() {
        assert!(populated().missing_core_fields().is_empty());
    }

    #[test]
    fn extension_derived_from_anchor() {
        let snap = populated();
        // anchor = max(99, 97) = 99; (100 - 99) / 4 = 0.25
        assert!((snap.extension() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn extension_prefers_precomputed_value() {
        let mut snap = populated();
        snap.extension_atr = Some(1.4);
        assert_eq!(snap.extension(), 1.4);
    }

    #[test]
    fn extension_defaults_to_zero_without_atr() {
        let mut snap = populated();
        snap.atr = f64::NAN;
        assert_eq!(snap.extension(), 0.0);
    }

    #[test]
    fn range_position_uses_low_20_fallback() {
        let mut snap = populated();
        assert_eq!(snap.range_position_55(), None);
        snap.high_55 = Some(102.0);
        snap.low_20 = 92.0;
        // (100 - 92) / (102 - 92)
        assert!((snap.range_position_55().unwrap() - 0.8).abs() < 1e-12);
        snap.low_55 = Some(82.0);
        assert!((snap.range_position_55().unwrap() - 0.9).abs() < 1e-12);
        snap.low_55 = Some(102.0);
        assert_eq!(snap.range_position_55(), None);
    }

    #[test]
    fn fx_defaults_to_one() {
        let mut snap = populated();
        assert_eq!(snap.fx(), 1.0);
        snap.fx_rate = Some(0.79);
        assert_eq!(snap.fx(), 0.79);
        snap.fx_rate = Some(-1.0);
        assert_eq!(snap.fx(), 1.0);
    }
}
