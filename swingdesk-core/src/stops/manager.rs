//! Per-position stop review: ladder, trailing and chop candidates reconciled
//! into at most one recommendation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::advisory::{advise, Advisory, AdvisoryInput};
use super::ladder::{next_step, LadderStep};
use super::trailing::{chop_stop, highest_close, trailing_stop};
use super::StopConfig;
use crate::domain::{Bar, InstrumentSnapshot, MarketRegime, OpenPosition, ProtectionLevel};
use crate::error::EngineError;
use crate::indicators;

/// Market inputs for one position's review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopContext {
    pub price: f64,
    pub atr: Option<f64>,
    pub regime: MarketRegime,
    pub as_of: NaiveDate,
    pub ma20: Option<f64>,
    pub vol_ratio: Option<f64>,
}

fn usable(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}

impl StopContext {
    pub fn new(price: f64, atr: Option<f64>, regime: MarketRegime, as_of: NaiveDate) -> Self {
        Self {
            price,
            atr: atr.and_then(usable),
            regime,
            as_of,
            ma20: None,
            vol_ratio: None,
        }
    }

    pub fn from_snapshot(snapshot: &InstrumentSnapshot, as_of: NaiveDate) -> Self {
        Self {
            price: snapshot.close,
            atr: usable(snapshot.atr),
            regime: snapshot.regime.unwrap_or_default(),
            as_of,
            ma20: usable(snapshot.ma20),
            vol_ratio: usable(snapshot.vol_ratio),
        }
    }

    /// Price, ATR and MA20 from bar history via the shared indicators.
    /// `None` for an empty series.
    pub fn from_bars(bars: &[Bar], regime: MarketRegime, atr_period: usize) -> Option<Self> {
        let last = bars.last()?;
        let closes = indicators::closes(bars);
        Some(Self {
            price: last.close,
            atr: indicators::latest_atr(bars, atr_period).and_then(usable),
            regime,
            as_of: last.date,
            ma20: indicators::sma(&closes, 20).last().copied().and_then(usable),
            vol_ratio: None,
        })
    }
}

/// A proposed stop upgrade. Produced only when it raises the stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecommendation {
    pub symbol: String,
    pub old_stop: f64,
    pub new_stop: f64,
    pub old_level: ProtectionLevel,
    pub new_level: ProtectionLevel,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopReview {
    pub symbol: String,
    pub price: f64,
    pub r_multiple: f64,
    pub ladder: Option<LadderStep>,
    pub trailing_stop: Option<f64>,
    pub chop_stop: Option<f64>,
    pub highest_close: f64,
    pub recommendation: Option<StopRecommendation>,
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Source {
    Ladder,
    Trailing,
    Chop,
}

#[derive(Debug, Clone, Default)]
pub struct StopManager {
    config: StopConfig,
}

impl StopManager {
    pub fn new(config: StopConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StopConfig {
        &self.config
    }

    pub fn review(&self, position: &OpenPosition, ctx: &StopContext) -> Result<StopReview, EngineError> {
        validate(position, ctx)?;
        let cfg = &self.config;
        let atr = ctx.atr.and_then(usable);
        let price = ctx.price;

        let r_multiple = position.r_multiple(price);
        let ladder = next_step(position, price, atr, &cfg.ladder);
        let highest = highest_close(position, price);
        let trailing = trailing_stop(position, highest, atr, &cfg.trailing);
        let chop = if ctx.regime == MarketRegime::Sideways && !position.sleeve.is_etf() {
            chop_stop(price, atr, &cfg.chop)
        } else {
            None
        };

        let best = [
            (Source::Ladder, ladder.map(|s| s.stop)),
            (Source::Trailing, trailing),
            (Source::Chop, chop),
        ]
        .into_iter()
        .filter_map(|(source, stop)| stop.map(|s| (source, s)))
        .filter(|(_, s)| s.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1));

        let recommendation = best
            .filter(|(_, stop)| *stop > position.current_stop)
            .map(|(source, new_stop)| {
                let new_level = ladder.map_or(position.protection_level, |s| s.level);
                let reason = match source {
                    Source::Ladder => format!("R {r_multiple:.2} reached {new_level}"),
                    Source::Trailing => format!(
                        "trailing {:.1} ATR below highest close {highest:.2}",
                        cfg.trailing.atr_mult
                    ),
                    Source::Chop => format!("sideways regime: {:.1} ATR chop stop", cfg.chop.atr_mult),
                };
                StopRecommendation {
                    symbol: position.symbol.clone(),
                    old_stop: position.current_stop,
                    new_stop,
                    old_level: position.protection_level,
                    new_level,
                    reason,
                }
            });

        let advisories = advise(
            position,
            &AdvisoryInput {
                price,
                as_of: ctx.as_of,
                atr,
                ma20: ctx.ma20,
                vol_ratio: ctx.vol_ratio,
            },
            &cfg.advisory,
        );

        debug!(
            symbol = %position.symbol,
            r = r_multiple,
            recommended = recommendation.as_ref().map(|r| r.new_stop),
            advisories = advisories.len(),
            "Reviewed stop"
        );

        Ok(StopReview {
            symbol: position.symbol.clone(),
            price,
            r_multiple,
            ladder,
            trailing_stop: trailing,
            chop_stop: chop,
            highest_close: highest,
            recommendation,
            advisories,
        })
    }
}

fn validate(position: &OpenPosition, ctx: &StopContext) -> Result<(), EngineError> {
    if !(position.initial_risk.is_finite() && position.initial_risk > 0.0) {
        return Err(EngineError::invalid(
            "initial_risk",
            format!("{}: initial risk must be positive", position.symbol),
        ));
    }
    if !(position.entry_price.is_finite() && position.entry_price > 0.0) {
        return Err(EngineError::invalid(
            "entry_price",
            format!("{}: entry price must be positive", position.symbol),
        ));
    }
    if !position.current_stop.is_finite() {
        return Err(EngineError::invalid(
            "current_stop",
            format!("{}: current stop must be finite", position.symbol),
        ));
    }
    if !(ctx.price.is_finite() && ctx.price > 0.0) {
        return Err(EngineError::invalid(
            "price",
            format!("{}: price must be positive", position.symbol),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Sleeve;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn position() -> OpenPosition {
        OpenPosition::new("AAPL", date(), 100.0, 10.0, 90.0)
    }

    fn ctx(price: f64, atr: Option<f64>) -> StopContext {
        StopContext::new(price, atr, MarketRegime::Bullish, date())
    }

    fn no_trailing() -> StopManager {
        let mut cfg = StopConfig::default();
        cfg.trailing.enabled = false;
        StopManager::new(cfg)
    }

    #[test]
    fn below_first_rung_no_recommendation() {
        let review = no_trailing().review(&position(), &ctx(110.0, Some(2.0))).unwrap();
        assert!(review.recommendation.is_none());
        assert!((review.r_multiple - 1.0).abs() < 1e-12);
    }

    #[test]
    fn breakeven_recommended() {
        let review = no_trailing().review(&position(), &ctx(116.0, Some(2.0))).unwrap();
        let rec = review.recommendation.unwrap();
        assert_eq!(rec.new_stop, 100.0);
        assert_eq!(rec.new_level, ProtectionLevel::Breakeven);
        assert_eq!(rec.old_stop, 90.0);
    }

    #[test]
    fn trailing_wins_when_higher() {
        // highest 116, ATR 2 → trail 110 above the breakeven rung at 100
        let review = StopManager::default()
            .review(&position(), &ctx(116.0, Some(2.0)))
            .unwrap();
        let rec = review.recommendation.unwrap();
        assert_eq!(rec.new_stop, 110.0);
        assert_eq!(rec.new_level, ProtectionLevel::Breakeven);
        assert!(rec.reason.starts_with("trailing"));
    }

    #[test]
    fn trailing_alone_keeps_level() {
        let mut p = position();
        p.highest_close = Some(130.0);
        // R 1.2: no rung, trail 130 − 6 = 124
        let review = StopManager::default().review(&p, &ctx(112.0, Some(2.0))).unwrap();
        let rec = review.recommendation.unwrap();
        assert_eq!(rec.new_stop, 124.0);
        assert_eq!(rec.new_level, ProtectionLevel::Initial);
    }

    #[test]
    fn chop_applies_to_stocks_in_sideways() {
        let mut c = ctx(108.0, Some(2.0));
        c.regime = MarketRegime::Sideways;
        let review = no_trailing().review(&position(), &c).unwrap();
        assert_eq!(review.chop_stop, Some(105.0));
        assert_eq!(review.recommendation.unwrap().new_stop, 105.0);

        let mut etf = position();
        etf.sleeve = Sleeve::EtfCore;
        let review = no_trailing().review(&etf, &c).unwrap();
        assert_eq!(review.chop_stop, None);
        assert!(review.recommendation.is_none());
    }

    #[test]
    fn missing_atr_uses_lock_floor() {
        let review = no_trailing().review(&position(), &ctx(131.0, None)).unwrap();
        let rec = review.recommendation.unwrap();
        assert_eq!(rec.new_level, ProtectionLevel::Lock1RTrail);
        assert_eq!(rec.new_stop, 110.0);
    }

    #[test]
    fn zero_initial_risk_is_invalid() {
        let mut p = position();
        p.initial_risk = 0.0;
        let err = StopManager::default().review(&p, &ctx(110.0, None)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { field: "initial_risk", .. }));
    }

    #[test]
    fn context_from_bars_uses_shared_atr() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let bars = indicators::make_bars(&closes);
        let ctx = StopContext::from_bars(&bars, MarketRegime::Bullish, 14).unwrap();
        assert_eq!(ctx.price, 139.0);
        assert_eq!(ctx.atr, indicators::latest_atr(&bars, 14));
        assert!(ctx.atr.is_some());
        assert_eq!(StopContext::from_bars(&[], MarketRegime::Bullish, 14), None);
    }
}
