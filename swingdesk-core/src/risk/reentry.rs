//! Re-entry discipline after exits: whipsaw blocks, profit cooldowns and the
//! fast-follower re-entry after a shake-out.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{ExitKind, ExitRecord, InstrumentSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReentryConfig {
    /// Stop-outs inside the window that trigger a whipsaw block.
    pub whipsaw_stops: usize,
    pub whipsaw_window_days: i64,
    pub whipsaw_block_days: i64,
    /// Exit R-multiple at or above which the cooldown applies.
    pub profit_threshold_r: f64,
    pub profit_cooldown_days: i64,
    pub fast_follower: FastFollowerConfig,
}

impl Default for ReentryConfig {
    fn default() -> Self {
        Self {
            whipsaw_stops: 2,
            whipsaw_window_days: 30,
            whipsaw_block_days: 60,
            profit_threshold_r: 0.5,
            profit_cooldown_days: 5,
            fast_follower: FastFollowerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastFollowerConfig {
    pub enabled: bool,
    /// Days after a stop-out during which a reclaim counts.
    pub window_days: i64,
    pub min_vol_ratio: f64,
    /// Close must be back at the prior 20-session high.
    pub require_new_high: bool,
}

impl Default for FastFollowerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_days: 10,
            min_vol_ratio: 2.0,
            require_new_high: true,
        }
    }
}

/// A stopped-out name reclaiming its high on heavy volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FastFollower {
    pub stopped_on: NaiveDate,
    pub days_since_exit: i64,
    pub vol_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReentryBlock {
    Whipsaw { until: NaiveDate },
    Cooldown { until: NaiveDate },
}

impl ReentryBlock {
    pub fn until(&self) -> NaiveDate {
        match self {
            ReentryBlock::Whipsaw { until } | ReentryBlock::Cooldown { until } => *until,
        }
    }
}

/// The block in force for `symbol` on `as_of`, if any. Whipsaw wins over a
/// cooldown. Exits dated after `as_of` are ignored.
pub fn reentry_block(
    symbol: &str,
    exits: &[ExitRecord],
    as_of: NaiveDate,
    config: &ReentryConfig,
) -> Option<ReentryBlock> {
    let mut history: Vec<&ExitRecord> = exits
        .iter()
        .filter(|e| e.symbol == symbol && e.exit_date <= as_of)
        .collect();
    history.sort_by_key(|e| e.exit_date);

    let stops: Vec<NaiveDate> = history
        .iter()
        .filter(|e| e.kind == ExitKind::StopHit)
        .map(|e| e.exit_date)
        .collect();
    let needed = config.whipsaw_stops.max(1);
    let whipsaw_until = stops
        .windows(needed)
        .filter(|w| (w[needed - 1] - w[0]).num_days() <= config.whipsaw_window_days)
        .map(|w| w[needed - 1] + Duration::days(config.whipsaw_block_days))
        .max();
    if let Some(until) = whipsaw_until.filter(|u| as_of < *u) {
        return Some(ReentryBlock::Whipsaw { until });
    }

    history
        .iter()
        .rev()
        .find(|e| e.r_multiple >= config.profit_threshold_r)
        .map(|e| e.exit_date + Duration::days(config.profit_cooldown_days))
        .filter(|until| as_of < *until)
        .map(|until| ReentryBlock::Cooldown { until })
}

/// Fast-follower eligibility for a name not currently held. Only the latest
/// exit on or before `as_of` counts, and it must be a stop-out.
pub fn fast_follower(
    symbol: &str,
    exits: &[ExitRecord],
    as_of: NaiveDate,
    snap: &InstrumentSnapshot,
    config: &FastFollowerConfig,
) -> Option<FastFollower> {
    if !config.enabled {
        return None;
    }
    let last = exits
        .iter()
        .filter(|e| e.symbol == symbol && e.exit_date <= as_of)
        .max_by_key(|e| e.exit_date)?;
    if last.kind != ExitKind::StopHit {
        return None;
    }
    let days_since_exit = (as_of - last.exit_date).num_days();
    if days_since_exit > config.window_days {
        return None;
    }
    if !(snap.close.is_finite() && snap.high_20.is_finite()) {
        return None;
    }
    if config.require_new_high && snap.close < snap.high_20 {
        return None;
    }
    if !(snap.vol_ratio.is_finite() && snap.vol_ratio >= config.min_vol_ratio) {
        return None;
    }
    Some(FastFollower {
        stopped_on: last.exit_date,
        days_since_exit,
        vol_ratio: snap.vol_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn exit(date: NaiveDate, kind: ExitKind, r: f64) -> ExitRecord {
        ExitRecord {
            symbol: "TSLA".into(),
            exit_date: date,
            kind,
            r_multiple: r,
        }
    }

    #[test]
    fn two_stops_in_window_block_for_sixty_days() {
        let exits = [
            exit(d(2024, 1, 5), ExitKind::StopHit, -1.0),
            exit(d(2024, 1, 25), ExitKind::StopHit, -1.0),
        ];
        let cfg = ReentryConfig::default();
        let block = reentry_block("TSLA", &exits, d(2024, 2, 10), &cfg);
        assert_eq!(
            block,
            Some(ReentryBlock::Whipsaw {
                until: d(2024, 3, 25)
            })
        );
        assert_eq!(reentry_block("TSLA", &exits, d(2024, 3, 25), &cfg), None);
    }

    #[test]
    fn stops_far_apart_do_not_whipsaw() {
        let exits = [
            exit(d(2024, 1, 5), ExitKind::StopHit, -1.0),
            exit(d(2024, 3, 5), ExitKind::StopHit, -1.0),
        ];
        assert_eq!(
            reentry_block("TSLA", &exits, d(2024, 3, 10), &ReentryConfig::default()),
            None
        );
    }

    #[test]
    fn profitable_exit_needs_cooldown() {
        let exits = [exit(d(2024, 5, 1), ExitKind::Target, 2.1)];
        let cfg = ReentryConfig::default();
        assert_eq!(
            reentry_block("TSLA", &exits, d(2024, 5, 3), &cfg),
            Some(ReentryBlock::Cooldown {
                until: d(2024, 5, 6)
            })
        );
        assert_eq!(reentry_block("TSLA", &exits, d(2024, 5, 6), &cfg), None);
    }

    fn reclaiming(close: f64, vol_ratio: f64) -> InstrumentSnapshot {
        InstrumentSnapshot {
            symbol: "TSLA".into(),
            close,
            high_20: 250.0,
            vol_ratio,
            ..InstrumentSnapshot::default()
        }
    }

    #[test]
    fn stop_out_reclaimed_on_volume_is_a_fast_follower() {
        let exits = [exit(d(2024, 5, 1), ExitKind::StopHit, -1.0)];
        let cfg = FastFollowerConfig::default();
        let ff = fast_follower("TSLA", &exits, d(2024, 5, 8), &reclaiming(251.0, 2.4), &cfg).unwrap();
        assert_eq!(ff.stopped_on, d(2024, 5, 1));
        assert_eq!(ff.days_since_exit, 7);

        // Window is inclusive.
        assert!(fast_follower("TSLA", &exits, d(2024, 5, 11), &reclaiming(251.0, 2.4), &cfg).is_some());
        assert!(fast_follower("TSLA", &exits, d(2024, 5, 12), &reclaiming(251.0, 2.4), &cfg).is_none());
    }

    #[test]
    fn fast_follower_needs_high_and_volume() {
        let exits = [exit(d(2024, 5, 1), ExitKind::StopHit, -1.0)];
        let cfg = FastFollowerConfig::default();
        let as_of = d(2024, 5, 6);
        assert!(fast_follower("TSLA", &exits, as_of, &reclaiming(249.0, 3.0), &cfg).is_none());
        assert!(fast_follower("TSLA", &exits, as_of, &reclaiming(251.0, 1.9), &cfg).is_none());
        assert!(fast_follower("TSLA", &exits, as_of, &reclaiming(251.0, f64::NAN), &cfg).is_none());

        let loose = FastFollowerConfig {
            require_new_high: false,
            ..cfg
        };
        assert!(fast_follower("TSLA", &exits, as_of, &reclaiming(249.0, 3.0), &loose).is_some());
    }

    #[test]
    fn only_the_latest_exit_counts() {
        let exits = [
            exit(d(2024, 5, 1), ExitKind::StopHit, -1.0),
            exit(d(2024, 5, 4), ExitKind::Target, 2.0),
        ];
        let cfg = FastFollowerConfig::default();
        assert!(fast_follower("TSLA", &exits, d(2024, 5, 6), &reclaiming(251.0, 3.0), &cfg).is_none());
        // An exit after the scan date is ignored.
        assert!(fast_follower("TSLA", &exits, d(2024, 5, 3), &reclaiming(251.0, 3.0), &cfg).is_some());
    }

    #[test]
    fn other_symbols_and_small_wins_ignored() {
        let exits = [
            exit(d(2024, 5, 1), ExitKind::Manual, 0.3),
            ExitRecord {
                symbol: "AAPL".into(),
                ..exit(d(2024, 5, 1), ExitKind::Target, 3.0)
            },
        ];
        assert_eq!(
            reentry_block("TSLA", &exits, d(2024, 5, 2), &ReentryConfig::default()),
            None
        );
    }
}
