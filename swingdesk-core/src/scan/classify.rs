//! Entry trigger, initial stop and status classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::InstrumentSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    Ready,
    Watch,
    WaitPullback,
    Far,
}

impl CandidateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CandidateStatus::Ready => "READY",
            CandidateStatus::Watch => "WATCH",
            CandidateStatus::WaitPullback => "WAIT_PULLBACK",
            CandidateStatus::Far => "FAR",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far above the 20-day high the trigger sits, in ATRs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BufferMode {
    Fixed {
        atr_mult: f64,
    },
    /// `clamp(base − slope·ATR/close, min, max)`: calmer names get a wider
    /// buffer.
    Adaptive {
        base: f64,
        slope: f64,
        min: f64,
        max: f64,
    },
}

impl Default for BufferMode {
    fn default() -> Self {
        BufferMode::Fixed { atr_mult: 0.10 }
    }
}

impl BufferMode {
    pub fn adaptive() -> Self {
        BufferMode::Adaptive {
            base: 0.18,
            slope: 0.6,
            min: 0.05,
            max: 0.20,
        }
    }

    pub fn multiplier(&self, atr: f64, close: f64) -> f64 {
        match *self {
            BufferMode::Fixed { atr_mult } => atr_mult,
            BufferMode::Adaptive {
                base,
                slope,
                min,
                max,
            } => {
                let atr_frac = if close > 0.0 { atr / close } else { 0.0 };
                (base - slope * atr_frac).clamp(min, max)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    pub buffer: BufferMode,
    pub stop_atr_mult: f64,
    /// Distance (percent) at or below which a candidate is READY.
    pub ready_pct: f64,
    pub watch_pct: f64,
    /// Extension above the anchor (ATRs) beyond which a candidate must wait
    /// for a pullback.
    pub max_extension_atr: f64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            buffer: BufferMode::default(),
            stop_atr_mult: 1.5,
            ready_pct: 2.0,
            watch_pct: 3.0,
            max_extension_atr: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryLevels {
    pub trigger: f64,
    pub initial_stop: f64,
    pub buffer_mult: f64,
    /// (trigger − close) / close · 100. Negative once price is through the trigger.
    pub distance_pct: f64,
    pub extension_atr: f64,
}

pub fn entry_levels(snap: &InstrumentSnapshot, config: &EntryConfig) -> EntryLevels {
    let buffer_mult = config.buffer.multiplier(snap.atr, snap.close);
    let trigger = snap.high_20 + buffer_mult * snap.atr;
    EntryLevels {
        trigger,
        initial_stop: trigger - config.stop_atr_mult * snap.atr,
        buffer_mult,
        distance_pct: (trigger - snap.close) / snap.close * 100.0,
        extension_atr: snap.extension(),
    }
}

/// Slack on the percent thresholds, so a trigger exactly on one compares equal.
const THRESHOLD_EPS: f64 = 1e-9;

pub fn status_for(distance_pct: f64, extension_atr: f64, config: &EntryConfig) -> CandidateStatus {
    if extension_atr > config.max_extension_atr {
        CandidateStatus::WaitPullback
    } else if distance_pct <= config.ready_pct + THRESHOLD_EPS {
        CandidateStatus::Ready
    } else if distance_pct <= config.watch_pct + THRESHOLD_EPS {
        CandidateStatus::Watch
    } else {
        CandidateStatus::Far
    }
}

pub fn classify(snap: &InstrumentSnapshot, config: &EntryConfig) -> (CandidateStatus, EntryLevels) {
    let levels = entry_levels(snap, config);
    (
        status_for(levels.distance_pct, levels.extension_atr, config),
        levels,
    )
}
