//! Classification tags shared across components: sleeve, market regime,
//! volatility regime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse asset-class bucket. Each sleeve carries its own caps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sleeve {
    EtfCore,
    #[default]
    StockCore,
    StockHighRisk,
    Hedge,
}

impl Sleeve {
    pub const ALL: [Sleeve; 4] = [
        Sleeve::EtfCore,
        Sleeve::StockCore,
        Sleeve::StockHighRisk,
        Sleeve::Hedge,
    ];

    /// Hedge positions are excluded from every risk aggregate.
    pub fn is_hedge(self) -> bool {
        matches!(self, Sleeve::Hedge)
    }

    pub fn is_etf(self) -> bool {
        matches!(self, Sleeve::EtfCore)
    }

    /// Preference used by ranking and duplicate-underlying resolution.
    /// Higher wins: stocks first, then ETFs, then high-risk names.
    pub fn preference(self) -> u8 {
        match self {
            Sleeve::StockCore => 3,
            Sleeve::EtfCore => 2,
            Sleeve::StockHighRisk => 1,
            Sleeve::Hedge => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sleeve::EtfCore => "ETF_CORE",
            Sleeve::StockCore => "STOCK_CORE",
            Sleeve::StockHighRisk => "STOCK_HIGH_RISK",
            Sleeve::Hedge => "HEDGE",
        }
    }
}

impl fmt::Display for Sleeve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sleeve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETF_CORE" | "ETF" => Ok(Sleeve::EtfCore),
            "STOCK_CORE" | "CORE" => Ok(Sleeve::StockCore),
            "STOCK_HIGH_RISK" | "HIGH_RISK" => Ok(Sleeve::StockHighRisk),
            "HEDGE" => Ok(Sleeve::Hedge),
            other => Err(format!("unknown sleeve '{other}'")),
        }
    }
}

/// Market condition derived from a benchmark's position relative to its MA200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Bullish,
    Sideways,
    Bearish,
    #[default]
    Unknown,
}

impl MarketRegime {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketRegime::Bullish => "BULLISH",
            MarketRegime::Sideways => "SIDEWAYS",
            MarketRegime::Bearish => "BEARISH",
            MarketRegime::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Volatility regime tag supplied with the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolRegime {
    Low,
    #[default]
    Normal,
    High,
}

impl std::str::FromStr for VolRegime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(VolRegime::Low),
            "NORMAL" | "" => Ok(VolRegime::Normal),
            "HIGH" => Ok(VolRegime::High),
            other => Err(format!("unknown volatility regime '{other}'")),
        }
    }
}

impl std::str::FromStr for MarketRegime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BULLISH" => Ok(MarketRegime::Bullish),
            "SIDEWAYS" | "CHOP" => Ok(MarketRegime::Sideways),
            "BEARISH" => Ok(MarketRegime::Bearish),
            "UNKNOWN" | "" => Ok(MarketRegime::Unknown),
            other => Err(format!("unknown market regime '{other}'")),
        }
    }
}
