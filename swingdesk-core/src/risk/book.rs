//! Ex-hedge aggregates of the open book, with pro-forma additions.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{OpenPosition, Sleeve};

/// Value and risk a single position (held or proposed) contributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exposure {
    pub symbol: String,
    pub sleeve: Sleeve,
    pub cluster: Option<String>,
    pub sector: Option<String>,
    /// Market value in account currency.
    pub value: f64,
    /// Open risk in account currency.
    pub risk: f64,
}

impl Exposure {
    pub fn from_position(position: &OpenPosition) -> Self {
        Self {
            symbol: position.symbol.clone(),
            sleeve: position.sleeve,
            cluster: position.cluster.clone(),
            sector: position.sector.clone(),
            value: position.market_value(),
            risk: position.open_risk(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Book {
    pub equity: f64,
    pub open_risk: f64,
    pub open_count: usize,
    pub invested: f64,
    pub by_sleeve: BTreeMap<Sleeve, f64>,
    pub by_cluster: BTreeMap<String, f64>,
    pub by_sector: BTreeMap<String, f64>,
    /// Every held symbol, hedges included.
    pub symbols: BTreeSet<String>,
}

impl Book {
    pub fn new(equity: f64, positions: &[OpenPosition]) -> Self {
        let mut book = Self {
            equity,
            ..Self::default()
        };
        for position in positions {
            book.add(&Exposure::from_position(position));
        }
        book
    }

    /// Add a position. Hedges are recorded as held but stay out of every
    /// aggregate.
    pub fn add(&mut self, exposure: &Exposure) {
        self.symbols.insert(exposure.symbol.clone());
        if exposure.sleeve.is_hedge() {
            return;
        }
        self.open_count += 1;
        self.open_risk += exposure.risk.max(0.0);
        self.invested += exposure.value;
        *self.by_sleeve.entry(exposure.sleeve).or_default() += exposure.value;
        if let Some(cluster) = &exposure.cluster {
            *self.by_cluster.entry(cluster.clone()).or_default() += exposure.value;
        }
        if let Some(sector) = &exposure.sector {
            *self.by_sector.entry(sector.clone()).or_default() += exposure.value;
        }
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn sleeve_value(&self, sleeve: Sleeve) -> f64 {
        self.by_sleeve.get(&sleeve).copied().unwrap_or(0.0)
    }

    pub fn cluster_value(&self, cluster: &str) -> f64 {
        self.by_cluster.get(cluster).copied().unwrap_or(0.0)
    }

    pub fn sector_value(&self, sector: &str) -> f64 {
        self.by_sector.get(sector).copied().unwrap_or(0.0)
    }
}
