//! Desk configuration: every component's settings plus collection and
//! benchmark choices, loaded from one TOML file.
//!
//! All sections are optional. A missing section or field takes the
//! component default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use swingdesk_core::domain::RiskProfile;
use swingdesk_core::regime::RegimeConfig;
use swingdesk_core::risk::RiskConfig;
use swingdesk_core::scan::ScanConfig;
use swingdesk_core::scoring::ScoringConfig;
use swingdesk_core::sizing::SizingConfig;
use swingdesk_core::stops::StopConfig;
use swingdesk_core::technicals::TechnicalsConfig;
use swingdesk_core::EngineConfig;

/// Content hash of a configuration (blake3 hex).
pub type ConfigHash = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config value '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Snapshot collection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Lifetime of a cached snapshot, in seconds.
    pub cache_ttl_secs: u64,
    /// Wrap the source in the read-through cache.
    pub use_cache: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 900,
            use_cache: true,
        }
    }
}

/// Benchmarks for the regime and relative strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub primary: String,
    /// When set, the regime is the dual combination of both benchmarks.
    pub secondary: Option<String>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            primary: "SPY".to_string(),
            secondary: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub scoring: ScoringConfig,
    pub scan: ScanConfig,
    pub risk: RiskConfig,
    pub sizing: SizingConfig,
    pub stops: StopConfig,
    pub regime: RegimeConfig,
    pub technicals: TechnicalsConfig,
    pub collection: CollectionConfig,
    pub benchmark: BenchmarkConfig,
}

impl DeskConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = |v: f64| v.is_finite() && v > 0.0 && v <= 1.0;
        if !fraction(self.risk.cluster_cap) {
            return Err(ConfigError::invalid(
                "risk.cluster_cap",
                format!("{} is not in (0, 1]", self.risk.cluster_cap),
            ));
        }
        if !fraction(self.risk.sector_cap) {
            return Err(ConfigError::invalid(
                "risk.sector_cap",
                format!("{} is not in (0, 1]", self.risk.sector_cap),
            ));
        }
        if !(self.sizing.increment.is_finite() && self.sizing.increment > 0.0) {
            return Err(ConfigError::invalid(
                "sizing.increment",
                format!("{} must be positive", self.sizing.increment),
            ));
        }
        if !(self.regime.band.is_finite() && (0.0..1.0).contains(&self.regime.band)) {
            return Err(ConfigError::invalid(
                "regime.band",
                format!("{} is not in [0, 1)", self.regime.band),
            ));
        }
        let entry = &self.scan.entry;
        if !(entry.ready_pct.is_finite() && entry.watch_pct.is_finite()) || entry.ready_pct > entry.watch_pct {
            return Err(ConfigError::invalid(
                "scan.entry.ready_pct",
                format!(
                    "ready threshold {} must not exceed watch threshold {}",
                    entry.ready_pct, entry.watch_pct
                ),
            ));
        }
        if !(self.scoring.exposure_onset.is_finite() && (0.0..1.0).contains(&self.scoring.exposure_onset)) {
            return Err(ConfigError::invalid(
                "scoring.exposure_onset",
                format!("{} is not in [0, 1)", self.scoring.exposure_onset),
            ));
        }
        let momentum = &self.risk.momentum;
        if !(momentum.multiplier.is_finite() && momentum.multiplier >= 1.0) {
            return Err(ConfigError::invalid(
                "risk.momentum.multiplier",
                format!("{} must be at least 1", momentum.multiplier),
            ));
        }
        if !(momentum.ceiling_pct.is_finite() && momentum.ceiling_pct > 0.0) {
            return Err(ConfigError::invalid(
                "risk.momentum.ceiling_pct",
                format!("{} must be positive", momentum.ceiling_pct),
            ));
        }
        if !(self.risk.heat.premium.is_finite() && self.risk.heat.premium >= 0.0) {
            return Err(ConfigError::invalid(
                "risk.heat.premium",
                format!("{} must be non-negative", self.risk.heat.premium),
            ));
        }
        if !fraction(self.scan.swap.cap_fraction) {
            return Err(ConfigError::invalid(
                "scan.swap.cap_fraction",
                format!("{} is not in (0, 1]", self.scan.swap.cap_fraction),
            ));
        }
        if self.collection.use_cache && self.collection.cache_ttl_secs == 0 {
            return Err(ConfigError::invalid(
                "collection.cache_ttl_secs",
                "must be positive when the cache is enabled",
            ));
        }
        if self.benchmark.primary.trim().is_empty() {
            return Err(ConfigError::invalid("benchmark.primary", "empty symbol"));
        }
        Ok(())
    }

    /// Checks that need the account's risk profile alongside the config.
    pub fn validate_profile(&self, profile: &RiskProfile) -> Result<(), ConfigError> {
        let momentum = &self.risk.momentum;
        if momentum.enabled && momentum.ceiling_pct < profile.max_open_risk_pct {
            return Err(ConfigError::invalid(
                "risk.momentum.ceiling_pct",
                format!(
                    "expansion ceiling {}% is below the base open-risk limit {}%",
                    momentum.ceiling_pct, profile.max_open_risk_pct
                ),
            ));
        }
        if profile.risk_per_trade_pct > profile.max_open_risk_pct {
            return Err(ConfigError::invalid(
                "profile.risk_per_trade_pct",
                format!(
                    "{}% per trade exceeds the {}% open-risk limit",
                    profile.risk_per_trade_pct, profile.max_open_risk_pct
                ),
            ));
        }
        Ok(())
    }

    /// The engine-facing subset.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            scoring: self.scoring.clone(),
            scan: self.scan.clone(),
            risk: self.risk.clone(),
            sizing: self.sizing.clone(),
            stops: self.stops.clone(),
            regime: self.regime.clone(),
            technicals: self.technicals.clone(),
        }
    }

    /// Deterministic hash of the full configuration: identical configs share
    /// a hash, so reports can be traced to the settings that produced them.
    pub fn config_hash(&self) -> Result<ConfigHash, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
