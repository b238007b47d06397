//! Input loading for the persistence collaborator's files.
//!
//! Format is chosen by extension:
//! - universe: `.toml` (`[[members]]`), `.csv`, `.json`
//! - positions, exits, correlations: `.csv`, `.json`
//! - account: `.toml`, `.json`
//! - snapshots: `.json` (array)
//! - bars: `.csv` (`symbol,date,open,high,low,close,volume`)

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use swingdesk_core::domain::{
    Account, Bar, ExitRecord, InstrumentSnapshot, OpenPosition, UniverseMember,
};
use swingdesk_core::sizing::CorrelationMatrix;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported format for {path}: expected {expected}")]
    UnsupportedFormat { path: PathBuf, expected: &'static str },

    #[error("invalid data in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
    Toml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Format::Csv),
            "json" => Some(Format::Json),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }
}

fn format_of(path: &Path, allowed: &[Format], expected: &'static str) -> Result<Format, LoadError> {
    match Format::from_path(path) {
        Some(f) if allowed.contains(&f) => Ok(f),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            expected,
        }),
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> LoadError {
    LoadError::Invalid {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()?;
    debug!(path = %path.display(), rows = rows.len(), "Read CSV");
    Ok(rows)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

// ── Universe ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct UniverseFile {
    #[serde(default)]
    members: Vec<UniverseMember>,
}

/// Scan universe. Duplicate symbols are rejected.
pub fn load_universe(path: impl AsRef<Path>) -> Result<Vec<UniverseMember>, LoadError> {
    let path = path.as_ref();
    let members: Vec<UniverseMember> =
        match format_of(path, &[Format::Toml, Format::Csv, Format::Json], "toml, csv or json")? {
            Format::Toml => read_toml::<UniverseFile>(path)?.members,
            Format::Csv => read_csv(path)?,
            Format::Json => read_json(path)?,
        };

    let mut seen = BTreeSet::new();
    for member in &members {
        if member.symbol.trim().is_empty() {
            return Err(invalid(path, "member with empty symbol"));
        }
        if !seen.insert(member.symbol.as_str()) {
            return Err(invalid(path, format!("duplicate symbol '{}'", member.symbol)));
        }
    }
    Ok(members)
}

// ── Positions ────────────────────────────────────────────────────────

pub fn load_positions(path: impl AsRef<Path>) -> Result<Vec<OpenPosition>, LoadError> {
    let path = path.as_ref();
    let positions: Vec<OpenPosition> = match format_of(path, &[Format::Csv, Format::Json], "csv or json")? {
        Format::Csv => read_csv(path)?,
        _ => read_json(path)?,
    };
    for p in &positions {
        if !(p.initial_risk.is_finite() && p.initial_risk > 0.0) {
            return Err(invalid(
                path,
                format!("{}: initial_risk must be positive, got {}", p.symbol, p.initial_risk),
            ));
        }
    }
    Ok(positions)
}

/// Persist positions after stop writes, in the format implied by the path.
pub fn write_positions(path: impl AsRef<Path>, positions: &[OpenPosition]) -> Result<(), LoadError> {
    let path = path.as_ref();
    match format_of(path, &[Format::Csv, Format::Json], "csv or json")? {
        Format::Csv => {
            let mut writer = csv::Writer::from_path(path)?;
            for p in positions {
                writer.serialize(p)?;
            }
            writer.flush()?;
        }
        _ => {
            let json = serde_json::to_string_pretty(positions)?;
            std::fs::write(path, json)?;
        }
    }
    debug!(path = %path.display(), count = positions.len(), "Wrote positions");
    Ok(())
}

// ── Account and exits ────────────────────────────────────────────────

pub fn load_account(path: impl AsRef<Path>) -> Result<Account, LoadError> {
    let path = path.as_ref();
    match format_of(path, &[Format::Toml, Format::Json], "toml or json")? {
        Format::Toml => read_toml(path),
        _ => read_json(path),
    }
}

pub fn load_exits(path: impl AsRef<Path>) -> Result<Vec<ExitRecord>, LoadError> {
    let path = path.as_ref();
    match format_of(path, &[Format::Csv, Format::Json], "csv or json")? {
        Format::Csv => read_csv(path),
        _ => read_json(path),
    }
}

// ── Market data ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRow {
    pub a: String,
    pub b: String,
    pub correlation: f64,
}

/// Pairwise correlations. Non-finite or out-of-range rows are skipped.
pub fn load_correlations(path: impl AsRef<Path>) -> Result<CorrelationMatrix, LoadError> {
    let path = path.as_ref();
    let rows: Vec<CorrelationRow> = match format_of(path, &[Format::Csv, Format::Json], "csv or json")? {
        Format::Csv => read_csv(path)?,
        _ => read_json(path)?,
    };
    let mut matrix = CorrelationMatrix::new();
    for row in rows {
        if !(row.correlation.is_finite() && (-1.0..=1.0).contains(&row.correlation)) {
            warn!(a = %row.a, b = %row.b, value = row.correlation, "Skipping invalid correlation");
            continue;
        }
        matrix.insert(&row.a, &row.b, row.correlation);
    }
    Ok(matrix)
}

/// Pre-computed snapshots (JSON array). Missing technicals load as NaN.
pub fn load_snapshots(path: impl AsRef<Path>) -> Result<Vec<InstrumentSnapshot>, LoadError> {
    let path = path.as_ref();
    format_of(path, &[Format::Json], "json")?;
    read_json(path)
}

/// Daily bars grouped by symbol, each series sorted by date with one bar
/// per date (the last row wins).
pub fn load_bars(path: impl AsRef<Path>) -> Result<HashMap<String, Vec<Bar>>, LoadError> {
    let path = path.as_ref();
    format_of(path, &[Format::Csv], "csv")?;
    let rows: Vec<Bar> = read_csv(path)?;

    let mut by_symbol: HashMap<String, Vec<Bar>> = HashMap::new();
    for bar in rows {
        if !bar.is_sane() {
            warn!(symbol = %bar.symbol, date = %bar.date, "Skipping malformed bar");
            continue;
        }
        by_symbol.entry(bar.symbol.clone()).or_default().push(bar);
    }
    for bars in by_symbol.values_mut() {
        bars.sort_by_key(|b| b.date);
        bars.reverse();
        bars.dedup_by_key(|b| b.date);
        bars.reverse();
    }
    Ok(by_symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use swingdesk_core::domain::{ExitKind, ProtectionLevel, Sleeve};

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn universe_from_toml_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = write(
            &dir,
            "universe.toml",
            r#"
                [[members]]
                symbol = "XLE"
                sleeve = "ETF_CORE"
                cluster = "ENERGY"

                [[members]]
                symbol = "AAPL"
            "#,
        );
        let members = load_universe(&toml_path).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].sleeve, Sleeve::EtfCore);
        assert_eq!(members[0].cluster.as_deref(), Some("ENERGY"));
        assert_eq!(members[1].sleeve, Sleeve::StockCore);

        let csv_path = write(
            &dir,
            "universe.csv",
            "symbol,sleeve,cluster,sector\nTQQQ,STOCK_HIGH_RISK,TECH,\nSH,HEDGE,,\n",
        );
        let members = load_universe(&csv_path).unwrap();
        assert_eq!(members[0].sleeve, Sleeve::StockHighRisk);
        assert_eq!(members[0].sector, None);
        assert_eq!(members[1].sleeve, Sleeve::Hedge);
        assert_eq!(members[1].cluster, None);
    }

    #[test]
    fn duplicate_universe_symbol_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "u.csv", "symbol,sleeve\nAAPL,STOCK_CORE\nAAPL,STOCK_CORE\n");
        assert!(matches!(load_universe(&path), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "positions.xlsx", "");
        assert!(matches!(
            load_positions(&path),
            Err(LoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn positions_csv_round_trip_through_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "positions.csv",
            "symbol,entry_date,entry_price,shares,initial_risk,current_stop,protection_level,last_price,sleeve\n\
             MSFT,2024-03-01,400.0,10,20.0,380.0,INITIAL,,STOCK_CORE\n\
             XLE,2024-02-15,90.0,50,4.5,90.0,BREAKEVEN,96.5,ETF_CORE\n",
        );
        let mut positions = load_positions(&path).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].last_price, None);
        assert_eq!(positions[0].adds_taken, 0);
        assert_eq!(positions[1].protection_level, ProtectionLevel::Breakeven);
        assert_eq!(positions[1].last_price, Some(96.5));

        positions[0].current_stop = 400.0;
        positions[0].protection_level = ProtectionLevel::Breakeven;
        let out = dir.path().join("out.csv");
        write_positions(&out, &positions).unwrap();
        let reloaded = load_positions(&out).unwrap();
        assert_eq!(reloaded, positions);
    }

    #[test]
    fn positions_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let positions = vec![OpenPosition::new("AAPL", date, 100.0, 25.0, 95.0)];
        let path = dir.path().join("positions.json");
        write_positions(&path, &positions).unwrap();
        assert_eq!(load_positions(&path).unwrap(), positions);
    }

    #[test]
    fn non_positive_initial_risk_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "positions.csv",
            "symbol,entry_date,entry_price,shares,initial_risk,current_stop\nBAD,2024-01-02,100,1,0,100\n",
        );
        assert!(matches!(load_positions(&path), Err(LoadError::Invalid { .. })));
    }

    #[test]
    fn account_from_toml_uses_profile_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "account.toml",
            "equity = 150000.0\n\n[profile]\nmax_positions = 6\n",
        );
        let account = load_account(&path).unwrap();
        assert_eq!(account.equity, 150_000.0);
        assert_eq!(account.currency, "USD");
        assert_eq!(account.profile.max_positions, 6);
        assert_eq!(account.profile.risk_per_trade_pct, 0.75);
    }

    #[test]
    fn exits_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "exits.csv",
            "symbol,exit_date,kind,r_multiple\nNVDA,2024-05-01,STOP_HIT,-1.0\n",
        );
        let exits = load_exits(&path).unwrap();
        assert_eq!(exits[0].kind, ExitKind::StopHit);
        assert_eq!(exits[0].r_multiple, -1.0);
    }

    #[test]
    fn correlations_skip_invalid_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "corr.csv",
            "a,b,correlation\nAAPL,MSFT,0.82\nAAPL,XLE,1.7\n",
        );
        let matrix = load_correlations(&path).unwrap();
        assert_eq!(matrix.get("MSFT", "AAPL"), Some(0.82));
        assert_eq!(matrix.get("AAPL", "XLE"), None);
    }

    #[test]
    fn snapshots_with_null_technicals_load_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "snapshots.json",
            r#"[{"symbol": "AAPL", "sleeve": "STOCK_CORE", "close": 190.0, "adx": null}]"#,
        );
        let snaps = load_snapshots(&path).unwrap();
        assert_eq!(snaps[0].close, 190.0);
        assert!(snaps[0].adx.is_nan());
        assert!(snaps[0].ma200.is_nan());
    }

    #[test]
    fn bars_grouped_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "bars.csv",
            "symbol,date,open,high,low,close,volume\n\
             SPY,2024-01-03,101,102,100,101.5,1000\n\
             SPY,2024-01-02,100,101,99,100.5,1000\n\
             QQQ,2024-01-02,400,401,399,400.5,500\n\
             SPY,2024-01-03,101,103,100,102.5,1200\n\
             SPY,2024-01-04,101,100,102,101,1000\n",
        );
        let bars = load_bars(&path).unwrap();
        let spy = &bars["SPY"];
        assert_eq!(spy.len(), 2);
        assert_eq!(spy[0].close, 100.5);
        assert_eq!(spy[1].close, 102.5);
        assert_eq!(bars["QQQ"].len(), 1);
    }
}
