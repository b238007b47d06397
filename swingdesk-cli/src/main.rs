//! SwingDesk CLI: scan, stop review, risk budget, sizing and regime commands.
//!
//! Commands:
//! - `scan` - run the entry pipeline over a universe and print the report
//! - `stops` - review held positions' stops, optionally writing them back
//! - `budget` - current risk utilisation against the effective limits
//! - `size` - size a single entry
//! - `regime` - classify the configured benchmarks
//!
//! Results are JSON on stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use swingdesk_core::domain::{Bar, MarketRegime};
use swingdesk_core::sizing::{size_position, SizingRequest};
use swingdesk_runner::{
    apply_reviews, assess_regime, contexts_from_bars, contexts_from_snapshots, load_account,
    load_bars, load_correlations, load_exits, load_positions, load_snapshots, load_universe,
    review_stops, risk_budget, run_scan, stamp_regime, write_positions, BarHistorySource, DeskConfig,
    DeskInputs, DeskSource, RegimeAssessment, SnapshotSource, StaticSource,
};

#[derive(Parser)]
#[command(name = "swingdesk", about = "SwingDesk CLI: swing-trading rules engine")]
struct Cli {
    /// Desk configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where market data comes from.
#[derive(clap::Args)]
struct MarketData {
    /// Daily bars CSV (symbol,date,open,high,low,close,volume).
    #[arg(long, conflicts_with = "snapshots")]
    bars: Option<PathBuf>,

    /// Pre-computed snapshots JSON.
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Regime override (BULLISH, SIDEWAYS, BEARISH). Without benchmark bars
    /// the regime is UNKNOWN unless given here.
    #[arg(long)]
    regime: Option<MarketRegime>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scan pipeline over a universe.
    Scan {
        /// Universe file (TOML, CSV or JSON).
        #[arg(long)]
        universe: PathBuf,

        /// Account file (TOML or JSON).
        #[arg(long)]
        account: PathBuf,

        /// Open positions (CSV or JSON).
        #[arg(long)]
        positions: Option<PathBuf>,

        /// Exit history (CSV or JSON).
        #[arg(long)]
        exits: Option<PathBuf>,

        /// Pairwise correlations (CSV or JSON).
        #[arg(long)]
        correlations: Option<PathBuf>,

        #[command(flatten)]
        data: MarketData,

        /// Evaluation date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Print only sized candidates.
        #[arg(long, default_value_t = false)]
        tradeable_only: bool,
    },
    /// Review stops for held positions.
    Stops {
        /// Open positions (CSV or JSON).
        #[arg(long)]
        positions: PathBuf,

        #[command(flatten)]
        data: MarketData,

        /// Evaluation date for snapshot-based reviews. Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Write recommendations through the monotonic stop boundary.
        #[arg(long, default_value_t = false)]
        apply: bool,

        /// Where to persist updated positions. Defaults to --positions.
        #[arg(long, requires = "apply")]
        out: Option<PathBuf>,
    },
    /// Risk budget for the current book.
    Budget {
        #[arg(long)]
        account: PathBuf,

        #[arg(long)]
        positions: Option<PathBuf>,

        /// Benchmark bars, for momentum expansion.
        #[arg(long)]
        bars: Option<PathBuf>,
    },
    /// Size a single entry.
    Size {
        #[arg(long)]
        account: PathBuf,

        #[arg(long)]
        entry: f64,

        #[arg(long)]
        stop: f64,

        /// Percent of equity to risk. Defaults to the account profile.
        #[arg(long)]
        risk_pct: Option<f64>,

        /// FX multiplier to account currency.
        #[arg(long, default_value_t = 1.0)]
        fx: f64,

        /// Position value cap as a fraction of equity.
        #[arg(long)]
        value_cap: Option<f64>,

        /// Highest correlation against held positions.
        #[arg(long)]
        correlation: Option<f64>,
    },
    /// Classify the configured benchmarks.
    Regime {
        /// Daily bars CSV containing the benchmark symbols.
        #[arg(long)]
        bars: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = DeskConfig::load_or_default(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Scan {
            universe,
            account,
            positions,
            exits,
            correlations,
            data,
            as_of,
            tradeable_only,
        } => {
            let mut inputs = DeskInputs::new(
                parse_date(as_of.as_deref())?,
                load_universe(&universe).with_context(|| format!("Failed to load {}", universe.display()))?,
                load_account(&account).with_context(|| format!("Failed to load {}", account.display()))?,
            );
            if let Some(path) = positions {
                inputs.positions = load_positions(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?;
            }
            if let Some(path) = exits {
                inputs.exits =
                    load_exits(&path).with_context(|| format!("Failed to load {}", path.display()))?;
            }
            if let Some(path) = correlations {
                inputs.correlations = load_correlations(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?;
            }
            run_scan_cmd(&config, &inputs, &data, tradeable_only)
        }
        Commands::Stops {
            positions,
            data,
            as_of,
            apply,
            out,
        } => run_stops_cmd(&config, &positions, &data, as_of.as_deref(), apply, out.as_deref()),
        Commands::Budget {
            account,
            positions,
            bars,
        } => {
            let account =
                load_account(&account).with_context(|| format!("Failed to load {}", account.display()))?;
            let positions = match positions {
                Some(path) => load_positions(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => Vec::new(),
            };
            let regime = match bars {
                Some(path) => regime_from_bars(&config, &read_bars(&path)?)?,
                None => RegimeAssessment::unknown(),
            };
            let budget = risk_budget(&account, &positions, &regime.backdrop(), &config)?;
            print_json(&budget)
        }
        Commands::Size {
            account,
            entry,
            stop,
            risk_pct,
            fx,
            value_cap,
            correlation,
        } => {
            let account =
                load_account(&account).with_context(|| format!("Failed to load {}", account.display()))?;
            let request = SizingRequest {
                equity: account.equity,
                risk_pct: risk_pct.unwrap_or(account.profile.risk_per_trade_pct),
                entry,
                stop,
                fx,
                value_cap,
                correlation,
            };
            let result = size_position(&request, &config.sizing).context("Sizing rejected")?;
            print_json(&result)
        }
        Commands::Regime { bars } => {
            let assessment = regime_from_bars(&config, &read_bars(&bars)?)?;
            print_json(&assessment)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_date(s: Option<&str>) -> Result<NaiveDate> {
    match s {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{s}', expected YYYY-MM-DD")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn read_bars(path: &Path) -> Result<HashMap<String, Vec<Bar>>> {
    load_bars(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn regime_from_bars(config: &DeskConfig, bars: &HashMap<String, Vec<Bar>>) -> Result<RegimeAssessment> {
    let primary = &config.benchmark.primary;
    let Some(primary_bars) = bars.get(primary) else {
        bail!("benchmark '{primary}' not found in bars");
    };
    let secondary = match &config.benchmark.secondary {
        Some(sym) => match bars.get(sym) {
            Some(b) => Some(b.as_slice()),
            None => bail!("secondary benchmark '{sym}' not found in bars"),
        },
        None => None,
    };
    Ok(assess_regime(primary_bars, secondary, config))
}

/// Regime from bars when available, otherwise from the override.
fn resolve_regime(
    config: &DeskConfig,
    bars: Option<&HashMap<String, Vec<Bar>>>,
    override_regime: Option<MarketRegime>,
) -> Result<RegimeAssessment> {
    let mut assessment = match bars {
        Some(b) if b.contains_key(&config.benchmark.primary) => regime_from_bars(config, b)?,
        _ => RegimeAssessment::unknown(),
    };
    if let Some(regime) = override_regime {
        info!(regime = %regime, "Using regime override");
        assessment.regime = regime;
        assessment.stable = true;
    }
    Ok(assessment)
}

fn run_scan_cmd(config: &DeskConfig, inputs: &DeskInputs, data: &MarketData, tradeable_only: bool) -> Result<()> {
    let (source, regime): (Box<dyn SnapshotSource>, RegimeAssessment) = match (&data.bars, &data.snapshots) {
        (Some(path), _) => {
            let bars = read_bars(path)?;
            let regime = resolve_regime(config, Some(&bars), data.regime)?;
            let source = BarHistorySource::new(bars, config.technicals.clone())
                .with_benchmark(config.benchmark.primary.clone());
            (Box::new(source) as Box<dyn SnapshotSource>, regime)
        }
        (None, Some(path)) => {
            let snapshots =
                load_snapshots(path).with_context(|| format!("Failed to load {}", path.display()))?;
            let regime = resolve_regime(config, None, data.regime)?;
            (Box::new(StaticSource::new(snapshots)) as Box<dyn SnapshotSource>, regime)
        }
        (None, None) => bail!("one of --bars or --snapshots is required"),
    };

    let source = DeskSource::new(source, &config.collection);
    let scan = run_scan(&source, inputs, &regime, config)?;
    if let Some(stats) = source.cache_stats() {
        debug!(hits = stats.hits, misses = stats.misses, failures = stats.failures, "Snapshot cache");
    }
    if tradeable_only {
        let sized: Vec<_> = scan.report.tradeable().collect();
        print_json(&sized)
    } else {
        print_json(&scan)
    }
}

fn run_stops_cmd(
    config: &DeskConfig,
    positions_path: &Path,
    data: &MarketData,
    as_of: Option<&str>,
    apply: bool,
    out: Option<&Path>,
) -> Result<()> {
    let mut positions = load_positions(positions_path)
        .with_context(|| format!("Failed to load {}", positions_path.display()))?;

    let contexts = match (&data.bars, &data.snapshots) {
        (Some(path), _) => {
            let bars = read_bars(path)?;
            let regime = resolve_regime(config, Some(&bars), data.regime)?;
            contexts_from_bars(&positions, &bars, regime.regime, config)
        }
        (None, Some(path)) => {
            let mut snapshots =
                load_snapshots(path).with_context(|| format!("Failed to load {}", path.display()))?;
            if let Some(regime) = data.regime {
                stamp_regime(&mut snapshots, regime, true);
            }
            contexts_from_snapshots(&positions, &snapshots, parse_date(as_of)?)
        }
        (None, None) => bail!("one of --bars or --snapshots is required"),
    };

    let reviews = review_stops(&positions, &contexts, config)?;
    if !apply {
        return print_json(&reviews);
    }

    let changes = apply_reviews(&mut positions, &reviews)?;
    let target = out.unwrap_or(positions_path);
    write_positions(target, &positions).with_context(|| format!("Failed to write {}", target.display()))?;
    info!(changes = changes.len(), path = %target.display(), "Persisted stop changes");
    print_json(&changes)
}
