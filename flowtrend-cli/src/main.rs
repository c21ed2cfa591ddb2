//! FlowTrend CLI — analysis and cache management commands.
//!
//! Commands:
//! - `analyze` — fetch prices and institutional flow, backtest, print the report
//! - `cache status` — list cached merged tables and whether they are still fresh
//! - `cache clear` — remove every cached table

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flowtrend_core::backtest::BacktestTable;
use flowtrend_core::data::{FinMindProvider, FlowSource, PriceSource, YahooProvider};
use flowtrend_core::domain::LookbackWindow;
use flowtrend_runner::{
    export_daily_csv, export_json, AnalysisConfig, AnalysisOutcome, AnalysisReport, Analyzer,
    MergedTableCache, SyntheticFlows, SyntheticPrices,
};

#[derive(Parser)]
#[command(
    name = "flowtrend",
    about = "FlowTrend CLI — trend plus institutional-flow backtests for a single equity"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, merge and backtest one symbol, then print the report.
    Analyze(AnalyzeArgs),
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Exchange-local symbol without suffix (e.g., 2330).
    symbol: String,

    /// Lookback window in calendar days: 180, 365, 730 or 1095.
    #[arg(long)]
    days: Option<u32>,

    /// Moving-average window in trading days.
    #[arg(long)]
    ma_window: Option<usize>,

    /// Flow category the signal keys on.
    #[arg(long)]
    flow_category: Option<String>,

    /// Path to a TOML config file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache directory. Defaults to ./data.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Bypass the fetch cache.
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Use deterministic synthetic data instead of the network.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Number of most recent daily rows to print.
    #[arg(long, default_value_t = 10)]
    rows: usize,

    /// Write the full daily table as CSV.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the full report as JSON.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached tables with their age and row counts.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,

        /// Freshness threshold in seconds.
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
    /// Remove every cached table.
    Clear {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(args),
        Commands::Cache { action } => match action {
            CacheAction::Status {
                cache_dir,
                ttl_secs,
            } => run_cache_status(&cache_dir, Duration::from_secs(ttl_secs)),
            CacheAction::Clear { cache_dir } => run_cache_clear(&cache_dir),
        },
    }
}

/// Layer command-line flags over the config file (or defaults).
fn build_config(args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    config.analysis.symbol = args.symbol.trim().to_string();
    if let Some(days) = args.days {
        config.analysis.lookback_days = LookbackWindow::try_from(days)?;
    }
    if let Some(ma_window) = args.ma_window {
        config.analysis.ma_window = ma_window;
    }
    if let Some(category) = &args.flow_category {
        config.analysis.flow_category = category.clone();
    }
    if let Some(dir) = &args.cache_dir {
        config.cache.dir = dir.clone();
    }
    if args.no_cache || args.synthetic {
        config.cache.enabled = false;
    }
    if config.providers.finmind_token.is_none() {
        config.providers.finmind_token = std::env::var("FINMIND_TOKEN").ok();
    }

    config.validate()?;
    Ok(config)
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = build_config(&args)?;
    let today = chrono::Local::now().date_naive();

    let (prices, flows): (Box<dyn PriceSource>, Box<dyn FlowSource>) = if args.synthetic {
        tracing::warn!("using synthetic data, results are not market data");
        (Box::new(SyntheticPrices), Box::new(SyntheticFlows))
    } else {
        let yahoo = YahooProvider::new(config.timeout())?
            .with_suffix(config.providers.price_suffix.clone());
        let finmind =
            FinMindProvider::new(config.timeout())?.with_token(config.providers.finmind_token.clone());
        (Box::new(yahoo), Box::new(finmind))
    };

    let cache = config
        .cache
        .enabled
        .then(|| {
            MergedTableCache::new(&config.cache.dir, config.cache_ttl())
                .with_source(config.cache_source())
        });

    let outcome = Analyzer::new(prices.as_ref(), flows.as_ref())
        .with_cache(cache.as_ref())
        .run(&config, today)?;

    let report = match outcome {
        AnalysisOutcome::NoData { symbol } => {
            println!("no data found for '{symbol}', verify the identifier");
            return Ok(());
        }
        AnalysisOutcome::Completed(report) => report,
    };

    print_summary(&report, args.synthetic);
    print_recent_rows(&report.backtest, args.rows);

    if let Some(path) = &args.csv {
        let csv = export_daily_csv(&report.backtest)?;
        std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Daily table saved to: {}", path.display());
    }
    if let Some(path) = &args.json {
        let json = export_json(&report)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &AnalysisReport, synthetic: bool) {
    let s = &report.summary;
    println!();
    println!("=== {} ({}) ===", report.symbol, report.window);
    println!(
        "Period:           {} to {}",
        report.start_date, report.end_date
    );
    println!(
        "Rows:             {} (MA {}, flow {})",
        s.rows, report.ma_window, report.flow_category
    );
    if report.from_cache {
        println!("Source:           cache");
    }
    println!();
    println!("--- Performance ---");
    println!("Strategy Return:  {:.2}%", s.total_return_pct);
    println!("Buy & Hold:       {:.2}%", s.benchmark_return_pct);
    println!("Excess Return:    {:+.2}%", s.excess_return_pct);
    println!("Trade Days:       {}", s.trade_days);
    println!("Win Rate:         {:.1}%", s.win_rate_pct);
    println!("Strategy Max DD:  {:.2}%", s.strategy_max_drawdown_pct);
    println!("Buy & Hold Max DD:{:.2}%", s.benchmark_max_drawdown_pct);
    if synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}

fn print_recent_rows(table: &BacktestTable, limit: usize) {
    if limit == 0 || table.is_empty() {
        return;
    }

    let fmt_opt = |v: Option<f64>| v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "-".into());

    println!(
        "{:<12} {:>10} {:>10} {:>14} {:>6} {:>9} {:>9}",
        "Date", "Close", "MA", "Net Flow", "Hold", "Strategy", "Market"
    );
    println!("{}", "-".repeat(76));
    for row in table.newest_first().take(limit) {
        println!(
            "{:<12} {:>10.2} {:>10} {:>14} {:>6} {:>9.4} {:>9.4}",
            row.date.to_string(),
            row.close,
            fmt_opt(row.ma),
            row.net_flow,
            if row.signal { "yes" } else { "no" },
            row.cum_strategy,
            row.cum_market,
        );
    }
    println!();
}

fn run_cache_status(cache_dir: &Path, ttl: Duration) -> Result<()> {
    let cache = MergedTableCache::new(cache_dir, ttl);
    if !cache.cache_dir().exists() {
        println!("Cache directory does not exist: {}", cache.cache_dir().display());
        return Ok(());
    }

    let entries = cache.entries()?;
    if entries.is_empty() {
        println!("Cache is empty: {}", cache.cache_dir().display());
        return Ok(());
    }

    let now = chrono::Utc::now();
    println!("Cache: {}", cache.cache_dir().display());
    println!("Entries: {} (fresh for {}s)", entries.len(), cache.ttl().as_secs());
    println!();
    println!(
        "{:<8} {:<7} {:<25} {:>6} {:<20} {:<6} {:<18}",
        "Symbol", "Window", "Date Range", "Rows", "Cached At (UTC)", "Fresh", "Source"
    );
    println!("{}", "-".repeat(97));
    for meta in &entries {
        let range = match (meta.start_date, meta.end_date) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "(empty)".into(),
        };
        println!(
            "{:<8} {:<7} {:<25} {:>6} {:<20} {:<6} {:<18}",
            meta.symbol,
            meta.window.to_string(),
            range,
            meta.rows,
            meta.cached_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            if meta.is_fresh(cache.ttl(), now) { "yes" } else { "no" },
            meta.source,
        );
    }

    Ok(())
}

fn run_cache_clear(cache_dir: &Path) -> Result<()> {
    let cache = MergedTableCache::new(cache_dir, Duration::ZERO);
    let removed = cache.clear()?;
    println!("Removed {removed} symbol(s) from {}", cache.cache_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Analyze(args) => args,
            Commands::Cache { .. } => panic!("expected analyze"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let args = analyze_args(&[
            "flowtrend",
            "analyze",
            "2317",
            "--days",
            "365",
            "--ma-window",
            "10",
            "--flow-category",
            "Investment_Trust",
            "--no-cache",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.analysis.symbol, "2317");
        assert_eq!(config.analysis.lookback_days, LookbackWindow::OneYear);
        assert_eq!(config.analysis.ma_window, 10);
        assert_eq!(config.analysis.flow_category, "Investment_Trust");
        assert!(!config.cache.enabled);
    }

    #[test]
    fn unsupported_days_is_rejected() {
        let args = analyze_args(&["flowtrend", "analyze", "2330", "--days", "90"]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn synthetic_disables_cache() {
        let args = analyze_args(&["flowtrend", "analyze", "2330", "--synthetic"]);
        let config = build_config(&args).unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(config.analysis.lookback_days, LookbackWindow::TwoYears);
    }

    #[test]
    fn cache_commands_parse() {
        let cli = Cli::try_parse_from(["flowtrend", "cache", "clear", "--cache-dir", "/tmp/x"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache {
                action: CacheAction::Clear { .. }
            }
        ));
    }
}
