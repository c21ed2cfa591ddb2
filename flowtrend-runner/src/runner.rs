//! Analysis runner: wires config, cache, merger and backtest together.
//!
//! The runner is the only place that knows about the cache. Providers and the
//! core stay pure; a cache failure of any kind degrades to a fresh fetch.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use flowtrend_core::backtest::{run_backtest, BacktestError, BacktestSummary, BacktestTable};
use flowtrend_core::data::{FlowSource, PriceSource};
use flowtrend_core::domain::LookbackWindow;
use flowtrend_core::merge::{fetch_merged, MergeError, MergeOutcome, MergeRequest, MergedTable};

use crate::cache::MergedTableCache;
use crate::config::{AnalysisConfig, ConfigError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Merge(#[from] MergeError),
    #[error("backtest error: {0}")]
    Backtest(#[from] BacktestError),
}

/// Current schema version for exported reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything produced by one completed analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub window: LookbackWindow,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub ma_window: usize,
    pub flow_category: String,
    /// BLAKE3 fingerprint of the merged table the backtest ran on.
    pub dataset_hash: String,
    pub from_cache: bool,
    pub summary: BacktestSummary,
    pub backtest: BacktestTable,
    #[serde(skip)]
    pub merged: Option<MergedTable>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Result of an analysis request.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// The price provider had nothing for the symbol. Not an error.
    NoData { symbol: String },
    Completed(Box<AnalysisReport>),
}

impl AnalysisOutcome {
    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Completed(report) => Some(report),
            AnalysisOutcome::NoData { .. } => None,
        }
    }
}

/// Where a merged table came from.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub outcome: MergeOutcome,
    pub from_cache: bool,
}

/// Drives one price source and one flow source, optionally through a cache.
pub struct Analyzer<'a> {
    prices: &'a dyn PriceSource,
    flows: &'a dyn FlowSource,
    cache: Option<&'a MergedTableCache>,
}

impl<'a> Analyzer<'a> {
    pub fn new(prices: &'a dyn PriceSource, flows: &'a dyn FlowSource) -> Self {
        Self {
            prices,
            flows,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Option<&'a MergedTableCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Fetch and merge, consulting the cache first.
    ///
    /// A cached table that lacks the requested flow category is treated as a
    /// miss. Fresh `Data` results are written back; `NoData` never is.
    pub fn load(&self, request: &MergeRequest) -> Result<LoadedTable, MergeError> {
        if let Some(table) = self.cached(request) {
            return Ok(LoadedTable {
                outcome: MergeOutcome::Data(table),
                from_cache: true,
            });
        }

        info!(
            symbol = %request.symbol,
            window = %request.window,
            prices = self.prices.name(),
            flows = self.flows.name(),
            "fetching"
        );
        let outcome = fetch_merged(self.prices, self.flows, request)?;

        if let (Some(cache), MergeOutcome::Data(table)) = (self.cache, &outcome) {
            if let Err(e) = cache.put(table, request.window) {
                warn!(symbol = %request.symbol, error = %e, "failed to write cache entry");
            }
        }

        Ok(LoadedTable {
            outcome,
            from_cache: false,
        })
    }

    fn cached(&self, request: &MergeRequest) -> Option<MergedTable> {
        let cache = self.cache?;
        match cache.get(&request.symbol, request.window) {
            Ok(Some(table)) if table.net_flow(&request.flow_category).is_some() => {
                debug!(symbol = %request.symbol, window = %request.window, "cache hit");
                Some(table)
            }
            Ok(Some(_)) => {
                debug!(
                    symbol = %request.symbol,
                    category = %request.flow_category,
                    "cached table lacks flow category, refetching"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(symbol = %request.symbol, error = %e, "cache read failed, refetching");
                None
            }
        }
    }

    /// Run the full analysis for `config` with the window ending on `today`.
    pub fn run(&self, config: &AnalysisConfig, today: NaiveDate) -> Result<AnalysisOutcome, RunError> {
        config.validate()?;
        let request = config.merge_request(today);
        let loaded = self.load(&request)?;

        let table = match loaded.outcome {
            MergeOutcome::NoData => {
                info!(symbol = %request.symbol, "no price data");
                return Ok(AnalysisOutcome::NoData {
                    symbol: request.symbol,
                });
            }
            MergeOutcome::Data(table) => table,
        };

        let backtest_config = config.backtest_config();
        let (backtest, summary) = run_backtest(&table, &backtest_config)?;

        info!(
            symbol = %request.symbol,
            rows = summary.rows,
            trade_days = summary.trade_days,
            total_return_pct = summary.total_return_pct,
            benchmark_return_pct = summary.benchmark_return_pct,
            from_cache = loaded.from_cache,
            "analysis complete"
        );

        Ok(AnalysisOutcome::Completed(Box::new(AnalysisReport {
            schema_version: SCHEMA_VERSION,
            symbol: request.symbol.clone(),
            window: request.window,
            start_date: request.start(),
            end_date: request.end(),
            ma_window: backtest_config.ma_window,
            flow_category: backtest_config.flow_category,
            dataset_hash: table.fingerprint(),
            from_cache: loaded.from_cache,
            summary,
            backtest,
            merged: Some(table),
        })))
    }
}

/// Convenience wrapper over [`Analyzer::run`].
pub fn run_analysis(
    config: &AnalysisConfig,
    prices: &dyn PriceSource,
    flows: &dyn FlowSource,
    cache: Option<&MergedTableCache>,
    today: NaiveDate,
) -> Result<AnalysisOutcome, RunError> {
    Analyzer::new(prices, flows).with_cache(cache).run(config, today)
}
