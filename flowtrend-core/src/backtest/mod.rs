//! Backtest engine: trend + flow confirmation signal, lookahead-safe returns,
//! equity curves, and summary metrics.

pub mod engine;
pub mod metrics;

pub use engine::{
    daily_returns, equity_curve, run_backtest, signals, strategy_returns, BacktestConfig,
    BacktestError, BacktestRow, BacktestTable,
};
pub use metrics::BacktestSummary;

/// Moving-average window used when none is configured.
pub const DEFAULT_MA_WINDOW: usize = 20;
