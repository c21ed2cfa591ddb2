//! Vectorized single-asset backtest.
//!
//! Every step is a pure function over columns so each stage can be tested in
//! isolation. Undefined values are `None`; nothing here produces NaN.
//!
//! Lookahead invariant: the return realized on day t is gated by the signal of
//! day t-1. A signal computed from day t's close and flow can only affect
//! day t+1 onward.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::metrics::BacktestSummary;
use super::DEFAULT_MA_WINDOW;
use crate::indicators::Sma;
use crate::merge::table::date_column;
use crate::merge::{is_reserved_column, MergedTable, TableError, DEFAULT_FLOW_CATEGORY};

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("moving-average window must be at least 1")]
    InvalidWindow,

    #[error("merged table has no '{0}' flow column")]
    MissingFlowColumn(String),

    #[error("flow category '{0}' collides with a fixed column name")]
    ReservedFlowCategory(String),
}

/// Strategy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub ma_window: usize,
    pub flow_category: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            ma_window: DEFAULT_MA_WINDOW,
            flow_category: DEFAULT_FLOW_CATEGORY.to_string(),
        }
    }
}

/// One row of the backtest table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRow {
    pub date: NaiveDate,
    pub close: f64,
    pub net_flow: i64,
    pub ma: Option<f64>,
    pub daily_return: Option<f64>,
    /// Hold signal decided at this row's close.
    pub signal: bool,
    /// Return realized on this row, gated by the previous row's signal.
    pub strategy_return: Option<f64>,
    pub cum_market: f64,
    pub cum_strategy: f64,
}

/// Backtest rows in date order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTable {
    pub symbol: String,
    pub ma_window: usize,
    pub flow_category: String,
    pub rows: Vec<BacktestRow>,
}

impl BacktestTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn strategy_curve(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.cum_strategy).collect()
    }

    pub fn market_curve(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.cum_market).collect()
    }

    /// Rows newest first, as shown in the daily detail view.
    pub fn newest_first(&self) -> impl Iterator<Item = &BacktestRow> {
        self.rows.iter().rev()
    }

    /// Convert to a Polars frame. Undefined values become nulls.
    pub fn to_dataframe(&self) -> Result<DataFrame, TableError> {
        let frame_err = |e: PolarsError| TableError::Frame(e.to_string());
        let dates: Vec<NaiveDate> = self.rows.iter().map(|r| r.date).collect();

        DataFrame::new(vec![
            date_column("date", &dates).map_err(frame_err)?,
            Column::new("close".into(), self.rows.iter().map(|r| r.close).collect::<Vec<_>>()),
            Column::new(
                self.flow_category.as_str().into(),
                self.rows.iter().map(|r| r.net_flow).collect::<Vec<_>>(),
            ),
            Column::new("ma".into(), self.rows.iter().map(|r| r.ma).collect::<Vec<_>>()),
            Column::new(
                "daily_return".into(),
                self.rows.iter().map(|r| r.daily_return).collect::<Vec<_>>(),
            ),
            Column::new(
                "signal".into(),
                self.rows.iter().map(|r| i32::from(r.signal)).collect::<Vec<_>>(),
            ),
            Column::new(
                "strategy_return".into(),
                self.rows.iter().map(|r| r.strategy_return).collect::<Vec<_>>(),
            ),
            Column::new("cum_market".into(), self.market_curve()),
            Column::new("cum_strategy".into(), self.strategy_curve()),
        ])
        .map_err(frame_err)
    }
}

/// Close-over-close percentage change. Row 0 has none; a non-finite ratio
/// (zero previous close) is treated as undefined.
pub fn daily_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(closes.windows(2).map(|w| {
        let r = w[1] / w[0] - 1.0;
        r.is_finite().then_some(r)
    }));
    out
}

/// Hold when close is strictly above its MA and net flow is strictly positive.
pub fn signals(closes: &[f64], ma: &[Option<f64>], net_flow: &[i64]) -> Vec<bool> {
    closes
        .iter()
        .zip(ma)
        .zip(net_flow)
        .map(|((&close, ma), &flow)| ma.is_some_and(|m| close > m) && flow > 0)
        .collect()
}

/// `signal[t-1] * daily_return[t]`; row 0 has no prior signal.
pub fn strategy_returns(signals: &[bool], daily: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(daily.len());
    if daily.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(
        signals
            .iter()
            .zip(daily.iter().skip(1))
            .map(|(&held, r)| r.map(|r| if held { r } else { 0.0 })),
    );
    out
}

/// Running product of `1 + r`, undefined entries contributing a factor of 1.
pub fn equity_curve(returns: &[Option<f64>]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0_f64, |equity, r| {
            *equity *= 1.0 + r.unwrap_or(0.0);
            Some(*equity)
        })
        .collect()
}

/// Run the strategy over a merged table.
pub fn run_backtest(
    table: &MergedTable,
    config: &BacktestConfig,
) -> Result<(BacktestTable, BacktestSummary), BacktestError> {
    let sma = Sma::new(config.ma_window).ok_or(BacktestError::InvalidWindow)?;
    if is_reserved_column(&config.flow_category) {
        return Err(BacktestError::ReservedFlowCategory(
            config.flow_category.clone(),
        ));
    }
    let net_flow = table
        .net_flow(&config.flow_category)
        .ok_or_else(|| BacktestError::MissingFlowColumn(config.flow_category.clone()))?;

    let closes = table.closes();
    let ma = sma.compute(&closes);
    let daily = daily_returns(&closes);
    let held = signals(&closes, &ma, net_flow);
    let strat = strategy_returns(&held, &daily);
    let cum_market = equity_curve(&daily);
    let cum_strategy = equity_curve(&strat);

    let rows: Vec<BacktestRow> = table
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| BacktestRow {
            date: bar.date,
            close: bar.close,
            net_flow: net_flow[i],
            ma: ma[i],
            daily_return: daily[i],
            signal: held[i],
            strategy_return: strat[i],
            cum_market: cum_market[i],
            cum_strategy: cum_strategy[i],
        })
        .collect();

    let result = BacktestTable {
        symbol: table.symbol().to_string(),
        ma_window: config.ma_window,
        flow_category: config.flow_category.clone(),
        rows,
    };
    let summary = BacktestSummary::compute(&result);

    debug!(
        symbol = %result.symbol,
        rows = result.len(),
        trade_days = summary.trade_days,
        "backtest complete"
    );

    Ok((result, summary))
}
