//! Summary metrics — pure functions over a finished backtest table.
//!
//! Percentages are in percent units (12.5 means +12.5%). Degenerate inputs
//! (empty table, no held days) yield 0, never NaN.

use serde::{Deserialize, Serialize};

use super::engine::{BacktestRow, BacktestTable};

/// Headline numbers for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_return_pct: f64,
    pub benchmark_return_pct: f64,
    pub excess_return_pct: f64,
    pub trade_days: usize,
    pub win_rate_pct: f64,
    pub strategy_max_drawdown_pct: f64,
    pub benchmark_max_drawdown_pct: f64,
    pub rows: usize,
}

impl BacktestSummary {
    pub fn compute(table: &BacktestTable) -> Self {
        let strategy = table.strategy_curve();
        let market = table.market_curve();
        let strategy_pct = total_return_pct(&strategy);
        let benchmark_pct = total_return_pct(&market);
        Self {
            total_return_pct: strategy_pct,
            benchmark_return_pct: benchmark_pct,
            excess_return_pct: strategy_pct - benchmark_pct,
            trade_days: trade_days(&table.rows),
            win_rate_pct: win_rate_pct(&table.rows),
            strategy_max_drawdown_pct: max_drawdown(&strategy) * 100.0,
            benchmark_max_drawdown_pct: max_drawdown(&market) * 100.0,
            rows: table.len(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// `(last equity - 1) * 100`; 0 for an empty curve.
pub fn total_return_pct(equity_curve: &[f64]) -> f64 {
    equity_curve.last().map_or(0.0, |eq| (eq - 1.0) * 100.0)
}

/// Days the same-day signal says "hold".
pub fn trade_days(rows: &[BacktestRow]) -> usize {
    rows.iter().filter(|r| r.signal).count()
}

/// Winning held days over trade days, in percent.
///
/// A winning day is one entered on the previous day's signal whose realized
/// strategy return is positive. The denominator counts same-day signals
/// instead, so the numerator and denominator use different shifts; reported
/// figures depend on this exact pairing. 0 when there are no trade days.
pub fn win_rate_pct(rows: &[BacktestRow]) -> f64 {
    let days = trade_days(rows);
    if days == 0 {
        return 0.0;
    }
    let wins = rows
        .windows(2)
        .filter(|w| w[0].signal && w[1].strategy_return.is_some_and(|r| r > 0.0))
        .count();
    wins as f64 / days as f64 * 100.0
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}
