//! FlowTrend Core — price/flow records, providers, data merger, backtest engine.
//!
//! This crate contains the analysis core:
//! - Domain types (price records, flow records, lookback windows)
//! - Provider traits plus Yahoo Finance and FinMind HTTP clients
//! - Data merger aligning flow onto the price date axis
//! - Vectorized trend + flow-confirmation backtest and its summary metrics
//!
//! The core keeps no process-wide state: every operation is a function of its
//! explicit inputs.

pub mod backtest;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod merge;

pub use backtest::{run_backtest, BacktestConfig, BacktestSummary, BacktestTable};
pub use domain::{FlowRecord, LookbackWindow, PriceRecord};
pub use merge::{fetch_merged, merge_records, MergeError, MergeOutcome, MergeRequest, MergedTable};
