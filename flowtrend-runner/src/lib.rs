//! FlowTrend Runner — configuration, fetch cache, analysis runner, export.
//!
//! This crate builds on `flowtrend-core` to provide:
//! - TOML analysis configuration with validation
//! - A Parquet TTL cache for merged tables
//! - The analysis runner (cache → fetch → merge → backtest)
//! - JSON and CSV report export
//! - Deterministic synthetic providers for offline use

pub mod cache;
pub mod config;
pub mod export;
pub mod runner;
pub mod synthetic;

pub use cache::{CacheError, CacheMeta, MergedTableCache};
pub use config::{AnalysisConfig, ConfigError};
pub use export::{export_daily_csv, export_json, import_json};
pub use runner::{run_analysis, AnalysisOutcome, AnalysisReport, Analyzer, RunError};
pub use synthetic::{SyntheticFlows, SyntheticPrices};
