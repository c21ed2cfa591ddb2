//! Report export: JSON summary and the daily table as CSV.

use anyhow::{bail, Context, Result};

use flowtrend_core::backtest::BacktestTable;

use crate::runner::{AnalysisReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a report (summary plus daily rows) to pretty JSON.
pub fn export_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize AnalysisReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<AnalysisReport> {
    let report: AnalysisReport =
        serde_json::from_str(json).context("failed to deserialize AnalysisReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the daily backtest table in date order.
///
/// Columns: date, close, `<flow category>`, ma, daily_return, signal,
/// strategy_return, cum_market, cum_strategy. Undefined values are empty cells.
pub fn export_daily_csv(table: &BacktestTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "date",
        "close",
        table.flow_category.as_str(),
        "ma",
        "daily_return",
        "signal",
        "strategy_return",
        "cum_market",
        "cum_strategy",
    ])?;

    let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for row in &table.rows {
        wtr.write_record([
            row.date.to_string(),
            row.close.to_string(),
            row.net_flow.to_string(),
            opt(row.ma),
            opt(row.daily_return),
            u8::from(row.signal).to_string(),
            opt(row.strategy_return),
            row.cum_market.to_string(),
            row.cum_strategy.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
