//! The merged table: price bars on the authoritative date axis plus one
//! zero-filled net-flow column per investor category.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::PriceRecord;
use crate::indicators::Sma;

/// Price columns of a merged table, in frame order.
pub const PRICE_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Derived columns of a backtest frame, besides `date` and `close`.
pub const BACKTEST_COLUMNS: [&str; 6] = [
    "ma",
    "daily_return",
    "signal",
    "strategy_return",
    "cum_market",
    "cum_strategy",
];

/// Whether `name` is taken by a fixed column and so cannot name a flow category.
pub fn is_reserved_column(name: &str) -> bool {
    PRICE_COLUMNS.contains(&name) || BACKTEST_COLUMNS.contains(&name)
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("flow column '{category}' has {actual} rows, expected {expected}")]
    ColumnLength {
        category: String,
        expected: usize,
        actual: usize,
    },

    #[error("dates are not strictly ascending at row {0}")]
    Unordered(usize),

    #[error("flow category '{0}' collides with a fixed column name")]
    ReservedName(String),

    #[error("frame conversion failed: {0}")]
    Frame(String),
}

/// One price row of the merged table, dated by its zone-stripped calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl From<&PriceRecord> for MergedBar {
    fn from(rec: &PriceRecord) -> Self {
        Self {
            date: rec.trading_date(),
            open: rec.open,
            high: rec.high,
            low: rec.low,
            close: rec.close,
            volume: rec.volume,
        }
    }
}

/// Price bars plus net-flow columns, all the same length.
///
/// Deserialization goes through [`MergedTable::new`], so a decoded table
/// upholds the same invariants as a constructed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMergedTable")]
pub struct MergedTable {
    symbol: String,
    bars: Vec<MergedBar>,
    flows: BTreeMap<String, Vec<i64>>,
}

impl MergedTable {
    /// Build a table, checking that dates ascend and every flow column matches
    /// the bar count.
    pub fn new(
        symbol: impl Into<String>,
        bars: Vec<MergedBar>,
        flows: BTreeMap<String, Vec<i64>>,
    ) -> Result<Self, TableError> {
        if let Some(i) = bars.windows(2).position(|w| w[0].date >= w[1].date) {
            return Err(TableError::Unordered(i + 1));
        }
        for (category, values) in &flows {
            if is_reserved_column(category) {
                return Err(TableError::ReservedName(category.clone()));
            }
            if values.len() != bars.len() {
                return Err(TableError::ColumnLength {
                    category: category.clone(),
                    expected: bars.len(),
                    actual: values.len(),
                });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
            flows,
        })
    }

    /// Assemble a table whose invariants the caller already guarantees.
    pub(crate) fn from_aligned(
        symbol: &str,
        bars: Vec<MergedBar>,
        flows: BTreeMap<String, Vec<i64>>,
    ) -> Self {
        debug_assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
        debug_assert!(flows.values().all(|v| v.len() == bars.len()));
        Self {
            symbol: symbol.to_string(),
            bars,
            flows,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[MergedBar] {
        &self.bars
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Net-flow column for `category`, if the table carries it.
    pub fn net_flow(&self, category: &str) -> Option<&[i64]> {
        self.flows.get(category).map(Vec::as_slice)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    pub fn flows(&self) -> &BTreeMap<String, Vec<i64>> {
        &self.flows
    }

    /// Moving average of close for chart overlays. All `None` for a zero window.
    pub fn ma_series(&self, window: usize) -> Vec<Option<f64>> {
        match Sma::new(window) {
            Some(sma) => sma.compute(&self.closes()),
            None => vec![None; self.len()],
        }
    }

    /// BLAKE3 content hash over symbol, bars and flow columns.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        for bar in &self.bars {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
        for (category, values) in &self.flows {
            hasher.update(category.as_bytes());
            for v in values {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Convert to a Polars frame: price columns followed by one column per category.
    pub fn to_dataframe(&self) -> Result<DataFrame, TableError> {
        let frame_err = |e: PolarsError| TableError::Frame(e.to_string());

        let mut columns = vec![
            date_column("date", &self.dates()).map_err(frame_err)?,
            Column::new("open".into(), self.bars.iter().map(|b| b.open).collect::<Vec<_>>()),
            Column::new("high".into(), self.bars.iter().map(|b| b.high).collect::<Vec<_>>()),
            Column::new("low".into(), self.bars.iter().map(|b| b.low).collect::<Vec<_>>()),
            Column::new("close".into(), self.closes()),
            Column::new(
                "volume".into(),
                self.bars.iter().map(|b| b.volume).collect::<Vec<_>>(),
            ),
        ];
        for (category, values) in &self.flows {
            columns.push(Column::new(category.as_str().into(), values.clone()));
        }

        DataFrame::new(columns).map_err(frame_err)
    }

    /// Rebuild a table from a frame produced by [`MergedTable::to_dataframe`].
    ///
    /// Every non-price column is read as an `i64` flow column.
    pub fn from_dataframe(symbol: impl Into<String>, df: &DataFrame) -> Result<Self, TableError> {
        let frame_err = |e: PolarsError| TableError::Frame(e.to_string());

        let date_ca = df.column("date").and_then(|c| c.date()).map_err(frame_err)?;
        let open_ca = df.column("open").and_then(|c| c.f64()).map_err(frame_err)?;
        let high_ca = df.column("high").and_then(|c| c.f64()).map_err(frame_err)?;
        let low_ca = df.column("low").and_then(|c| c.f64()).map_err(frame_err)?;
        let close_ca = df.column("close").and_then(|c| c.f64()).map_err(frame_err)?;
        let vol_ca = df.column("volume").and_then(|c| c.u64()).map_err(frame_err)?;

        let null_at = |name: &str, i: usize| TableError::Frame(format!("null {name} at row {i}"));

        let n = df.height();
        let mut bars = Vec::with_capacity(n);
        for i in 0..n {
            let days = date_ca.get(i).ok_or_else(|| null_at("date", i))?;
            bars.push(MergedBar {
                date: epoch() + chrono::Duration::days(i64::from(days)),
                open: open_ca.get(i).ok_or_else(|| null_at("open", i))?,
                high: high_ca.get(i).ok_or_else(|| null_at("high", i))?,
                low: low_ca.get(i).ok_or_else(|| null_at("low", i))?,
                close: close_ca.get(i).ok_or_else(|| null_at("close", i))?,
                volume: vol_ca.get(i).ok_or_else(|| null_at("volume", i))?,
            });
        }

        let mut flows = BTreeMap::new();
        for column in df.get_columns() {
            let name = column.name().as_str();
            if PRICE_COLUMNS.contains(&name) {
                continue;
            }
            let values: Vec<i64> = column
                .i64()
                .map_err(frame_err)?
                .into_iter()
                .map(|v| v.unwrap_or(0))
                .collect();
            flows.insert(name.to_string(), values);
        }

        Self::new(symbol, bars, flows)
    }
}

/// Unchecked wire form of [`MergedTable`].
#[derive(Deserialize)]
struct RawMergedTable {
    symbol: String,
    bars: Vec<MergedBar>,
    flows: BTreeMap<String, Vec<i64>>,
}

impl TryFrom<RawMergedTable> for MergedTable {
    type Error = TableError;

    fn try_from(raw: RawMergedTable) -> Result<Self, Self::Error> {
        Self::new(raw.symbol, raw.bars, raw.flows)
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Build a polars `Date` column from calendar dates.
pub(crate) fn date_column(name: &str, dates: &[NaiveDate]) -> PolarsResult<Column> {
    let days: Vec<i32> = dates
        .iter()
        .map(|d| (*d - epoch()).num_days() as i32)
        .collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}
