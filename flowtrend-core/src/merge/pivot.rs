//! Pivot raw flow records into one net value per (date, category).

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::domain::{FlowRecord, TradingDay};

/// Net flow per category per date. Repeated (date, category) lines are summed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowPivot {
    columns: BTreeMap<String, HashMap<NaiveDate, i64>>,
}

impl FlowPivot {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Distinct category names, sorted.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Net flow for one cell; 0 when the provider reported nothing.
    pub fn value(&self, date: NaiveDate, category: &str) -> i64 {
        self.columns
            .get(category)
            .and_then(|col| col.get(&date))
            .copied()
            .unwrap_or(0)
    }

    /// Reindex one category onto `dates`, zero-filling gaps.
    pub fn column(&self, category: &str, dates: &[NaiveDate]) -> Vec<i64> {
        dates.iter().map(|d| self.value(*d, category)).collect()
    }

    /// Every date that carries at least one flow line.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let mut all: Vec<NaiveDate> = self
            .columns
            .values()
            .flat_map(|col| col.keys().copied())
            .collect();
        all.sort_unstable();
        all.dedup();
        all.into_iter()
    }
}

/// Compute `buy - sell` for each record and sum it by (date, category).
pub fn pivot_net_flows(records: &[FlowRecord]) -> FlowPivot {
    let mut columns: BTreeMap<String, HashMap<NaiveDate, i64>> = BTreeMap::new();
    for rec in records {
        *columns
            .entry(rec.category.clone())
            .or_default()
            .entry(rec.date.trading_day())
            .or_insert(0) += rec.net();
    }
    FlowPivot { columns }
}
