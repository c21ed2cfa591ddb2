//! Flow record — one raw institutional buy/sell report line.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Buy and sell volume attributed to one investor category on one date.
///
/// A provider may report the same category several times for a date (one line
/// per sub-report); the merger sums them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub date: NaiveDate,
    pub category: String,
    pub buy: i64,
    pub sell: i64,
}

impl FlowRecord {
    pub fn new(date: NaiveDate, category: impl Into<String>, buy: i64, sell: i64) -> Self {
        Self {
            date,
            category: category.into(),
            buy,
            sell,
        }
    }

    /// Net flow: buy minus sell.
    pub fn net(&self) -> i64 {
        self.buy - self.sell
    }
}
