//! Price record — one daily OHLCV bar as delivered by a price provider.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::TradingDay;

/// Daily OHLCV bar for a single symbol.
///
/// The timestamp keeps the provider's UTC offset; use [`PriceRecord::trading_date`]
/// when comparing against other series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceRecord {
    /// Build a record stamped at local midnight of `date` in the given offset.
    pub fn at_midnight(
        date: NaiveDate,
        offset: FixedOffset,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        let naive = date.and_time(chrono::NaiveTime::MIN);
        let timestamp = offset
            .from_local_datetime(&naive)
            .single()
            .unwrap_or_else(|| naive.and_utc().fixed_offset());
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Calendar date of this bar with time-zone information stripped.
    pub fn trading_date(&self) -> NaiveDate {
        self.timestamp.trading_day()
    }
}
