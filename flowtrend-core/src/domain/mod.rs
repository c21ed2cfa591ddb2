//! Domain types: price records, flow records, lookback windows, trading days.

pub mod flow;
pub mod price;
pub mod window;

pub use flow::FlowRecord;
pub use price::PriceRecord;
pub use window::{LookbackWindow, WindowError};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

/// Reduce a timestamp to the calendar date it falls on, ignoring its time zone.
///
/// Aware timestamps keep their *local* wall-clock date, so a bar stamped
/// `2024-01-02T00:00+08:00` is the trading day 2024-01-02 even though it is
/// 2024-01-01 in UTC. The two providers use different conventions, and this is
/// the only comparison both sides agree on.
pub trait TradingDay {
    fn trading_day(&self) -> NaiveDate;
}

impl TradingDay for NaiveDate {
    fn trading_day(&self) -> NaiveDate {
        *self
    }
}

impl TradingDay for NaiveDateTime {
    fn trading_day(&self) -> NaiveDate {
        self.date()
    }
}

impl<Tz: TimeZone> TradingDay for DateTime<Tz> {
    fn trading_day(&self) -> NaiveDate {
        self.naive_local().date()
    }
}
