//! Offline price and flow sources for development and demos.
//!
//! Both generators are deterministic per symbol: the RNG is seeded from a
//! BLAKE3 hash of the symbol, so repeated runs produce identical series.
//! Output is clearly fake and must never be mistaken for market data.

use chrono::{Datelike, FixedOffset, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use flowtrend_core::data::{FetchError, FlowSource, PriceSource};
use flowtrend_core::domain::{FlowRecord, PriceRecord};

/// Categories emitted by [`SyntheticFlows`].
pub const SYNTHETIC_CATEGORIES: [&str; 3] = ["Foreign_Investor", "Investment_Trust", "Dealer_self"];

const EXCHANGE_OFFSET_SECS: i32 = 8 * 3600;

fn rng_for(namespace: &str, symbol: &str) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(namespace.as_bytes());
    hasher.update(symbol.as_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

fn weekdays(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

/// Random-walk daily bars stamped at local midnight, UTC+8.
#[derive(Debug, Clone, Default)]
pub struct SyntheticPrices;

impl PriceSource for SyntheticPrices {
    fn name(&self) -> &str {
        "synthetic-prices"
    }

    fn fetch_price(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, FetchError> {
        let offset = FixedOffset::east_opt(EXCHANGE_OFFSET_SECS)
            .ok_or_else(|| FetchError::ResponseFormat("invalid exchange offset".into()))?;
        let mut rng = rng_for("price", symbol);
        let mut price = 100.0_f64;

        let bars = weekdays(start, end)
            .map(|date| {
                let daily_return: f64 = rng.gen_range(-0.03..0.03);
                let open = price;
                let close = price * (1.0 + daily_return);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
                let volume = rng.gen_range(500_000..5_000_000u64);
                price = close;
                PriceRecord::at_midnight(date, offset, open, high, low, close, volume)
            })
            .collect();
        Ok(bars)
    }
}

/// Per-category buy/sell records on weekdays, with roughly one day in twenty
/// left unreported so the merger's zero-fill path is exercised.
#[derive(Debug, Clone, Default)]
pub struct SyntheticFlows;

impl FlowSource for SyntheticFlows {
    fn name(&self) -> &str {
        "synthetic-flows"
    }

    fn fetch_flow(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FlowRecord>, FetchError> {
        let mut rng = rng_for("flow", symbol);
        let mut records = Vec::new();

        for date in weekdays(start, end) {
            if rng.gen_bool(0.05) {
                continue;
            }
            for category in SYNTHETIC_CATEGORIES {
                let buy = rng.gen_range(0..20_000_000i64);
                let sell = rng.gen_range(0..20_000_000i64);
                records.push(FlowRecord::new(date, category, buy, sell));
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowtrend_core::domain::TradingDay;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn prices_are_deterministic_per_symbol() {
        let a = SyntheticPrices.fetch_price("2330", d(2024, 1, 1), d(2024, 3, 1)).unwrap();
        let b = SyntheticPrices.fetch_price("2330", d(2024, 1, 1), d(2024, 3, 1)).unwrap();
        let c = SyntheticPrices.fetch_price("2317", d(2024, 1, 1), d(2024, 3, 1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn prices_skip_weekends_and_stay_in_range() {
        let bars = SyntheticPrices.fetch_price("2330", d(2024, 1, 1), d(2024, 1, 14)).unwrap();
        assert_eq!(bars.len(), 10);
        for bar in &bars {
            let day = bar.timestamp.trading_day();
            assert!(!matches!(day.weekday(), Weekday::Sat | Weekday::Sun));
            assert!(day >= d(2024, 1, 1) && day <= d(2024, 1, 14));
            assert!(bar.low <= bar.open.min(bar.close));
            assert!(bar.high >= bar.open.max(bar.close));
        }
    }

    #[test]
    fn flows_cover_every_category() {
        let flows = SyntheticFlows.fetch_flow("2330", d(2024, 1, 1), d(2024, 6, 30)).unwrap();
        for category in SYNTHETIC_CATEGORIES {
            assert!(flows.iter().any(|f| f.category == category));
        }
        assert_eq!(flows.len() % SYNTHETIC_CATEGORIES.len(), 0);
    }

    #[test]
    fn empty_range_yields_nothing() {
        assert!(SyntheticPrices
            .fetch_price("2330", d(2024, 1, 10), d(2024, 1, 9))
            .unwrap()
            .is_empty());
        assert!(SyntheticFlows
            .fetch_flow("2330", d(2024, 1, 6), d(2024, 1, 7))
            .unwrap()
            .is_empty());
    }
}
