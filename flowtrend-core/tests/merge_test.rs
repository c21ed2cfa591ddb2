//! Integration tests for the data merger.
//!
//! Covers the alignment contract (price axis is authoritative), zero-filling,
//! time-zone stripping, and the split between "no data" and fetch failures.

use chrono::{Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use flowtrend_core::data::{FetchError, FlowSource, PriceSource};
use flowtrend_core::domain::{FlowRecord, LookbackWindow, PriceRecord};
use flowtrend_core::merge::{fetch_merged, merge_records, MergeError, MergeOutcome, MergeRequest};

const FOREIGN: &str = "Foreign_Investor";

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

fn taipei() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

fn price_on(date: NaiveDate, close: f64) -> PriceRecord {
    PriceRecord::at_midnight(date, taipei(), close, close + 1.0, close - 1.0, close, 1_000)
}

fn prices_from_closes(closes: &[f64]) -> Vec<PriceRecord> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| price_on(base_date() + Duration::days(i as i64), c))
        .collect()
}

// ── Mock providers ───────────────────────────────────────────────────

struct StaticPrices(Vec<PriceRecord>);

impl PriceSource for StaticPrices {
    fn name(&self) -> &str {
        "static_prices"
    }

    fn fetch_price(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, FetchError> {
        Ok(self.0.clone())
    }
}

struct FailingPrices;

impl PriceSource for FailingPrices {
    fn name(&self) -> &str {
        "failing_prices"
    }

    fn fetch_price(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, FetchError> {
        Err(FetchError::Http {
            provider: "failing_prices".into(),
            status: 503,
        })
    }
}

#[derive(Default)]
struct CountingFlows {
    records: Vec<FlowRecord>,
    calls: AtomicUsize,
}

impl FlowSource for CountingFlows {
    fn name(&self) -> &str {
        "counting_flows"
    }

    fn fetch_flow(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<FlowRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

struct UnreachableFlows;

impl FlowSource for UnreachableFlows {
    fn name(&self) -> &str {
        "unreachable_flows"
    }

    fn fetch_flow(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<FlowRecord>, FetchError> {
        Err(FetchError::Network("connection refused".into()))
    }
}

fn request() -> MergeRequest {
    MergeRequest {
        symbol: "2330".into(),
        window: LookbackWindow::HalfYear,
        today: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        flow_category: FOREIGN.into(),
    }
}

// ── Zero fill ────────────────────────────────────────────────────────

#[test]
fn empty_flow_series_yields_zero_column() {
    let prices = prices_from_closes(&[100.0, 102.0, 101.0, 105.0, 104.0]);
    let table = merge_records("2330", &prices, &[], FOREIGN).into_table().unwrap();

    assert_eq!(table.net_flow(FOREIGN).unwrap(), &[0, 0, 0, 0, 0]);
    assert_eq!(table.categories().count(), 1);
}

#[test]
fn configured_category_added_when_flow_lacks_it() {
    let prices = prices_from_closes(&[100.0, 101.0]);
    let flows = vec![FlowRecord::new(base_date(), "Investment_Trust", 50, 10)];
    let table = merge_records("2330", &prices, &flows, FOREIGN).into_table().unwrap();

    assert_eq!(table.net_flow(FOREIGN).unwrap(), &[0, 0]);
    assert_eq!(table.net_flow("Investment_Trust").unwrap(), &[40, 0]);
}

#[test]
fn partial_flow_fills_gaps_with_zero() {
    let prices = prices_from_closes(&[100.0, 101.0, 102.0, 103.0]);
    let flows = vec![
        FlowRecord::new(base_date() + Duration::days(1), FOREIGN, 300, 100),
        FlowRecord::new(base_date() + Duration::days(1), FOREIGN, 0, 50),
        FlowRecord::new(base_date() + Duration::days(3), FOREIGN, 0, 70),
    ];
    let table = merge_records("2330", &prices, &flows, FOREIGN).into_table().unwrap();
    assert_eq!(table.net_flow(FOREIGN).unwrap(), &[0, 150, 0, -70]);
}

// ── Alignment ────────────────────────────────────────────────────────

#[test]
fn flow_only_dates_are_dropped() {
    let prices = prices_from_closes(&[100.0, 101.0]);
    let flows = vec![
        FlowRecord::new(base_date() - Duration::days(1), FOREIGN, 999, 0),
        FlowRecord::new(base_date(), FOREIGN, 5, 0),
        FlowRecord::new(base_date() + Duration::days(10), FOREIGN, 999, 0),
    ];
    let table = merge_records("2330", &prices, &flows, FOREIGN).into_table().unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.net_flow(FOREIGN).unwrap(), &[5, 0]);
}

#[test]
fn zone_stripping_matches_local_midnight_with_naive_date() {
    // Midnight in Taipei is the previous day in UTC; a UTC-date join would miss it.
    let ts = taipei().with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    assert_eq!(ts.with_timezone(&Utc).date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let prices = vec![PriceRecord {
        timestamp: ts,
        open: 590.0,
        high: 593.0,
        low: 589.0,
        close: 593.0,
        volume: 26_059_058,
    }];
    let flows = vec![FlowRecord::new(
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        FOREIGN,
        23_178_000,
        20_134_000,
    )];

    let table = merge_records("2330", &prices, &flows, FOREIGN).into_table().unwrap();
    assert_eq!(table.dates(), vec![NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()]);
    assert_eq!(table.net_flow(FOREIGN).unwrap(), &[3_044_000]);
}

// ── No data vs failure ───────────────────────────────────────────────

#[test]
fn empty_price_series_is_no_data_and_skips_flow_fetch() {
    let flows = CountingFlows::default();
    let outcome = fetch_merged(&StaticPrices(vec![]), &flows, &request()).unwrap();

    assert_eq!(outcome, MergeOutcome::NoData);
    assert_eq!(flows.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn flow_connectivity_error_propagates_as_flow_failure() {
    let prices = StaticPrices(prices_from_closes(&[100.0, 101.0]));
    let err = fetch_merged(&prices, &UnreachableFlows, &request()).unwrap_err();

    assert!(matches!(err, MergeError::Flow(FetchError::Network(_))));
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn price_error_is_not_no_data() {
    let flows = CountingFlows::default();
    let err = fetch_merged(&FailingPrices, &flows, &request()).unwrap_err();

    assert!(matches!(err, MergeError::Price(FetchError::Http { status: 503, .. })));
    assert_eq!(flows.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn successful_fetch_calls_flow_once() {
    let prices = StaticPrices(prices_from_closes(&[100.0, 101.0, 102.0]));
    let flows = CountingFlows {
        records: vec![FlowRecord::new(base_date(), FOREIGN, 10, 3)],
        ..Default::default()
    };
    let table = fetch_merged(&prices, &flows, &request())
        .unwrap()
        .into_table()
        .unwrap();

    assert_eq!(flows.calls.load(Ordering::SeqCst), 1);
    assert_eq!(table.symbol(), "2330");
    assert_eq!(table.net_flow(FOREIGN).unwrap(), &[7, 0, 0]);
}

#[test]
fn request_window_ends_today() {
    let req = request();
    assert_eq!(req.end(), req.today);
    assert_eq!((req.end() - req.start()).num_days(), 180);
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    /// Merged dates are exactly the distinct price dates, ascending.
    #[test]
    fn merged_axis_equals_price_axis(
        price_offsets in prop::collection::vec(0i64..120, 1..60),
        flow_offsets in prop::collection::vec((-10i64..130, 0i64..1000, 0i64..1000), 0..80),
    ) {
        let prices: Vec<PriceRecord> = price_offsets
            .iter()
            .map(|&o| price_on(base_date() + Duration::days(o), 100.0))
            .collect();
        let flows: Vec<FlowRecord> = flow_offsets
            .iter()
            .map(|&(o, b, s)| FlowRecord::new(base_date() + Duration::days(o), FOREIGN, b, s))
            .collect();

        let table = merge_records("X", &prices, &flows, FOREIGN).into_table().unwrap();

        let expected: Vec<NaiveDate> = price_offsets
            .iter()
            .map(|&o| base_date() + Duration::days(o))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        prop_assert_eq!(table.dates(), expected);
        for values in table.flows().values() {
            prop_assert_eq!(values.len(), table.len());
        }
    }

    /// With no flow rows the flow column is all zeros and as long as the prices.
    #[test]
    fn zero_fill_without_flows(closes in prop::collection::vec(1.0..500.0_f64, 1..100)) {
        let prices = prices_from_closes(&closes);
        let table = merge_records("X", &prices, &[], FOREIGN).into_table().unwrap();
        let column = table.net_flow(FOREIGN).unwrap();
        prop_assert_eq!(column.len(), closes.len());
        prop_assert!(column.iter().all(|&v| v == 0));
    }
}
