//! Fetch both series for a lookback window and align them on the price axis.
//!
//! Rules:
//! - the price series is authoritative: every price date appears exactly once,
//!   flow dates outside it are dropped
//! - both axes are reduced to zone-free calendar dates before the join
//! - missing flow cells are 0, and the strategy's flow column always exists
//! - an empty price series is `MergeOutcome::NoData`, never an error
//! - provider failures propagate untouched, tagged with the failing side

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::pivot::pivot_net_flows;
use super::table::{is_reserved_column, MergedBar, MergedTable};
use crate::data::{FetchError, FlowSource, PriceSource};
use crate::domain::{FlowRecord, LookbackWindow, PriceRecord};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("price fetch failed: {0}")]
    Price(#[source] FetchError),

    #[error("flow fetch failed: {0}")]
    Flow(#[source] FetchError),
}

/// Result of one merge: a table, or the normal "nothing to analyze" outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Data(MergedTable),
    NoData,
}

impl MergeOutcome {
    pub fn is_no_data(&self) -> bool {
        matches!(self, MergeOutcome::NoData)
    }

    pub fn into_table(self) -> Option<MergedTable> {
        match self {
            MergeOutcome::Data(table) => Some(table),
            MergeOutcome::NoData => None,
        }
    }
}

/// What to fetch: symbol, window, the day the window ends, and the flow
/// category the table must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub symbol: String,
    pub window: LookbackWindow,
    pub today: NaiveDate,
    pub flow_category: String,
}

impl MergeRequest {
    pub fn start(&self) -> NaiveDate {
        self.window.start_date(self.today)
    }

    pub fn end(&self) -> NaiveDate {
        self.today
    }
}

/// Fetch price then flow data for the request's window and merge them.
///
/// The flow source is not called when the price source has nothing.
pub fn fetch_merged(
    prices: &dyn PriceSource,
    flows: &dyn FlowSource,
    request: &MergeRequest,
) -> Result<MergeOutcome, MergeError> {
    let (start, end) = (request.start(), request.end());
    let symbol = request.symbol.as_str();

    let price_records = prices
        .fetch_price(symbol, start, end)
        .map_err(MergeError::Price)?;
    if price_records.is_empty() {
        info!(symbol, source = prices.name(), %start, %end, "price source returned no rows");
        return Ok(MergeOutcome::NoData);
    }

    let flow_records = flows
        .fetch_flow(symbol, start, end)
        .map_err(MergeError::Flow)?;
    if flow_records.is_empty() {
        warn!(symbol, source = flows.name(), "flow source returned no rows, net flow defaults to 0");
    }

    Ok(merge_records(
        symbol,
        &price_records,
        &flow_records,
        &request.flow_category,
    ))
}

/// Merge already-fetched records. Pure: no I/O, no clock.
pub fn merge_records(
    symbol: &str,
    prices: &[PriceRecord],
    flows: &[FlowRecord],
    flow_category: &str,
) -> MergeOutcome {
    if prices.is_empty() {
        return MergeOutcome::NoData;
    }

    let mut bars: Vec<MergedBar> = prices.iter().map(MergedBar::from).collect();
    // Stable sort: among equal dates the provider's first record stays first
    bars.sort_by_key(|b| b.date);
    let fetched = bars.len();
    bars.dedup_by_key(|b| b.date);
    if bars.len() < fetched {
        warn!(
            symbol,
            duplicates = fetched - bars.len(),
            "price series repeats calendar dates, keeping the first record of each"
        );
    }

    let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
    let pivot = pivot_net_flows(flows);

    let axis: HashSet<NaiveDate> = dates.iter().copied().collect();
    let dropped = pivot.dates().filter(|d| !axis.contains(d)).count();
    if dropped > 0 {
        debug!(symbol, dropped, "flow dates outside the price axis discarded");
    }

    let mut columns: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for category in pivot.categories() {
        if is_reserved_column(category) {
            warn!(symbol, category, "flow category shadows a fixed column, dropped");
            continue;
        }
        columns.insert(category.to_string(), pivot.column(category, &dates));
    }
    if !is_reserved_column(flow_category) {
        columns
            .entry(flow_category.to_string())
            .or_insert_with(|| vec![0; dates.len()]);
    }

    debug!(
        symbol,
        rows = bars.len(),
        categories = columns.len(),
        "merged price and flow series"
    );

    MergeOutcome::Data(MergedTable::from_aligned(symbol, bars, columns))
}
