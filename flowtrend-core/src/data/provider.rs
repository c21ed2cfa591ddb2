//! Provider traits and the fetch error type.
//!
//! `PriceSource` and `FlowSource` abstract over the two external services so the
//! merger can be driven by HTTP clients, synthetic generators, or test mocks.
//! Caching sits above these traits; providers don't know about it.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{FlowRecord, PriceRecord};

/// A failed fetch. "The provider has nothing for this symbol" is NOT an error:
/// providers return an empty series for that.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("{provider} returned HTTP {status}")]
    Http { provider: String, status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("{provider} rejected the request: {message}")]
    Provider { provider: String, message: String },
}

/// Source of daily OHLCV bars.
pub trait PriceSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch daily bars for `symbol` over `[start, end]`, ordered by date.
    ///
    /// An unknown symbol or an empty range yields `Ok(vec![])`.
    fn fetch_price(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, FetchError>;
}

/// Source of raw institutional buy/sell records.
pub trait FlowSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch flow records for `symbol` over `[start, end]` in any order.
    fn fetch_flow(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FlowRecord>, FetchError>;
}

/// Map a transport-level reqwest error into a `FetchError`.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> FetchError {
    if let Some(status) = err.status() {
        return FetchError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
        };
    }
    FetchError::Network(format!("{provider}: {err}"))
}
