//! Yahoo Finance price provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. Timestamps are returned
//! in the exchange's UTC offset (`meta.gmtoffset`) so the merger can strip the
//! zone and compare calendar dates.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.
//! No retries happen here: a failure is reported to the caller as-is.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{transport_error, FetchError, PriceSource};
use crate::domain::PriceRecord;

const PROVIDER: &str = "yahoo_finance";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    suffix: String,
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: "https://query2.finance.yahoo.com".to_string(),
            suffix: String::new(),
        })
    }

    /// Append an exchange suffix to every symbol (e.g. `.TW` turns `2330` into `2330.TW`).
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Point the provider at a different host (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The ticker actually sent to Yahoo.
    pub fn ticker(&self, symbol: &str) -> String {
        format!("{symbol}{}", self.suffix)
    }

    /// Build the chart API URL for a ticker and date range.
    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{}/v8/finance/chart/{ticker}?period1={start_ts}&period2={end_ts}&interval=1d",
            self.base_url
        )
    }

    /// Parse the chart API response into price records.
    fn parse_response(ticker: &str, resp: ChartResponse) -> Result<Vec<PriceRecord>, FetchError> {
        let Some(result) = resp.chart.result else {
            return match resp.chart.error {
                // Unknown ticker: nothing to analyze, not a failure
                Some(err) if err.code == "Not Found" => {
                    debug!(ticker, "yahoo reports symbol not found");
                    Ok(Vec::new())
                }
                Some(err) => Err(FetchError::Provider {
                    provider: PROVIDER.to_string(),
                    message: format!("{}: {}", err.code, err.description),
                }),
                None => Err(FetchError::ResponseFormat(
                    "empty result with no error".into(),
                )),
            };
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };

        let offset = data
            .meta
            .as_ref()
            .and_then(|m| m.gmtoffset)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());

        // No timestamps means no trading days in the requested range
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormat("no quote data".into()))?;

        let mut records = Vec::with_capacity(timestamps.len());
        let mut skipped = 0usize;

        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.with_timezone(&offset))
                .ok_or_else(|| FetchError::ResponseFormat(format!("invalid timestamp: {ts}")))?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // A bar without a close cannot carry a return
            let Some(close) = quote.close.get(i).copied().flatten() else {
                skipped += 1;
                continue;
            };

            records.push(PriceRecord {
                timestamp,
                open: open.unwrap_or(close),
                high: high.unwrap_or(close),
                low: low.unwrap_or(close),
                close,
                volume: volume.unwrap_or(0),
            });
        }

        if skipped > 0 {
            warn!(ticker, skipped, "dropped bars without a close price");
        }

        Ok(records)
    }
}

impl PriceSource for YahooProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch_price(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceRecord>, FetchError> {
        let ticker = self.ticker(symbol);
        let url = self.chart_url(&ticker, start, end);
        debug!(%ticker, %start, %end, "fetching price history");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = resp.status();
        // Yahoo answers unknown tickers with 404 and a chart error body
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::Http {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormat(format!("failed to parse response for {ticker}: {e}"))
        })?;

        let records = Self::parse_response(&ticker, chart)?;
        debug!(%ticker, rows = records.len(), "price history received");
        Ok(records)
    }
}
