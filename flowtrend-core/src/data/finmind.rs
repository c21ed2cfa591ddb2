//! FinMind institutional-investor flow provider.
//!
//! Reads the `TaiwanStockInstitutionalInvestorsBuySell` dataset: one line per
//! (date, investor category) with buy and sell share counts. Dates are plain
//! calendar dates with no zone attached.

use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::provider::{transport_error, FetchError, FlowSource};
use crate::domain::FlowRecord;

const PROVIDER: &str = "finmind";
const DATASET: &str = "TaiwanStockInstitutionalInvestorsBuySell";

#[derive(Debug, Deserialize)]
struct DatasetResponse {
    #[serde(default)]
    msg: String,
    status: u16,
    #[serde(default)]
    data: Vec<InstitutionalRow>,
}

#[derive(Debug, Deserialize)]
struct InstitutionalRow {
    date: String,
    name: String,
    buy: f64,
    sell: f64,
}

/// FinMind flow provider.
pub struct FinMindProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl FinMindProvider {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: "https://api.finmindtrade.com".to_string(),
            token: None,
        })
    }

    /// Authenticate requests (raises FinMind's anonymous rate limit).
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Point the provider at a different host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_response(resp: DatasetResponse) -> Result<Vec<FlowRecord>, FetchError> {
        if resp.status != 200 {
            return Err(FetchError::Provider {
                provider: PROVIDER.to_string(),
                message: format!("status {}: {}", resp.status, resp.msg),
            });
        }

        resp.data
            .into_iter()
            .map(|row| {
                let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                    FetchError::ResponseFormat(format!("bad flow date '{}': {e}", row.date))
                })?;
                Ok(FlowRecord::new(
                    date,
                    row.name,
                    row.buy.round() as i64,
                    row.sell.round() as i64,
                ))
            })
            .collect()
    }
}

impl FlowSource for FinMindProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn fetch_flow(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FlowRecord>, FetchError> {
        let url = format!("{}/api/v4/data", self.base_url);
        let start_s = start.format("%Y-%m-%d").to_string();
        let end_s = end.format("%Y-%m-%d").to_string();
        debug!(symbol, %start, %end, "fetching institutional flow");

        let mut request = self.client.get(&url).query(&[
            ("dataset", DATASET),
            ("data_id", symbol),
            ("start_date", start_s.as_str()),
            ("end_date", end_s.as_str()),
        ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().map_err(|e| transport_error(PROVIDER, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let body: DatasetResponse = resp.json().map_err(|e| {
            FetchError::ResponseFormat(format!("failed to parse flow response for {symbol}: {e}"))
        })?;

        let records = Self::parse_response(body)?;
        debug!(symbol, rows = records.len(), "institutional flow received");
        Ok(records)
    }
}
