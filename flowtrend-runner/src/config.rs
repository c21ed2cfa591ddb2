//! Serializable analysis configuration (TOML).
//!
//! ```toml
//! [analysis]
//! symbol = "2330"
//! lookback_days = 730
//! ma_window = 20
//! flow_category = "Foreign_Investor"
//!
//! [providers]
//! price_suffix = ".TW"
//! timeout_secs = 30
//!
//! [cache]
//! enabled = true
//! dir = "data"
//! ttl_secs = 3600
//! ```
//!
//! Every key is optional; omitted keys take the defaults above.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use flowtrend_core::backtest::{BacktestConfig, DEFAULT_MA_WINDOW};
use flowtrend_core::domain::LookbackWindow;
use flowtrend_core::merge::{is_reserved_column, MergeRequest, DEFAULT_FLOW_CATEGORY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub analysis: AnalysisSection,
    pub providers: ProviderSection,
    pub cache: CacheSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    pub symbol: String,
    pub lookback_days: LookbackWindow,
    pub ma_window: usize,
    pub flow_category: String,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            symbol: "2330".to_string(),
            lookback_days: LookbackWindow::default(),
            ma_window: DEFAULT_MA_WINDOW,
            flow_category: DEFAULT_FLOW_CATEGORY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Exchange suffix appended to the symbol for the price provider.
    pub price_suffix: String,
    pub finmind_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            price_suffix: ".TW".to_string(),
            finmind_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("data"),
            ttl_secs: 3600,
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.analysis;
        if a.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("analysis.symbol is empty".into()));
        }
        if !a.symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "analysis.symbol '{}' must be alphanumeric",
                a.symbol
            )));
        }
        if a.ma_window == 0 {
            return Err(ConfigError::Invalid("analysis.ma_window must be >= 1".into()));
        }
        if a.flow_category.trim().is_empty() {
            return Err(ConfigError::Invalid("analysis.flow_category is empty".into()));
        }
        if is_reserved_column(&a.flow_category) {
            return Err(ConfigError::Invalid(format!(
                "analysis.flow_category '{}' collides with a table column",
                a.flow_category
            )));
        }
        if self.providers.timeout_secs == 0 {
            return Err(ConfigError::Invalid("providers.timeout_secs must be >= 1".into()));
        }
        Ok(())
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            ma_window: self.analysis.ma_window,
            flow_category: self.analysis.flow_category.clone(),
        }
    }

    /// The merge request for a window ending on `today`.
    pub fn merge_request(&self, today: NaiveDate) -> MergeRequest {
        MergeRequest {
            symbol: self.analysis.symbol.clone(),
            window: self.analysis.lookback_days,
            today,
            flow_category: self.analysis.flow_category.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.providers.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Tag identifying which upstream ticker a cached table was fetched for.
    pub fn cache_source(&self) -> String {
        format!("price_suffix={}", self.providers.price_suffix)
    }
}
