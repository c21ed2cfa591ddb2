//! TTL cache for merged tables, stored as Parquet with a JSON sidecar.
//!
//! Layout:
//! - `{cache_dir}/symbol={SYMBOL}/window={DAYS}.parquet`
//! - `{cache_dir}/symbol={SYMBOL}/window={DAYS}.meta.json`
//!
//! Writes are atomic (write to `.tmp`, rename into place). An entry is served
//! only while younger than the TTL, only to a cache with the same source tag
//! (the upstream ticker convention), and only if its BLAKE3 hash still matches
//! the sidecar; anything else is a miss. Corrupt files are renamed to
//! `{filename}.quarantined`.

use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use flowtrend_core::domain::LookbackWindow;
use flowtrend_core::merge::MergedTable;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("cache metadata error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("corrupt cache entry {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Sidecar describing one cached merged table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    pub window: LookbackWindow,
    /// Source tag of the cache that wrote the entry.
    #[serde(default)]
    pub source: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub rows: usize,
    pub categories: Vec<String>,
    pub data_hash: String,
    pub cached_at: DateTime<Utc>,
}

impl CacheMeta {
    /// Whether the entry is still servable at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.cached_at);
        if age < chrono::Duration::zero() {
            return false;
        }
        age.to_std().map(|age| age < ttl).unwrap_or(false)
    }
}

/// Merged-table cache keyed by `(symbol, lookback window)`.
#[derive(Debug, Clone)]
pub struct MergedTableCache {
    cache_dir: PathBuf,
    ttl: Duration,
    source: String,
}

impl MergedTableCache {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl,
            source: String::new(),
        }
    }

    /// Tag entries with the upstream they were fetched from. Entries written
    /// under another tag are misses.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn table_path(&self, symbol: &str, window: LookbackWindow) -> PathBuf {
        self.symbol_dir(symbol)
            .join(format!("window={}.parquet", window.days()))
    }

    fn meta_path(&self, symbol: &str, window: LookbackWindow) -> PathBuf {
        self.symbol_dir(symbol)
            .join(format!("window={}.meta.json", window.days()))
    }

    /// Look up a fresh entry using the wall clock.
    pub fn get(
        &self,
        symbol: &str,
        window: LookbackWindow,
    ) -> Result<Option<MergedTable>, CacheError> {
        self.get_at(symbol, window, Utc::now())
    }

    /// Look up an entry as of `now`. Missing or expired entries are `Ok(None)`.
    pub fn get_at(
        &self,
        symbol: &str,
        window: LookbackWindow,
        now: DateTime<Utc>,
    ) -> Result<Option<MergedTable>, CacheError> {
        let Some(meta) = self.read_meta(symbol, window)? else {
            return Ok(None);
        };
        if meta.source != self.source {
            debug!(
                symbol = symbol,
                window = %window,
                cached_source = %meta.source,
                source = %self.source,
                "cache entry fetched for another source"
            );
            return Ok(None);
        }
        if !meta.is_fresh(self.ttl, now) {
            debug!(
                symbol = symbol,
                window = %window,
                cached_at = %meta.cached_at,
                "cache entry expired"
            );
            return Ok(None);
        }

        let path = self.table_path(symbol, window);
        if !path.exists() {
            return Ok(None);
        }

        match load_table(&path, symbol, &meta) {
            Ok(table) => Ok(Some(table)),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, &quarantine);
                let _ = fs::remove_file(self.meta_path(symbol, window));
                Err(e)
            }
        }
    }

    /// Store a table stamped with the wall clock.
    pub fn put(&self, table: &MergedTable, window: LookbackWindow) -> Result<(), CacheError> {
        self.put_at(table, window, Utc::now())
    }

    /// Store a table stamped with `now`. Replaces any previous entry.
    pub fn put_at(
        &self,
        table: &MergedTable,
        window: LookbackWindow,
        now: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let symbol = table.symbol();
        fs::create_dir_all(self.symbol_dir(symbol))?;

        let mut df = table
            .to_dataframe()
            .map_err(|e| CacheError::Parquet(e.to_string()))?;
        let path = self.table_path(symbol, window);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        let dates = table.dates();
        let meta = CacheMeta {
            symbol: symbol.to_string(),
            window,
            source: self.source.clone(),
            start_date: dates.first().copied(),
            end_date: dates.last().copied(),
            rows: table.len(),
            categories: table.categories().map(str::to_string).collect(),
            data_hash: table.fingerprint(),
            cached_at: now,
        };
        let meta_path = self.meta_path(symbol, window);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, serde_json::to_string_pretty(&meta)?)?;
        fs::rename(&meta_tmp, &meta_path)?;

        debug!(symbol = symbol, window = %window, rows = meta.rows, "cached merged table");
        Ok(())
    }

    fn read_meta(
        &self,
        symbol: &str,
        window: LookbackWindow,
    ) -> Result<Option<CacheMeta>, CacheError> {
        let path = self.meta_path(symbol, window);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// All readable sidecars, sorted by symbol then window.
    pub fn entries(&self) -> Result<Vec<CacheMeta>, CacheError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }

        let mut metas = Vec::new();
        for sym_entry in fs::read_dir(&self.cache_dir)? {
            let sym_path = sym_entry?.path();
            if !sym_path.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&sym_path)? {
                let path = entry?.path();
                let is_meta = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".meta.json"));
                if !is_meta {
                    continue;
                }
                match fs::read_to_string(&path)
                    .map_err(CacheError::from)
                    .and_then(|s| serde_json::from_str::<CacheMeta>(&s).map_err(CacheError::from))
                {
                    Ok(meta) => metas.push(meta),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable cache sidecar"),
                }
            }
        }

        metas.sort_by(|a, b| {
            a.symbol
                .cmp(&b.symbol)
                .then(a.window.days().cmp(&b.window.days()))
        });
        Ok(metas)
    }

    /// Remove every cached entry. Returns the number of symbol directories removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            let is_symbol_dir = path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("symbol="));
            if is_symbol_dir {
                fs::remove_dir_all(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), CacheError> {
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| CacheError::Parquet(format!("write: {e}")))?;
    Ok(())
}

fn load_table(path: &Path, symbol: &str, meta: &CacheMeta) -> Result<MergedTable, CacheError> {
    let corrupt = |reason: String| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let file = fs::File::open(path)?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| CacheError::Parquet(format!("read: {e}")))?;

    let table = MergedTable::from_dataframe(symbol, &df).map_err(|e| corrupt(e.to_string()))?;
    if table.len() != meta.rows {
        return Err(corrupt(format!(
            "row count {} does not match sidecar {}",
            table.len(),
            meta.rows
        )));
    }
    if table.fingerprint() != meta.data_hash {
        return Err(corrupt("content hash mismatch".into()));
    }
    Ok(table)
}
