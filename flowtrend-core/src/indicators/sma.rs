//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window.
//! Lookback: period - 1 (first value at index period-1).

/// Simple moving average with a fixed period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// Returns `None` for a zero period.
    pub fn new(period: usize) -> Option<Self> {
        (period >= 1).then_some(Self { period })
    }

    /// Number of leading rows without a value.
    pub fn lookback(&self) -> usize {
        self.period - 1
    }

    /// One entry per input value; `None` until a full window is available.
    ///
    /// Each window is summed from scratch; no running sum drifts across rows.
    pub fn compute(&self, values: &[f64]) -> Vec<Option<f64>> {
        let mut result = vec![None; values.len()];
        for (i, window) in values.windows(self.period).enumerate() {
            let sum: f64 = window.iter().sum();
            result[i + self.lookback()] = Some(sum / self.period as f64);
        }
        result
    }
}
