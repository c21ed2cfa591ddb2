//! Lookback window — how many calendar days of history one analysis covers.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported lookback window {0} days (valid: 180, 365, 730, 1095)")]
pub struct WindowError(pub u32);

/// The supported history lengths.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum LookbackWindow {
    HalfYear,
    OneYear,
    #[default]
    TwoYears,
    ThreeYears,
}

impl LookbackWindow {
    pub const ALL: [LookbackWindow; 4] = [
        LookbackWindow::HalfYear,
        LookbackWindow::OneYear,
        LookbackWindow::TwoYears,
        LookbackWindow::ThreeYears,
    ];

    pub fn days(self) -> u32 {
        match self {
            LookbackWindow::HalfYear => 180,
            LookbackWindow::OneYear => 365,
            LookbackWindow::TwoYears => 730,
            LookbackWindow::ThreeYears => 1095,
        }
    }

    /// First calendar day of the window ending at `today`.
    pub fn start_date(self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(i64::from(self.days()))
    }
}

impl TryFrom<u32> for LookbackWindow {
    type Error = WindowError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        LookbackWindow::ALL
            .into_iter()
            .find(|w| w.days() == days)
            .ok_or(WindowError(days))
    }
}

impl From<LookbackWindow> for u32 {
    fn from(window: LookbackWindow) -> Self {
        window.days()
    }
}

impl fmt::Display for LookbackWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_day_counts() {
        for days in [180, 365, 730, 1095] {
            assert_eq!(LookbackWindow::try_from(days).unwrap().days(), days);
        }
    }

    #[test]
    fn rejects_other_day_counts() {
        assert_eq!(LookbackWindow::try_from(90), Err(WindowError(90)));
    }

    #[test]
    fn start_date_counts_calendar_days() {
        let today = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert_eq!(
            LookbackWindow::HalfYear.start_date(today),
            NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
        );
    }

    #[test]
    fn default_is_two_years() {
        assert_eq!(LookbackWindow::default().days(), 730);
    }
}
