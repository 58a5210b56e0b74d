//! Reporting periods and inclusive date ranges.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive `[from, to]`; a missing bound is open on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |d: Option<NaiveDate>| d.map_or_else(|| "…".to_string(), |d| d.to_string());
        write!(f, "{} — {}", bound(self.from), bound(self.to))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("invalid month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Period picked on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Period {
    /// The last seven days including today.
    Week,
    /// Start of the current month up to today.
    CurrentMonth,
    Month { year: i32, month: u32 },
    Custom {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl Default for Period {
    fn default() -> Self {
        Period::Week
    }
}

impl Period {
    pub fn resolve(&self, today: NaiveDate) -> Result<DateRange, PeriodError> {
        let (from, to) = match *self {
            Period::Week => (today - Duration::days(6), today),
            Period::CurrentMonth => (today.with_day(1).unwrap_or(today), today),
            Period::Month { year, month } => {
                let invalid = PeriodError::InvalidMonth { year, month };
                let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(invalid.clone())?;
                let next = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)
                }
                .ok_or(invalid)?;
                (first, next - Duration::days(1))
            }
            Period::Custom { from, to } => (from.unwrap_or(today), to.unwrap_or(today)),
        };
        Ok(DateRange::new(Some(from), Some(to)))
    }
}
