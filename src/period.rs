// src/period.rs

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::config::ConfigError;

/// A calendar month, rendered as `YYYY-MM` on the wire and in identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    first_day: NaiveDate,
}

/// How a start..=end range is expanded into periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Every month in the range.
    #[default]
    Monthly,
    /// Only December of each year (year-to-date columns then cover the whole year).
    YearEnd,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| Self { first_day })
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn is_year_end(&self) -> bool {
        self.month() == 12
    }

    /// The following calendar month, `None` past chrono's date range.
    pub fn next(&self) -> Option<Self> {
        self.first_day
            .checked_add_months(Months::new(1))
            .map(|first_day| Self { first_day })
    }

    /// Split into the `(year, month)` strings used by the reshaper, zero padded.
    pub fn year_month_strings(&self) -> (String, String) {
        (format!("{:04}", self.year()), format!("{:02}", self.month()))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for Period {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidPeriod(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Period::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Period {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.to_string()
    }
}

/// Every month from `start` to `end` inclusive, optionally filtered to year-end months.
/// An inverted range yields an empty list.
pub fn period_range(start: Period, end: Period, granularity: Granularity) -> Vec<Period> {
    let mut out = Vec::new();
    let mut cur = Some(start);
    while let Some(p) = cur {
        if p > end {
            break;
        }
        if granularity == Granularity::Monthly || p.is_year_end() {
            out.push(p);
        }
        cur = p.next();
    }
    out
}
