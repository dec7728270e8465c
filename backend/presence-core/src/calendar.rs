// src/calendar.rs
use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::schedule::DaySlot;

static WEEK_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap_or_else(|e| panic!("invalid week regex: {}", e))
});

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WeekParseError {
    #[error("Week identifier '{0}' is not in YYYY-Www form")]
    Format(String),

    #[error("Week {week} does not exist in ISO year {year}")]
    OutOfRange { year: i32, week: u32 },

    #[error("Date '{0}' is not in YYYY-MM-DD form")]
    Date(String),
}

/// An ISO-8601 week, written `YYYY-Www`. Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekId {
    pub year: i32,
    pub week: u32,
}

impl WeekId {
    pub fn new(year: i32, week: u32) -> Result<Self, WeekParseError> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
            .map(|_| WeekId { year, week })
            .ok_or(WeekParseError::OutOfRange { year, week })
    }

    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        WeekId {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn monday(&self) -> NaiveDate {
        // Validated at construction; fall back to the epoch week only for hand-built values.
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon).unwrap_or_default()
    }

    /// The seven dates of the week, Monday first.
    pub fn dates(&self) -> [NaiveDate; 7] {
        let monday = self.monday();
        let mut dates = [monday; 7];
        for (offset, date) in dates.iter_mut().enumerate() {
            *date = monday + chrono::Duration::days(offset as i64);
        }
        dates
    }

    pub fn title(&self) -> String {
        format!("Semaine {}-{:02}", self.year, self.week)
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl FromStr for WeekId {
    type Err = WeekParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = WEEK_ID
            .captures(s.trim())
            .ok_or_else(|| WeekParseError::Format(s.to_string()))?;
        let year: i32 = caps[1]
            .parse()
            .map_err(|_| WeekParseError::Format(s.to_string()))?;
        let week: u32 = caps[2]
            .parse()
            .map_err(|_| WeekParseError::Format(s.to_string()))?;
        WeekId::new(year, week)
    }
}

pub fn parse_reference_date(raw: &str) -> Result<NaiveDate, WeekParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| WeekParseError::Date(raw.to_string()))
}

/// Day-view title, e.g. `Jour 03/03/2025 (Lundi)`.
pub fn day_title(date: NaiveDate) -> String {
    format!(
        "Jour {} ({})",
        date.format("%d/%m/%Y"),
        DaySlot::for_date(date).label()
    )
}
