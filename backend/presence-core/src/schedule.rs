// src/schedule.rs
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::Employee;

/// Literal assignment value marking a rest day.
pub const REST_MARKER: &str = "Repos";

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap_or_else(|e| panic!("invalid clock regex: {}", e))
});

// --- Weekday slots ---

/// One of the seven per-day assignment fields. Index 0 is Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaySlot {
    Dimanche,
    Lundi,
    Mardi,
    Mercredi,
    Jeudi,
    Vendredi,
    Samedi,
}

impl DaySlot {
    pub const ALL: [DaySlot; 7] = [
        DaySlot::Dimanche,
        DaySlot::Lundi,
        DaySlot::Mardi,
        DaySlot::Mercredi,
        DaySlot::Jeudi,
        DaySlot::Vendredi,
        DaySlot::Samedi,
    ];

    pub fn from_index(index: u32) -> Option<DaySlot> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn from_weekday(weekday: Weekday) -> DaySlot {
        Self::ALL[weekday.num_days_from_sunday() as usize]
    }

    pub fn for_date(date: NaiveDate) -> DaySlot {
        Self::from_weekday(date.weekday())
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    /// Name of the employee field holding this day's assignment.
    pub fn field_name(self) -> &'static str {
        match self {
            DaySlot::Dimanche => "dimanche",
            DaySlot::Lundi => "lundi",
            DaySlot::Mardi => "mardi",
            DaySlot::Mercredi => "mercredi",
            DaySlot::Jeudi => "jeudi",
            DaySlot::Vendredi => "vendredi",
            DaySlot::Samedi => "samedi",
        }
    }

    /// Column header label.
    pub fn label(self) -> &'static str {
        match self {
            DaySlot::Dimanche => "Dimanche",
            DaySlot::Lundi => "Lundi",
            DaySlot::Mardi => "Mardi",
            DaySlot::Mercredi => "Mercredi",
            DaySlot::Jeudi => "Jeudi",
            DaySlot::Vendredi => "Vendredi",
            DaySlot::Samedi => "Samedi",
        }
    }
}

pub fn day_slot(index: u32) -> Option<DaySlot> {
    DaySlot::from_index(index)
}

// --- Weekly schedule ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    #[serde(default)]
    pub dimanche: Option<String>,
    #[serde(default)]
    pub lundi: Option<String>,
    #[serde(default)]
    pub mardi: Option<String>,
    #[serde(default)]
    pub mercredi: Option<String>,
    #[serde(default)]
    pub jeudi: Option<String>,
    #[serde(default)]
    pub vendredi: Option<String>,
    #[serde(default)]
    pub samedi: Option<String>,
}

impl WeeklySchedule {
    /// Raw assignment for a slot. Blank values read as absent.
    pub fn get(&self, slot: DaySlot) -> Option<&str> {
        let raw = match slot {
            DaySlot::Dimanche => &self.dimanche,
            DaySlot::Lundi => &self.lundi,
            DaySlot::Mardi => &self.mardi,
            DaySlot::Mercredi => &self.mercredi,
            DaySlot::Jeudi => &self.jeudi,
            DaySlot::Vendredi => &self.vendredi,
            DaySlot::Samedi => &self.samedi,
        };
        raw.as_deref().filter(|value| !value.trim().is_empty())
    }

    pub fn set(&mut self, slot: DaySlot, value: Option<&str>) {
        let value = value.map(str::to_string);
        match slot {
            DaySlot::Dimanche => self.dimanche = value,
            DaySlot::Lundi => self.lundi = value,
            DaySlot::Mardi => self.mardi = value,
            DaySlot::Mercredi => self.mercredi = value,
            DaySlot::Jeudi => self.jeudi = value,
            DaySlot::Vendredi => self.vendredi = value,
            DaySlot::Samedi => self.samedi = value,
        }
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<&str> {
        self.get(DaySlot::for_date(date))
    }

    pub fn assignments(&self) -> impl Iterator<Item = &str> {
        DaySlot::ALL.into_iter().filter_map(|slot| self.get(slot))
    }
}

/// Raw assignment for `employee` on weekday `index` (0 = Sunday). `None` when the field is
/// blank or the index is outside 0..=6.
pub fn day_schedule(employee: &Employee, index: u32) -> Option<&str> {
    day_slot(index).and_then(|slot| employee.schedule.get(slot))
}

// --- Parsed assignment ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAssignment {
    Unassigned,
    Rest,
    Shift {
        start: NaiveTime,
        end: Option<NaiveTime>,
    },
    Malformed,
}

impl ShiftAssignment {
    pub fn parse(raw: Option<&str>) -> ShiftAssignment {
        let raw = match raw.map(str::trim) {
            None | Some("") => return ShiftAssignment::Unassigned,
            Some(value) => value,
        };
        if raw == REST_MARKER {
            return ShiftAssignment::Rest;
        }
        let Some((start, end)) = raw.split_once('_') else {
            return ShiftAssignment::Malformed;
        };
        let Some(start) = parse_clock(start) else {
            return ShiftAssignment::Malformed;
        };
        let end = match end.trim() {
            "" => None,
            value => match parse_clock(value) {
                Some(time) => Some(time),
                None => return ShiftAssignment::Malformed,
            },
        };
        ShiftAssignment::Shift { start, end }
    }
}

/// Parses `H:MM` or `HH:MM` with hour in 0..=23 and minute in 0..=59.
pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    let caps = CLOCK_TIME.captures(value.trim())?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}
