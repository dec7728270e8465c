// src/attendance.rs
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::models::{Employee, Scan};
use crate::schedule::{day_slot, ShiftAssignment};

/// Every reference date and every displayed time is in this zone.
pub const REFERENCE_TZ: Tz = chrono_tz::Africa::Tunis;

pub const COLOR_PRESENT: &str = "#28A745";
pub const COLOR_ABSENT: &str = "#DC3545";
pub const COLOR_DAYOFF: &str = "#FFC107";
pub const COLOR_NEUTRAL: &str = "#6C757D";

// --- Validation policy ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub lookback: Duration,
    pub lookahead: Duration,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            lookback: Duration::hours(2),
            lookahead: Duration::zero(),
        }
    }
}

impl ValidationPolicy {
    /// Negative values are clamped to zero.
    pub fn from_minutes(lookback: i64, lookahead: i64) -> Self {
        Self {
            lookback: Duration::minutes(lookback.max(0)),
            lookahead: Duration::minutes(lookahead.max(0)),
        }
    }

    pub fn symmetric(margin: Duration) -> Self {
        Self {
            lookback: margin,
            lookahead: margin,
        }
    }

    pub fn window_around(&self, start: DateTime<Tz>) -> ValidationWindow {
        ValidationWindow {
            start: start - self.lookback,
            end: start + self.lookahead,
        }
    }
}

/// Closed instant interval in which a badge scan counts for a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl ValidationWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.with_timezone(&Utc) <= instant && instant <= self.end.with_timezone(&Utc)
    }

    pub fn label(&self) -> String {
        format!(
            "Fenêtre: {} - {}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

// --- Verdict ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTag {
    #[serde(rename = "dayoff")]
    DayOff,
    Absent,
    Present,
    Invalid,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownReason {
    MissingInput,
    InvalidWeekday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceReason {
    NoScan,
    /// Same-day scans exist but none fell inside the window.
    OutOfWindow { last_scan: DateTime<Tz> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusVerdict {
    DayOff {
        schedule: Option<String>,
    },
    Absent {
        schedule: String,
        reason: AbsenceReason,
        window: ValidationWindow,
    },
    Present {
        schedule: String,
        scan_time: DateTime<Tz>,
        window: ValidationWindow,
    },
    Invalid {
        schedule: String,
    },
    Unknown {
        reason: UnknownReason,
    },
}

impl StatusVerdict {
    pub fn tag(&self) -> StatusTag {
        match self {
            StatusVerdict::DayOff { .. } => StatusTag::DayOff,
            StatusVerdict::Absent { .. } => StatusTag::Absent,
            StatusVerdict::Present { .. } => StatusTag::Present,
            StatusVerdict::Invalid { .. } => StatusTag::Invalid,
            StatusVerdict::Unknown { .. } => StatusTag::Unknown,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StatusVerdict::DayOff { .. } => "Repos",
            StatusVerdict::Absent { .. } => "Absent",
            StatusVerdict::Present { .. } => "Présent",
            StatusVerdict::Invalid { .. } => "Horaire invalide",
            StatusVerdict::Unknown {
                reason: UnknownReason::MissingInput,
            } => "Inconnu",
            StatusVerdict::Unknown {
                reason: UnknownReason::InvalidWeekday,
            } => "Jour invalide",
        }
    }

    pub fn color(&self) -> &'static str {
        match self.tag() {
            StatusTag::Present => COLOR_PRESENT,
            StatusTag::Absent => COLOR_ABSENT,
            StatusTag::DayOff => COLOR_DAYOFF,
            StatusTag::Invalid | StatusTag::Unknown => COLOR_NEUTRAL,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, StatusVerdict::Present { .. })
    }

    pub fn schedule(&self) -> Option<&str> {
        match self {
            StatusVerdict::DayOff { schedule } => schedule.as_deref(),
            StatusVerdict::Absent { schedule, .. }
            | StatusVerdict::Present { schedule, .. }
            | StatusVerdict::Invalid { schedule } => Some(schedule),
            StatusVerdict::Unknown { .. } => None,
        }
    }

    /// Local `HH:MM` of the matching scan.
    pub fn scan_time(&self) -> Option<String> {
        match self {
            StatusVerdict::Present { scan_time, .. } => Some(scan_time.format("%H:%M").to_string()),
            _ => None,
        }
    }

    pub fn window(&self) -> Option<&ValidationWindow> {
        match self {
            StatusVerdict::Absent { window, .. } | StatusVerdict::Present { window, .. } => {
                Some(window)
            }
            _ => None,
        }
    }

    pub fn view(&self) -> VerdictView {
        let last_scan_time = match self {
            StatusVerdict::Absent {
                reason: AbsenceReason::OutOfWindow { last_scan },
                ..
            } => Some(last_scan.format("%H:%M").to_string()),
            _ => None,
        };
        VerdictView {
            status: self.tag(),
            message: self.message(),
            color: self.color(),
            is_valid: self.is_valid(),
            schedule: self.schedule().map(str::to_string),
            scan_time: self.scan_time(),
            window: self.window().map(ValidationWindow::label),
            last_scan_time,
        }
    }
}

/// Flat serializable form of a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictView {
    pub status: StatusTag,
    pub message: &'static str,
    pub color: &'static str,
    pub is_valid: bool,
    pub schedule: Option<String>,
    pub scan_time: Option<String>,
    pub window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan_time: Option<String>,
}

impl Serialize for StatusVerdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.view().serialize(serializer)
    }
}

// --- Evaluator ---

/// Classifies one employee on one calendar day. Holds no state beyond its configuration.
#[derive(Debug, Clone, Copy)]
pub struct AttendanceEvaluator {
    pub tz: Tz,
    pub policy: ValidationPolicy,
}

impl Default for AttendanceEvaluator {
    fn default() -> Self {
        Self::new(ValidationPolicy::default())
    }
}

impl AttendanceEvaluator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self {
            tz: REFERENCE_TZ,
            policy,
        }
    }

    /// The calendar day `instant` falls on in the reference zone.
    pub fn reference_date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.reference_date_of(Utc::now())
    }

    pub fn evaluate(
        &self,
        employee: Option<&Employee>,
        scans: Option<&[Scan]>,
        reference_date: Option<NaiveDate>,
    ) -> StatusVerdict {
        match (employee, scans, reference_date) {
            (Some(employee), Some(scans), Some(date)) => self.evaluate_day(employee, scans, date),
            _ => StatusVerdict::Unknown {
                reason: UnknownReason::MissingInput,
            },
        }
    }

    pub fn evaluate_day(&self, employee: &Employee, scans: &[Scan], date: NaiveDate) -> StatusVerdict {
        self.evaluate_weekday(employee, scans, date, date.weekday().num_days_from_sunday())
    }

    pub(crate) fn evaluate_weekday(
        &self,
        employee: &Employee,
        scans: &[Scan],
        date: NaiveDate,
        weekday_index: u32,
    ) -> StatusVerdict {
        let Some(slot) = day_slot(weekday_index) else {
            return StatusVerdict::Unknown {
                reason: UnknownReason::InvalidWeekday,
            };
        };
        let raw = employee.schedule.get(slot);

        let start_time = match ShiftAssignment::parse(raw) {
            ShiftAssignment::Unassigned | ShiftAssignment::Rest => {
                return StatusVerdict::DayOff {
                    schedule: raw.map(str::to_string),
                }
            }
            ShiftAssignment::Malformed => {
                return StatusVerdict::Invalid {
                    schedule: raw.unwrap_or_default().to_string(),
                }
            }
            ShiftAssignment::Shift { start, .. } => start,
        };
        let schedule = raw.unwrap_or_default().to_string();

        // A start falling in a DST gap has no instant.
        let Some(shift_start) = self
            .tz
            .from_local_datetime(&date.and_time(start_time))
            .earliest()
        else {
            return StatusVerdict::Invalid { schedule };
        };
        let window = self.policy.window_around(shift_start);

        let mut latest_in_window: Option<DateTime<Utc>> = None;
        let mut latest_same_day: Option<DateTime<Utc>> = None;
        for scan in scans.iter().filter(|scan| employee.owns(scan)) {
            let Some(instant) = scan.instant_in(&self.tz) else {
                warn!(
                    "Skipping scan with unparseable timestamp '{}' for token {}",
                    scan.timestamp, scan.nfc_token
                );
                continue;
            };
            // Only taps on the reference day count, even when the window opens the day before.
            if self.reference_date_of(instant) != date {
                continue;
            }
            if window.contains(instant) {
                latest_in_window = latest_in_window.max(Some(instant));
            }
            latest_same_day = latest_same_day.max(Some(instant));
        }

        match latest_in_window {
            Some(instant) => StatusVerdict::Present {
                schedule,
                scan_time: instant.with_timezone(&self.tz),
                window,
            },
            None => StatusVerdict::Absent {
                schedule,
                reason: match latest_same_day {
                    Some(instant) => AbsenceReason::OutOfWindow {
                        last_scan: instant.with_timezone(&self.tz),
                    },
                    None => AbsenceReason::NoScan,
                },
                window,
            },
        }
    }
}

/// Evaluates with the default policy in the reference zone.
pub fn evaluate(
    employee: Option<&Employee>,
    scans: Option<&[Scan]>,
    reference_date: Option<NaiveDate>,
) -> StatusVerdict {
    AttendanceEvaluator::default().evaluate(employee, scans, reference_date)
}
