// src/grid.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::attendance::{AttendanceEvaluator, StatusTag, StatusVerdict, VerdictView, COLOR_DAYOFF};
use crate::calendar::{day_title, WeekId};
use crate::models::{Employee, RecordId, Scan};
use crate::schedule::DaySlot;
use crate::session::Scope;

const FILTER_ALL: &str = "all";
const NO_SCHEDULE: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Day,
    Week,
}

// --- Filters ---

/// Toolbar filters. All active conditions must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GridFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub shift: Option<String>,
    #[serde(default)]
    pub segment: Option<String>,
}

// Empty and "all" disable a filter.
fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(FILTER_ALL))
}

impl GridFilter {
    /// Producers never filter by segment; their scope already does.
    pub fn without_segment(mut self) -> Self {
        self.segment = None;
        self
    }

    pub fn matches(&self, employee: &Employee, reference_date: NaiveDate) -> bool {
        if let Some(term) = active(&self.search) {
            let term = term.to_lowercase();
            if !employee
                .searchable_values()
                .any(|value| value.to_lowercase().contains(&term))
            {
                return false;
            }
        }
        if let Some(shift) = active(&self.shift) {
            if employee.schedule.for_date(reference_date) != Some(shift) {
                return false;
            }
        }
        if let Some(segment) = active(&self.segment) {
            if employee.segment.as_deref() != Some(segment) {
                return false;
            }
        }
        true
    }
}

// --- Grid model ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub id: Option<RecordId>,
    pub matricule: Option<String>,
    pub name: String,
    pub segment: Option<String>,
    pub nfc_token: String,
    pub plant_section: Option<String>,
    pub circuit: Option<String>,
    pub station: Option<String>,
}

impl From<&Employee> for EmployeeSummary {
    fn from(employee: &Employee) -> Self {
        EmployeeSummary {
            id: employee.id.clone(),
            matricule: employee.matricule.clone(),
            name: employee.display_name().to_string(),
            segment: employee.segment.clone(),
            nfc_token: employee.nfc_token.clone(),
            plant_section: employee.plant_section.clone(),
            circuit: employee.circuit.clone(),
            station: employee.station.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub date: NaiveDate,
    pub day: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub text_color: &'static str,
    pub badge: &'static str,
    pub schedule: String,
    pub verdict: VerdictView,
}

impl GridCell {
    fn new(view: ViewMode, date: NaiveDate, verdict: &StatusVerdict) -> Self {
        let day_off = verdict.tag() == StatusTag::DayOff;
        let label = match (view, day_off, verdict.is_valid()) {
            (_, true, _) => "REPOS",
            (ViewMode::Day, false, true) => "PRÉSENT",
            (ViewMode::Day, false, false) => "ABSENT",
            (ViewMode::Week, false, _) => verdict.message(),
        };
        GridCell {
            date,
            day: DaySlot::for_date(date).label(),
            label,
            color: if day_off { COLOR_DAYOFF } else { verdict.color() },
            text_color: if day_off { "#000000" } else { "#FFFFFF" },
            badge: if verdict.is_valid() { "✓" } else { "✗" },
            schedule: verdict.schedule().unwrap_or(NO_SCHEDULE).to_string(),
            verdict: verdict.view(),
        }
    }

    pub fn scan_time(&self) -> Option<&str> {
        self.verdict.scan_time.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridRow {
    pub employee: EmployeeSummary,
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTotals {
    pub present: usize,
    pub absent: usize,
    pub dayoff: usize,
    pub invalid: usize,
    pub unknown: usize,
}

impl StatusTotals {
    pub fn record(&mut self, tag: StatusTag) {
        match tag {
            StatusTag::Present => self.present += 1,
            StatusTag::Absent => self.absent += 1,
            StatusTag::DayOff => self.dayoff += 1,
            StatusTag::Invalid => self.invalid += 1,
            StatusTag::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.present + self.absent + self.dayoff + self.invalid + self.unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceGrid {
    pub view: ViewMode,
    pub title: String,
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    pub rows: Vec<GridRow>,
    pub totals: StatusTotals,
}

// --- Builders ---

pub fn day_grid(
    evaluator: &AttendanceEvaluator,
    employees: &[Employee],
    scans: &[Scan],
    date: NaiveDate,
    filter: &GridFilter,
    scope: &Scope,
) -> PresenceGrid {
    build_grid(
        evaluator,
        employees,
        scans,
        ViewMode::Day,
        day_title(date),
        vec![date],
        date,
        filter,
        scope,
    )
}

/// `filter_date` is the day whose assignment the shift filter compares against.
pub fn week_grid(
    evaluator: &AttendanceEvaluator,
    employees: &[Employee],
    scans: &[Scan],
    week: WeekId,
    filter_date: NaiveDate,
    filter: &GridFilter,
    scope: &Scope,
) -> PresenceGrid {
    build_grid(
        evaluator,
        employees,
        scans,
        ViewMode::Week,
        week.title(),
        week.dates().to_vec(),
        filter_date,
        filter,
        scope,
    )
}

#[allow(clippy::too_many_arguments)]
fn build_grid(
    evaluator: &AttendanceEvaluator,
    employees: &[Employee],
    scans: &[Scan],
    view: ViewMode,
    title: String,
    dates: Vec<NaiveDate>,
    filter_date: NaiveDate,
    filter: &GridFilter,
    scope: &Scope,
) -> PresenceGrid {
    let columns = dates
        .iter()
        .map(|date| format!("{} {}", DaySlot::for_date(*date).label(), date.format("%d/%m")))
        .collect();

    let mut totals = StatusTotals::default();
    let rows = employees
        .iter()
        .filter(|employee| scope.admits(employee))
        .filter(|employee| filter.matches(employee, filter_date))
        .map(|employee| {
            let cells = dates
                .iter()
                .map(|date| {
                    let verdict = evaluator.evaluate_day(employee, scans, *date);
                    totals.record(verdict.tag());
                    GridCell::new(view, *date, &verdict)
                })
                .collect();
            GridRow {
                employee: EmployeeSummary::from(employee),
                cells,
            }
        })
        .collect();

    PresenceGrid {
        view,
        title,
        dates,
        columns,
        rows,
        totals,
    }
}
