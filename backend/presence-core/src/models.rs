// src/models.rs

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::schedule::WeeklySchedule;
use crate::session::Role;

// --- Remote API Data Structures ---

/// Record identifiers come back as numbers from some endpoints and as strings from others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

// Staff numbers and phone numbers are typed inconsistently by the importer.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Int(i64),
        Float(f64),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Text(s)) => Some(s),
        Some(Lenient::Int(n)) => Some(n.to_string()),
        Some(Lenient::Float(n)) => Some(n.to_string()),
        Some(Lenient::Other(_)) | None => None,
    })
}

// Same as `lenient_string`, but a missing value reads as empty text.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub matricule: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub immatricule: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tel: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub plant_section: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub circuit: Option<String>,
    #[serde(default)]
    pub station: Option<String>,
    #[serde(default)]
    pub prestataire: Option<String>,
    #[serde(default)]
    pub imported_by: Option<String>,
    #[serde(default)]
    pub import_date: Option<String>,
    /// Badge token, the only join key between employees and scans.
    #[serde(default)]
    pub nfc_token: String,
    #[serde(flatten)]
    pub schedule: WeeklySchedule,
}

impl Employee {
    /// A scan belongs to an employee iff the badge tokens are equal. An employee without a
    /// badge owns no scans.
    pub fn owns(&self, scan: &Scan) -> bool {
        !self.nfc_token.is_empty() && self.nfc_token == scan.nfc_token
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Descriptive values used by the free-text search, in display order.
    pub fn searchable_values(&self) -> impl Iterator<Item = &str> {
        [
            self.matricule.as_deref(),
            self.immatricule.as_deref(),
            self.name.as_deref(),
            self.tel.as_deref(),
            self.email.as_deref(),
            self.segment.as_deref(),
            Some(self.nfc_token.as_str()),
            self.plant_section.as_deref(),
            self.site.as_deref(),
            self.circuit.as_deref(),
            self.station.as_deref(),
            self.prestataire.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.schedule.assignments())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    #[serde(default)]
    pub id: Option<RecordId>,
    /// Empty when the row carries no usable token; such scans belong to no employee.
    #[serde(default, deserialize_with = "lenient_text")]
    pub nfc_token: String,
    /// Kept raw and parsed on demand. Null or non-text values read as empty, which never parses.
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: String,
}

impl Scan {
    /// Parses the timestamp into an instant. Offset-less timestamps are wall-clock times in
    /// `tz`.
    pub fn instant_in(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        parse_instant(&self.timestamp, tz)
    }
}

pub fn parse_instant(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub name: Option<String>,
    pub start_time: String,
    pub end_time: String,
}

impl Shift {
    /// The assignment string an employee carries for this shift.
    pub fn schedule_key(&self) -> String {
        format!("{}_{}", self.start_time, self.end_time)
    }
}

// The segments endpoint has shipped both a bare array and a wrapped object, with entries
// either plain names or `{ "name": ... }` records.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SegmentEntry {
    Name(String),
    Record { name: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SegmentListResponse {
    Bare(Vec<SegmentEntry>),
    Wrapped {
        #[serde(default)]
        segments: Vec<SegmentEntry>,
    },
}

impl SegmentListResponse {
    pub fn into_names(self) -> Vec<String> {
        let entries = match self {
            SegmentListResponse::Bare(entries) => entries,
            SegmentListResponse::Wrapped { segments } => segments,
        };
        entries
            .into_iter()
            .map(|entry| match entry {
                SegmentEntry::Name(name) => name,
                SegmentEntry::Record { name } => name,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Producer {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub segments: Vec<String>,
}

// --- Auth payloads ---

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "requires2FA")]
    pub requires_two_factor: bool,
}
