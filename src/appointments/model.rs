use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::appointments::schedule::OfficeCalendar;
use crate::error::AppError;

/* ============================================================
   Appointment type
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentType {
    #[serde(rename = "Constituent Assistance")]
    ConstituentAssistance,
    #[serde(rename = "Document Processing")]
    DocumentProcessing,
    #[serde(rename = "Community Concerns")]
    CommunityConcerns,
    #[serde(rename = "Project Proposal")]
    ProjectProposal,
    #[serde(rename = "Other")]
    Other,
}

impl AppointmentType {
    pub const ALL: [AppointmentType; 5] = [
        AppointmentType::ConstituentAssistance,
        AppointmentType::DocumentProcessing,
        AppointmentType::CommunityConcerns,
        AppointmentType::ProjectProposal,
        AppointmentType::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AppointmentType::ConstituentAssistance => "Constituent Assistance",
            AppointmentType::DocumentProcessing => "Document Processing",
            AppointmentType::CommunityConcerns => "Community Concerns",
            AppointmentType::ProjectProposal => "Project Proposal",
            AppointmentType::Other => "Other",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AppointmentType::ConstituentAssistance => "General consultation and assistance",
            AppointmentType::DocumentProcessing => "Processing of official documents and permits",
            AppointmentType::CommunityConcerns => "Discussion of issues affecting your community",
            AppointmentType::ProjectProposal => "Present community project ideas",
            AppointmentType::Other => "Other appointment purpose",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|t| t.label() == raw)
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/* ============================================================
   Time slots
   ============================================================ */

/// Slot start times in minutes after local midnight. Each slot is 30 minutes;
/// nothing is bookable between 11:30 AM and 1:00 PM.
const SLOT_STARTS: [u16; 13] = [
    9 * 60,
    9 * 60 + 30,
    10 * 60,
    10 * 60 + 30,
    11 * 60,
    11 * 60 + 30,
    13 * 60,
    13 * 60 + 30,
    14 * 60,
    14 * 60 + 30,
    15 * 60,
    15 * 60 + 30,
    16 * 60,
];

pub const SLOT_MINUTES: u16 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSlot {
    start_minute: u16,
}

impl TimeSlot {
    pub fn all() -> impl Iterator<Item = TimeSlot> {
        SLOT_STARTS.into_iter().map(|start_minute| TimeSlot { start_minute })
    }

    pub fn start_minute(self) -> u16 {
        self.start_minute
    }

    /// Parses "h:mm AM/PM" (a leading zero on the hour is tolerated) and
    /// accepts it only if it is one of the bookable slots.
    pub fn parse(raw: &str) -> Option<Self> {
        let minute = parse_clock_label(raw)?;
        SLOT_STARTS
            .contains(&minute)
            .then_some(TimeSlot { start_minute: minute })
    }

    pub fn label(self) -> String {
        clock_label(self.start_minute)
    }
}

pub(crate) fn clock_label(minute_of_day: u16) -> String {
    let hour24 = minute_of_day / 60;
    let minute = minute_of_day % 60;
    let period = if hour24 >= 12 { "PM" } else { "AM" };
    let hour12 = match hour24 % 12 {
        0 => 12,
        h => h,
    };
    format!("{hour12}:{minute:02} {period}")
}

fn parse_clock_label(raw: &str) -> Option<u16> {
    let (hm, period) = raw.trim().split_once(' ')?;
    let (h, m) = hm.split_once(':')?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return None;
    }
    let hour: u16 = h.parse().ok()?;
    let minute: u16 = m.parse().ok()?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }
    let offset = match period.trim().to_ascii_uppercase().as_str() {
        "AM" => 0,
        "PM" => 12,
        _ => return None,
    };
    Some(((hour % 12) + offset) * 60 + minute)
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimeSlot::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("not a bookable slot: {raw:?}")))
    }
}

/* ============================================================
   Status lifecycle
   ============================================================ */

/// Pending -> {Confirmed, Cancelled}, Confirmed -> {Completed, Cancelled}.
/// Cancelled and Completed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Cancelled => "Cancelled",
            AppointmentStatus::Completed => "Completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Pending" => Some(AppointmentStatus::Pending),
            "Confirmed" => Some(AppointmentStatus::Confirmed),
            "Cancelled" => Some(AppointmentStatus::Cancelled),
            "Completed" => Some(AppointmentStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    pub fn can_transition_to(self, target: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, target),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }

    pub fn transition_to(self, target: AppointmentStatus) -> Result<AppointmentStatus, AppError> {
        if self.is_terminal() {
            return Err(AppError::TerminalState(self));
        }
        if !self.can_transition_to(target) {
            return Err(AppError::invalid(
                "status",
                format!("A {self} appointment cannot become {target}"),
            ));
        }
        Ok(target)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ============================================================
   Record
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: AppointmentType,
    pub purpose: String,
    pub date: DateTime<Utc>,
    pub time: TimeSlot,
    pub is_virtual: bool,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write; used to reject stale reschedule/cancel calls.
    pub version: i64,
}

impl Appointment {
    pub fn apply(&mut self, draft: ValidDraft, now: DateTime<Utc>) {
        self.kind = draft.kind;
        self.purpose = draft.purpose;
        self.date = draft.date;
        self.time = draft.time;
        self.is_virtual = draft.is_virtual;
        self.updated_at = now;
        self.version += 1;
    }
}

/* ============================================================
   Drafts (unvalidated client input)
   ============================================================ */

/// What the quick form fills in when "Other" is picked; never a real purpose.
pub const PURPOSE_PLACEHOLDER: &str = "Please specify the purpose of your appointment...";
pub const PURPOSE_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDraft {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub purpose: String,
    /// RFC 3339 instant or bare YYYY-MM-DD.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    pub kind: AppointmentType,
    pub purpose: String,
    pub date: DateTime<Utc>,
    pub time: TimeSlot,
    pub is_virtual: bool,
}

impl AppointmentDraft {
    /// Checks fields in a fixed order (type, purpose, date, time) and reports
    /// the first violation only.
    pub fn validate(&self, calendar: &OfficeCalendar, now: DateTime<Utc>) -> Result<ValidDraft, AppError> {
        let kind_raw = self.kind.as_deref().map(str::trim).unwrap_or_default();
        if kind_raw.is_empty() {
            return Err(AppError::invalid("type", "Please select an appointment type"));
        }
        let kind = AppointmentType::parse(kind_raw)
            .ok_or_else(|| AppError::invalid("type", "Please select a valid appointment type"))?;

        let purpose = self.purpose.trim();
        if purpose.is_empty() || purpose == PURPOSE_PLACEHOLDER {
            return Err(AppError::invalid(
                "purpose",
                "Please enter the purpose of your appointment",
            ));
        }
        if purpose.chars().count() > PURPOSE_MAX_CHARS {
            return Err(AppError::invalid(
                "purpose",
                format!("Purpose must be at most {PURPOSE_MAX_CHARS} characters"),
            ));
        }

        let date_raw = self.date.as_deref().map(str::trim).unwrap_or_default();
        if date_raw.is_empty() {
            return Err(AppError::invalid("date", "Please select a date for your appointment"));
        }
        let date = calendar
            .parse_date(date_raw)
            .ok_or_else(|| AppError::invalid("date", "Please select a valid date"))?;
        if !calendar.is_bookable(date, now) {
            return Err(AppError::invalid(
                "date",
                "Please select a future date for your appointment",
            ));
        }

        let time_raw = self.time.as_deref().map(str::trim).unwrap_or_default();
        if time_raw.is_empty() {
            return Err(AppError::invalid("time", "Please select a time slot"));
        }
        let time = TimeSlot::parse(time_raw).ok_or_else(|| {
            AppError::invalid("time", "Please select one of the available time slots")
        })?;

        Ok(ValidDraft {
            kind,
            purpose: purpose.to_string(),
            date,
            time,
            is_virtual: self.is_virtual,
        })
    }
}
