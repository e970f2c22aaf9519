use std::cmp::Reverse;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::appointments::model::{
    clock_label, Appointment, AppointmentStatus, AppointmentType, TimeSlot, SLOT_MINUTES,
};

/// Calendar arithmetic in the office's local time. Bookings are validated
/// against the local calendar day only; the time of day never matters.
#[derive(Debug, Clone, Copy)]
pub struct OfficeCalendar {
    offset: FixedOffset,
}

impl OfficeCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_date(now)
    }

    /// Local midnight of `day`, as an absolute instant.
    pub fn start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        let local = day.and_time(NaiveTime::MIN);
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        DateTime::<Utc>::from_naive_utc_and_offset(utc, Utc)
    }

    pub fn parse_date(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(|day| self.start_of(day))
    }

    /// Today counts as bookable regardless of the time of day.
    pub fn is_bookable(&self, date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.local_date(date) >= self.today(now)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeOption {
    pub label: &'static str,
    pub description: &'static str,
}

/// What a booking form needs to render its pickers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOptions {
    pub types: Vec<TypeOption>,
    pub time_slots: Vec<String>,
    pub slot_minutes: u16,
}

impl BookingOptions {
    pub fn current() -> Self {
        Self {
            types: AppointmentType::ALL
                .into_iter()
                .map(|t| TypeOption {
                    label: t.label(),
                    description: t.description(),
                })
                .collect(),
            time_slots: TimeSlot::all().map(TimeSlot::label).collect(),
            slot_minutes: SLOT_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoursWindow {
    pub opens: String,
    pub closes: String,
}

/// Contiguous runs of the slot table, e.g. 9:00 AM-12:00 PM and 1:00 PM-4:30 PM.
pub fn bookable_hours() -> Vec<HoursWindow> {
    let mut runs: Vec<(u16, u16)> = Vec::new();
    for slot in TimeSlot::all() {
        let start = slot.start_minute();
        let end = start + SLOT_MINUTES;
        match runs.last_mut() {
            Some(run) if run.1 == start => run.1 = end,
            _ => runs.push((start, end)),
        }
    }
    runs.into_iter()
        .map(|(open, close)| HoursWindow {
            opens: clock_label(open),
            closes: clock_label(close),
        })
        .collect()
}

/// One fetch, split into two independently ordered slices. Callers show
/// `upcoming` before `past`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentListing {
    pub upcoming: Vec<Appointment>,
    pub past: Vec<Appointment>,
}

pub fn is_upcoming(a: &Appointment, calendar: &OfficeCalendar, today: NaiveDate) -> bool {
    calendar.local_date(a.date) >= today && a.status != AppointmentStatus::Cancelled
}

pub fn partition(
    records: Vec<Appointment>,
    calendar: &OfficeCalendar,
    now: DateTime<Utc>,
) -> AppointmentListing {
    let today = calendar.today(now);
    let (mut upcoming, mut past): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|a| is_upcoming(a, calendar, today));

    upcoming.sort_by_key(|a| (calendar.local_date(a.date), a.time, a.created_at));
    past.sort_by_key(|a| Reverse((calendar.local_date(a.date), a.time, a.created_at)));

    AppointmentListing { upcoming, past }
}
