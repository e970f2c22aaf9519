use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::appointments::model::{Appointment, AppointmentDraft, AppointmentStatus};
use crate::appointments::schedule::{partition, AppointmentListing, BookingOptions, OfficeCalendar};
use crate::appointments::store::{AppointmentStore, NewAppointment};
use crate::clock::{bounded, Clock};
use crate::error::AppError;
use crate::session::Session;

/// Appointment lifecycle on top of an injected store.
///
/// The service never retries; every store call is bounded by `timeout` and
/// failures go straight back to the caller. Slot collisions between bookings
/// are deliberately not checked, and nothing flips past appointments to
/// Completed.
#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
    calendar: OfficeCalendar,
    timeout: Duration,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
        calendar: OfficeCalendar,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            calendar,
            timeout,
        }
    }

    #[cfg(test)]
    pub fn calendar(&self) -> &OfficeCalendar {
        &self.calendar
    }

    pub async fn create(&self, session: &Session, draft: &AppointmentDraft) -> Result<Appointment, AppError> {
        let owner = session.owner()?;
        let now = self.clock.now();
        let valid = draft.validate(&self.calendar, now)?;

        let created = bounded(
            self.timeout,
            self.store.insert(NewAppointment {
                user_id: owner,
                draft: valid,
                created_at: now,
            }),
        )
        .await?;

        tracing::info!(
            appointment_id = %created.id,
            user_id = %owner,
            kind = %created.kind,
            "appointment created"
        );
        Ok(created)
    }

    pub async fn list_by_owner(&self, session: &Session) -> Result<AppointmentListing, AppError> {
        let owner = session.owner()?;
        let records = bounded(self.timeout, self.store.list_owned(owner)).await?;
        Ok(partition(records, &self.calendar, self.clock.now()))
    }

    /// The first `limit` upcoming appointments, soonest first.
    pub async fn next_upcoming(&self, session: &Session, limit: usize) -> Result<Vec<Appointment>, AppError> {
        let mut upcoming = self.list_by_owner(session).await?.upcoming;
        upcoming.truncate(limit);
        Ok(upcoming)
    }

    pub fn options(&self) -> BookingOptions {
        BookingOptions::current()
    }

    pub async fn get(&self, session: &Session, id: Uuid) -> Result<Appointment, AppError> {
        let owner = session.owner()?;
        self.load(id, owner).await
    }

    /// Replaces type, purpose, date, time and the virtual flag. Status, id
    /// and creation time are untouched.
    pub async fn reschedule(
        &self,
        session: &Session,
        id: Uuid,
        draft: &AppointmentDraft,
        expected_version: Option<i64>,
    ) -> Result<Appointment, AppError> {
        let owner = session.owner()?;
        let current = self.load(id, owner).await?;
        if current.status.is_terminal() {
            return Err(AppError::TerminalState(current.status));
        }
        check_version(&current, expected_version)?;

        let now = self.clock.now();
        let valid = draft.validate(&self.calendar, now)?;

        let mut next = current.clone();
        next.apply(valid, now);
        self.write(&next, current.version).await?;

        tracing::info!(appointment_id = %id, user_id = %owner, version = next.version, "appointment rescheduled");
        Ok(next)
    }

    /// Cancelling twice is an error, not a no-op; `cancelled_at` is only ever
    /// set once.
    pub async fn cancel(
        &self,
        session: &Session,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<Appointment, AppError> {
        let owner = session.owner()?;
        let current = self.load(id, owner).await?;
        let status = current.status.transition_to(AppointmentStatus::Cancelled)?;
        check_version(&current, expected_version)?;

        let now = self.clock.now();
        let mut next = current.clone();
        next.status = status;
        next.cancelled_at = Some(now);
        next.updated_at = now;
        next.version += 1;
        self.write(&next, current.version).await?;

        tracing::info!(appointment_id = %id, user_id = %owner, "appointment cancelled");
        Ok(next)
    }

    async fn load(&self, id: Uuid, owner: Uuid) -> Result<Appointment, AppError> {
        bounded(self.timeout, self.store.find_owned(id, owner))
            .await?
            .ok_or(AppError::NotFound("appointment"))
    }

    async fn write(&self, next: &Appointment, expected_version: i64) -> Result<(), AppError> {
        if bounded(self.timeout, self.store.replace(next, expected_version)).await? {
            Ok(())
        } else {
            tracing::warn!(appointment_id = %next.id, expected_version, "stale appointment write rejected");
            Err(AppError::Conflict)
        }
    }
}

fn check_version(current: &Appointment, expected: Option<i64>) -> Result<(), AppError> {
    match expected {
        Some(v) if v != current.version => Err(AppError::Conflict),
        _ => Ok(()),
    }
}
