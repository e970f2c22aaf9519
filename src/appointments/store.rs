use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::appointments::model::{
    Appointment, AppointmentStatus, AppointmentType, TimeSlot, ValidDraft,
};
use crate::error::AppError;

/// A validated appointment that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub user_id: Uuid,
    pub draft: ValidDraft,
    pub created_at: DateTime<Utc>,
}

/// Durable appointment storage. Every read and write is owner-scoped.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Persists a new record with status Pending and version 1.
    async fn insert(&self, new: NewAppointment) -> Result<Appointment, AppError>;

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<Appointment>, AppError>;

    async fn list_owned(&self, owner: Uuid) -> Result<Vec<Appointment>, AppError>;

    /// Overwrites the mutable fields of `next` only if the stored version is
    /// still `expected_version`. Returns false when the record moved on.
    async fn replace(&self, next: &Appointment, expected_version: i64) -> Result<bool, AppError>;
}

/* ============================================================
   Postgres
   ============================================================ */

pub struct PgAppointmentStore {
    db: PgPool,
}

impl PgAppointmentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    appointment_id: Uuid,
    user_id: Uuid,
    appointment_type: String,
    purpose: String,
    appointment_date: DateTime<Utc>,
    time_slot: String,
    is_virtual: bool,
    status: String,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = AppError;

    fn try_from(r: AppointmentRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str, value: &str| {
            AppError::Network(format!(
                "appointment {} has unknown {what} {value:?}",
                r.appointment_id
            ))
        };
        Ok(Appointment {
            id: r.appointment_id,
            user_id: r.user_id,
            kind: AppointmentType::parse(&r.appointment_type)
                .ok_or_else(|| corrupt("type", &r.appointment_type))?,
            purpose: r.purpose.clone(),
            date: r.appointment_date,
            time: TimeSlot::parse(&r.time_slot).ok_or_else(|| corrupt("time slot", &r.time_slot))?,
            is_virtual: r.is_virtual,
            status: AppointmentStatus::parse(&r.status).ok_or_else(|| corrupt("status", &r.status))?,
            created_at: r.created_at,
            cancelled_at: r.cancelled_at,
            updated_at: r.updated_at,
            version: r.version,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    appointment_id, user_id, appointment_type, purpose, appointment_date, time_slot,
    is_virtual, status, created_at, cancelled_at, updated_at, version
"#;

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    async fn insert(&self, new: NewAppointment) -> Result<Appointment, AppError> {
        let sql = format!(
            r#"
            INSERT INTO appointment (
              user_id, appointment_type, purpose, appointment_date, time_slot,
              is_virtual, status, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, 1)
            RETURNING {SELECT_COLUMNS}
            "#
        );
        let row: AppointmentRow = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(new.user_id)
            .bind(new.draft.kind.label())
            .bind(&new.draft.purpose)
            .bind(new.draft.date)
            .bind(new.draft.time.label())
            .bind(new.draft.is_virtual)
            .bind(AppointmentStatus::Pending.as_str())
            .bind(new.created_at)
            .fetch_one(&self.db)
            .await?;
        row.try_into()
    }

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<Appointment>, AppError> {
        let sql = format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM appointment
            WHERE appointment_id = $1
              AND user_id = $2
            "#
        );
        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db)
            .await?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn list_owned(&self, owner: Uuid) -> Result<Vec<Appointment>, AppError> {
        let sql = format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM appointment
            WHERE user_id = $1
            ORDER BY appointment_date DESC
            "#
        );
        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(Appointment::try_from)
            .collect()
    }

    async fn replace(&self, next: &Appointment, expected_version: i64) -> Result<bool, AppError> {
        let res = sqlx::query(
            r#"
            UPDATE appointment
            SET appointment_type = $4,
                purpose = $5,
                appointment_date = $6,
                time_slot = $7,
                is_virtual = $8,
                status = $9,
                cancelled_at = $10,
                updated_at = $11,
                version = $12
            WHERE appointment_id = $1
              AND user_id = $2
              AND version = $3
            "#,
        )
        .bind(next.id)
        .bind(next.user_id)
        .bind(expected_version)
        .bind(next.kind.label())
        .bind(&next.purpose)
        .bind(next.date)
        .bind(next.time.label())
        .bind(next.is_virtual)
        .bind(next.status.as_str())
        .bind(next.cancelled_at)
        .bind(next.updated_at)
        .bind(next.version)
        .execute(&self.db)
        .await?;

        Ok(res.rows_affected() == 1)
    }
}

/* ============================================================
   In-memory
   ============================================================ */

#[derive(Default)]
pub struct MemoryAppointmentStore {
    rows: RwLock<HashMap<Uuid, Appointment>>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn insert(&self, new: NewAppointment) -> Result<Appointment, AppError> {
        let record = Appointment {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.draft.kind,
            purpose: new.draft.purpose,
            date: new.draft.date,
            time: new.draft.time,
            is_virtual: new.draft.is_virtual,
            status: AppointmentStatus::Pending,
            created_at: new.created_at,
            cancelled_at: None,
            updated_at: new.created_at,
            version: 1,
        };
        self.rows.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<Appointment>, AppError> {
        Ok(self
            .rows
            .read()
            .await
            .get(&id)
            .filter(|a| a.user_id == owner)
            .cloned())
    }

    async fn list_owned(&self, owner: Uuid) -> Result<Vec<Appointment>, AppError> {
        let mut out: Vec<Appointment> = self
            .rows
            .read()
            .await
            .values()
            .filter(|a| a.user_id == owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(out)
    }

    async fn replace(&self, next: &Appointment, expected_version: i64) -> Result<bool, AppError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&next.id) {
            Some(current) if current.user_id == next.user_id && current.version == expected_version => {
                *current = next.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
