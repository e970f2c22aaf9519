use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::profile::model::{EmergencyContact, Gender, UserProfile};

/// One profile per account, keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;
    async fn upsert(&self, profile: &UserProfile) -> Result<(), AppError>;
    /// False when the user has no profile yet.
    async fn set_picture(&self, user_id: Uuid, url: &str, now: DateTime<Utc>) -> Result<bool, AppError>;
}

pub struct PgProfileStore {
    db: PgPool,
}

impl PgProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    first_name: String,
    last_name: String,
    email: Option<String>,
    date_of_birth: Option<NaiveDate>,
    gender: String,
    address: String,
    barangay: String,
    occupation: Option<String>,
    nationality: Option<String>,
    emergency_name: Option<String>,
    emergency_phone: Option<String>,
    emergency_relationship: Option<String>,
    profile_picture_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = AppError;

    fn try_from(r: ProfileRow) -> Result<Self, Self::Error> {
        let gender = Gender::parse(&r.gender).ok_or_else(|| {
            AppError::Network(format!("profile {} has unknown gender {:?}", r.user_id, r.gender))
        })?;
        let emergency_contact = match (r.emergency_name, r.emergency_phone) {
            (None, None) => None,
            (name, phone) => Some(EmergencyContact {
                name: name.unwrap_or_default(),
                phone: phone.unwrap_or_default(),
                relationship: r.emergency_relationship.unwrap_or_default(),
            }),
        };
        Ok(UserProfile {
            user_id: r.user_id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            date_of_birth: r.date_of_birth,
            gender,
            address: r.address,
            barangay: r.barangay,
            occupation: r.occupation,
            nationality: r.nationality,
            emergency_contact,
            profile_picture_url: r.profile_picture_url,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, first_name, last_name, email, date_of_birth, gender, address, barangay,
                   occupation, nationality, emergency_name, emergency_phone, emergency_relationship,
                   profile_picture_url, created_at, updated_at
            FROM profile
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .map(UserProfile::try_from)
        .transpose()
    }

    async fn upsert(&self, p: &UserProfile) -> Result<(), AppError> {
        let contact = p.emergency_contact.as_ref();
        sqlx::query(
            r#"
            INSERT INTO profile (
              user_id, first_name, last_name, email, date_of_birth, gender, address, barangay,
              occupation, nationality, emergency_name, emergency_phone, emergency_relationship,
              profile_picture_url, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            ON CONFLICT (user_id) DO UPDATE SET
              first_name = EXCLUDED.first_name,
              last_name = EXCLUDED.last_name,
              email = EXCLUDED.email,
              date_of_birth = EXCLUDED.date_of_birth,
              gender = EXCLUDED.gender,
              address = EXCLUDED.address,
              barangay = EXCLUDED.barangay,
              occupation = EXCLUDED.occupation,
              nationality = EXCLUDED.nationality,
              emergency_name = EXCLUDED.emergency_name,
              emergency_phone = EXCLUDED.emergency_phone,
              emergency_relationship = EXCLUDED.emergency_relationship,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(p.user_id)
        .bind(&p.first_name)
        .bind(&p.last_name)
        .bind(p.email.as_deref())
        .bind(p.date_of_birth)
        .bind(p.gender.as_str())
        .bind(&p.address)
        .bind(&p.barangay)
        .bind(p.occupation.as_deref())
        .bind(p.nationality.as_deref())
        .bind(contact.map(|c| c.name.as_str()))
        .bind(contact.map(|c| c.phone.as_str()))
        .bind(contact.map(|c| c.relationship.as_str()))
        .bind(p.profile_picture_url.as_deref())
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn set_picture(&self, user_id: Uuid, url: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let res = sqlx::query(
            r#"
            UPDATE profile
            SET profile_picture_url = $2, updated_at = $3
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(url)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}

#[derive(Default)]
pub struct MemoryProfileStore {
    rows: RwLock<HashMap<Uuid, UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(self.rows.read().await.get(&user_id).cloned())
    }

    async fn upsert(&self, profile: &UserProfile) -> Result<(), AppError> {
        let mut rows = self.rows.write().await;
        let picture = rows
            .get(&profile.user_id)
            .and_then(|p| p.profile_picture_url.clone());
        let mut next = profile.clone();
        // pictures only change through set_picture
        if picture.is_some() {
            next.profile_picture_url = picture;
        }
        rows.insert(profile.user_id, next);
        Ok(())
    }

    async fn set_picture(&self, user_id: Uuid, url: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        match self.rows.write().await.get_mut(&user_id) {
            Some(p) => {
                p.profile_picture_url = Some(url.to_string());
                p.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
