use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::concerns::model::{Concern, ConcernCategory, ConcernStatus, ValidConcern};
use crate::error::AppError;

#[async_trait]
pub trait ConcernStore: Send + Sync {
    async fn insert(
        &self,
        owner: Uuid,
        concern: ValidConcern,
        evidence_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Concern, AppError>;

    /// Newest first.
    async fn list_owned(&self, owner: Uuid) -> Result<Vec<Concern>, AppError>;
}

pub struct PgConcernStore {
    db: PgPool,
}

impl PgConcernStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConcernRow {
    concern_id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    location: String,
    category: String,
    status: String,
    evidence_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConcernRow> for Concern {
    type Error = AppError;

    fn try_from(r: ConcernRow) -> Result<Self, Self::Error> {
        let category = ConcernCategory::parse(&r.category).ok_or_else(|| {
            AppError::Network(format!("concern {} has unknown category {:?}", r.concern_id, r.category))
        })?;
        let status = ConcernStatus::parse(&r.status).ok_or_else(|| {
            AppError::Network(format!("concern {} has unknown status {:?}", r.concern_id, r.status))
        })?;
        Ok(Concern {
            id: r.concern_id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            location: r.location,
            category,
            status,
            evidence_url: r.evidence_url,
            created_at: r.created_at,
        })
    }
}

#[async_trait]
impl ConcernStore for PgConcernStore {
    async fn insert(
        &self,
        owner: Uuid,
        c: ValidConcern,
        evidence_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Concern, AppError> {
        sqlx::query_as::<_, ConcernRow>(
            r#"
            INSERT INTO concern (user_id, title, description, location, category, status, evidence_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING concern_id, user_id, title, description, location, category, status, evidence_url, created_at
            "#,
        )
        .bind(owner)
        .bind(&c.title)
        .bind(&c.description)
        .bind(&c.location)
        .bind(c.category.as_str())
        .bind(ConcernStatus::Pending.as_str())
        .bind(evidence_url.as_deref())
        .bind(now)
        .fetch_one(&self.db)
        .await?
        .try_into()
    }

    async fn list_owned(&self, owner: Uuid) -> Result<Vec<Concern>, AppError> {
        sqlx::query_as::<_, ConcernRow>(
            r#"
            SELECT concern_id, user_id, title, description, location, category, status, evidence_url, created_at
            FROM concern
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Concern::try_from)
        .collect()
    }
}

#[derive(Default)]
pub struct MemoryConcernStore {
    rows: RwLock<Vec<Concern>>,
}

impl MemoryConcernStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConcernStore for MemoryConcernStore {
    async fn insert(
        &self,
        owner: Uuid,
        c: ValidConcern,
        evidence_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Concern, AppError> {
        let concern = Concern {
            id: Uuid::new_v4(),
            user_id: owner,
            title: c.title,
            description: c.description,
            location: c.location,
            category: c.category,
            status: ConcernStatus::Pending,
            evidence_url,
            created_at: now,
        };
        self.rows.write().await.push(concern.clone());
        Ok(concern)
    }

    async fn list_owned(&self, owner: Uuid) -> Result<Vec<Concern>, AppError> {
        let rows = self.rows.read().await;
        let mut out: Vec<Concern> = rows.iter().filter(|c| c.user_id == owner).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}
