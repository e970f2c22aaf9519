use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::updates::model::UpdatePost;

#[async_trait]
pub trait UpdateStore: Send + Sync {
    /// Newest `published_at` first; posts without one come last.
    async fn latest(&self) -> Result<Vec<UpdatePost>, AppError>;
}

pub struct PgUpdateStore {
    db: PgPool,
}

impl PgUpdateStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UpdateRow {
    update_id: Uuid,
    title: Option<String>,
    description: Option<String>,
    published_at: Option<DateTime<Utc>>,
    date_label: Option<String>,
}

impl From<UpdateRow> for UpdatePost {
    fn from(r: UpdateRow) -> Self {
        UpdatePost {
            id: r.update_id,
            title: r.title,
            description: r.description,
            published_at: r.published_at,
            date_label: r.date_label,
        }
    }
}

#[async_trait]
impl UpdateStore for PgUpdateStore {
    async fn latest(&self) -> Result<Vec<UpdatePost>, AppError> {
        let rows = sqlx::query_as::<_, UpdateRow>(
            r#"
            SELECT update_id, title, description, published_at, date_label
            FROM office_update
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(UpdatePost::from).collect())
    }
}

#[derive(Default)]
pub struct MemoryUpdateStore {
    rows: RwLock<Vec<UpdatePost>>,
}

impl MemoryUpdateStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn publish(&self, post: UpdatePost) {
        self.rows.write().await.push(post);
    }
}

#[async_trait]
impl UpdateStore for MemoryUpdateStore {
    async fn latest(&self) -> Result<Vec<UpdatePost>, AppError> {
        let mut out = self.rows.read().await.clone();
        // None sorts below Some, so undated posts end up last
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(out)
    }
}
