use std::sync::Arc;
use std::time::Duration;

use crate::appointments::OfficeCalendar;
use crate::clock::bounded;
use crate::error::AppError;
use crate::updates::model::UpdateItem;
use crate::updates::store::UpdateStore;

/// Read-only feed of office announcements. Public, like the office info.
#[derive(Clone)]
pub struct UpdateService {
    store: Arc<dyn UpdateStore>,
    calendar: OfficeCalendar,
    timeout: Duration,
}

impl UpdateService {
    pub fn new(store: Arc<dyn UpdateStore>, calendar: OfficeCalendar, timeout: Duration) -> Self {
        Self {
            store,
            calendar,
            timeout,
        }
    }

    pub async fn feed(&self) -> Result<Vec<UpdateItem>, AppError> {
        let posts = bounded(self.timeout, self.store.latest()).await?;
        tracing::debug!(count = posts.len(), "updates feed loaded");
        Ok(posts
            .into_iter()
            .map(|p| UpdateItem::from_post(p, &self.calendar))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::FixedOffset;
    use uuid::Uuid;

    use super::*;
    use crate::updates::model::UpdatePost;
    use crate::updates::store::MemoryUpdateStore;

    fn office() -> OfficeCalendar {
        OfficeCalendar::new(FixedOffset::east_opt(8 * 3600).unwrap())
    }

    fn post(title: &str, published_at: Option<&str>) -> UpdatePost {
        UpdatePost {
            id: Uuid::new_v4(),
            title: Some(title.into()),
            description: Some("details".into()),
            published_at: published_at.map(|s| s.parse().unwrap()),
            date_label: None,
        }
    }

    #[tokio::test]
    async fn feed_is_newest_first_with_undated_posts_last() {
        let store = Arc::new(MemoryUpdateStore::new());
        store.publish(post("older", Some("2025-02-01T00:00:00Z"))).await;
        store.publish(post("undated", None)).await;
        store.publish(post("newest", Some("2025-03-01T00:00:00Z"))).await;

        let svc = UpdateService::new(store, office(), Duration::from_secs(20));
        let feed = svc.feed().await.unwrap();
        let titles: Vec<&str> = feed.iter().map(|u| u.title.as_str()).collect();
        assert_eq!(titles, vec!["newest", "older", "undated"]);
        assert_eq!(feed[0].date, "March 1, 2025");
        assert_eq!(feed[2].date, "No date");
    }

    struct StalledStore;

    #[async_trait]
    impl UpdateStore for StalledStore {
        async fn latest(&self) -> Result<Vec<UpdatePost>, AppError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let svc = UpdateService::new(Arc::new(StalledStore), office(), Duration::from_secs(15));
        assert!(matches!(svc.feed().await, Err(AppError::Timeout(_))));
    }
}
