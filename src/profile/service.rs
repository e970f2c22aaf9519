use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::appointments::OfficeCalendar;
use crate::blob::BlobStorage;
use crate::clock::{bounded, Clock};
use crate::error::AppError;
use crate::profile::model::{ProfileInput, UserProfile};
use crate::profile::store::ProfileStore;
use crate::session::Session;

const PICTURE_FOLDER: &str = "profile_pictures";

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    blobs: Arc<dyn BlobStorage>,
    clock: Arc<dyn Clock>,
    calendar: OfficeCalendar,
    timeout: Duration,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        blobs: Arc<dyn BlobStorage>,
        clock: Arc<dyn Clock>,
        calendar: OfficeCalendar,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            blobs,
            clock,
            calendar,
            timeout,
        }
    }

    /// None until the user completes the details form.
    pub async fn find(&self, owner: Uuid) -> Result<Option<UserProfile>, AppError> {
        bounded(self.timeout, self.store.find(owner)).await
    }

    pub async fn get(&self, session: &Session) -> Result<UserProfile, AppError> {
        self.find(session.owner()?)
            .await?
            .ok_or(AppError::NotFound("profile"))
    }

    pub async fn save(&self, session: &Session, input: ProfileInput) -> Result<UserProfile, AppError> {
        let owner = session.owner()?;
        let existing = self.find(owner).await?;
        let created = existing.is_none();
        let profile = input.apply(owner, existing, &self.calendar, self.clock.now())?;
        bounded(self.timeout, self.store.upsert(&profile)).await?;
        tracing::info!(user_id = %owner, created, "profile saved");
        Ok(profile)
    }

    pub async fn set_picture(
        &self,
        session: &Session,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<UserProfile, AppError> {
        let owner = session.owner()?;
        if self.find(owner).await?.is_none() {
            return Err(AppError::NotFound("profile"));
        }
        let url = bounded(
            self.timeout,
            self.blobs.upload(owner, PICTURE_FOLDER, bytes, content_type),
        )
        .await?;
        let now = self.clock.now();
        let stored = match bounded(self.timeout, self.store.set_picture(owner, &url, now)).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::NotFound("profile")),
            Err(e) => Err(e),
        };
        if let Err(err) = stored {
            if let Err(e) = bounded(self.timeout, self.blobs.remove(&url)).await {
                tracing::warn!(%url, error = %e, "orphaned profile picture left in blob storage");
            }
            return Err(err);
        }
        tracing::info!(user_id = %owner, "profile picture updated");
        self.get(session).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::blob::testing::FailingBlobStorage;
    use crate::blob::LocalBlobStorage;
    use crate::clock::testing::FixedClock;
    use crate::profile::store::MemoryProfileStore;

    fn service(blobs: Arc<dyn BlobStorage>) -> ProfileService {
        ProfileService::new(
            Arc::new(MemoryProfileStore::new()),
            blobs,
            Arc::new(FixedClock::at("2025-03-01T02:00:00Z")),
            OfficeCalendar::new(chrono::FixedOffset::east_opt(8 * 3600).unwrap()),
            Duration::from_secs(20),
        )
    }

    fn local_blobs() -> Arc<dyn BlobStorage> {
        let root = std::env::temp_dir().join(format!("civic-desk-profile-{}", Uuid::new_v4()));
        Arc::new(LocalBlobStorage::new(root, "http://localhost:8080"))
    }

    fn input() -> ProfileInput {
        ProfileInput {
            first_name: "Jose".into(),
            last_name: "Rizal".into(),
            gender: "Male".into(),
            address: "Calamba, Laguna".into(),
            barangay: "Poblacion".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn anonymous_callers_are_turned_away() {
        let svc = service(local_blobs());
        assert!(matches!(
            svc.save(&Session::anonymous(), input()).await,
            Err(AppError::AuthenticationRequired)
        ));
        assert!(matches!(
            svc.get(&Session::anonymous()).await,
            Err(AppError::AuthenticationRequired)
        ));
    }

    #[tokio::test]
    async fn save_then_get() {
        let svc = service(local_blobs());
        let s = Session::for_user(Uuid::new_v4());
        assert!(matches!(svc.get(&s).await, Err(AppError::NotFound("profile"))));

        let saved = svc.save(&s, input()).await.unwrap();
        assert_eq!(svc.get(&s).await.unwrap(), saved);

        let mut bad = input();
        bad.barangay = String::new();
        assert!(svc.save(&s, bad).await.is_err());
        assert_eq!(svc.get(&s).await.unwrap().barangay, "Poblacion");
    }

    #[tokio::test]
    async fn picture_needs_a_profile_and_survives_later_saves() {
        let svc = service(local_blobs());
        let s = Session::for_user(Uuid::new_v4());
        assert!(matches!(
            svc.set_picture(&s, vec![1, 2, 3], "image/png").await,
            Err(AppError::NotFound("profile"))
        ));

        svc.save(&s, input()).await.unwrap();
        let with_pic = svc.set_picture(&s, vec![1, 2, 3], "image/png").await.unwrap();
        let url = with_pic.profile_picture_url.clone().unwrap();
        assert!(url.contains("/uploads/profile_pictures/"));

        let resaved = svc.save(&s, input()).await.unwrap();
        assert_eq!(resaved.profile_picture_url.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn upload_failure_leaves_profile_untouched() {
        let svc = service(Arc::new(FailingBlobStorage));
        let s = Session::for_user(Uuid::new_v4());
        svc.save(&s, input()).await.unwrap();
        let err = svc.set_picture(&s, vec![1], "image/png").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(svc.get(&s).await.unwrap().profile_picture_url, None);
    }

    /// Profile deleted between the existence check and the picture write.
    struct VanishingStore {
        inner: MemoryProfileStore,
    }

    #[async_trait]
    impl ProfileStore for VanishingStore {
        async fn find(&self, owner: Uuid) -> Result<Option<UserProfile>, AppError> {
            self.inner.find(owner).await
        }
        async fn upsert(&self, profile: &UserProfile) -> Result<(), AppError> {
            self.inner.upsert(profile).await
        }
        async fn set_picture(&self, _: Uuid, _: &str, _: DateTime<Utc>) -> Result<bool, AppError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn unsaved_picture_is_removed_from_storage() {
        let root = std::env::temp_dir().join(format!("civic-desk-profile-{}", Uuid::new_v4()));
        let svc = ProfileService::new(
            Arc::new(VanishingStore { inner: MemoryProfileStore::new() }),
            Arc::new(LocalBlobStorage::new(&root, "http://localhost:8080")),
            Arc::new(FixedClock::at("2025-03-01T02:00:00Z")),
            OfficeCalendar::new(chrono::FixedOffset::east_opt(8 * 3600).unwrap()),
            Duration::from_secs(20),
        );
        let owner = Uuid::new_v4();
        let s = Session::for_user(owner);
        svc.save(&s, input()).await.unwrap();

        let err = svc.set_picture(&s, vec![1, 2, 3], "image/png").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("profile")));
        let dir = root.join(PICTURE_FOLDER).join(owner.to_string());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
