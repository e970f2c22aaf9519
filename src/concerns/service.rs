use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::blob::BlobStorage;
use crate::clock::{bounded, Clock};
use crate::concerns::model::{Concern, ConcernDraft};
use crate::concerns::store::ConcernStore;
use crate::error::AppError;
use crate::session::Session;

const EVIDENCE_FOLDER: &str = "concerns";

/// Photo attached to a concern, already decoded.
#[derive(Debug, Clone)]
pub struct Evidence {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcernReceipt {
    pub concern: Concern,
    /// The photo could not be stored and the caller chose to go on without it.
    pub evidence_dropped: bool,
}

#[derive(Clone)]
pub struct ConcernService {
    store: Arc<dyn ConcernStore>,
    blobs: Arc<dyn BlobStorage>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl ConcernService {
    pub fn new(
        store: Arc<dyn ConcernStore>,
        blobs: Arc<dyn BlobStorage>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            blobs,
            clock,
            timeout,
        }
    }

    pub async fn create(
        &self,
        session: &Session,
        draft: ConcernDraft,
        evidence: Option<Evidence>,
        continue_without_evidence: bool,
    ) -> Result<ConcernReceipt, AppError> {
        let owner = session.owner()?;
        let valid = draft.validate()?;

        let mut evidence_dropped = false;
        let evidence_url = match evidence {
            None => None,
            Some(e) => {
                let upload = self.blobs.upload(owner, EVIDENCE_FOLDER, e.bytes, &e.content_type);
                match bounded(self.timeout, upload).await {
                    Ok(url) => Some(url),
                    Err(err) if continue_without_evidence && err.is_retryable() => {
                        tracing::warn!(user_id = %owner, error = %err, "evidence dropped, filing concern without it");
                        evidence_dropped = true;
                        None
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        let now = self.clock.now();
        let inserted = bounded(
            self.timeout,
            self.store.insert(owner, valid, evidence_url.clone(), now),
        )
        .await;
        let concern = match inserted {
            Ok(concern) => concern,
            Err(err) => {
                if let Some(url) = &evidence_url {
                    self.discard_evidence(url).await;
                }
                return Err(err);
            }
        };
        tracing::info!(user_id = %owner, concern_id = %concern.id, category = concern.category.as_str(), "concern filed");
        Ok(ConcernReceipt {
            concern,
            evidence_dropped,
        })
    }

    /// Evidence that no concern points to.
    async fn discard_evidence(&self, url: &str) {
        match bounded(self.timeout, self.blobs.remove(url)).await {
            Ok(()) => tracing::info!(url, "discarded evidence of unsaved concern"),
            Err(e) => tracing::warn!(url, error = %e, "orphaned evidence left in blob storage"),
        }
    }

    pub async fn list(&self, session: &Session) -> Result<Vec<Concern>, AppError> {
        let owner = session.owner()?;
        bounded(self.timeout, self.store.list_owned(owner)).await
    }
}
