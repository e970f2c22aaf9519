use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Request body cap for routes that carry a base64 image: the encoded
/// `MAX_UPLOAD_BYTES` plus room for the surrounding JSON fields.
pub const MAX_UPLOAD_BODY_BYTES: usize = MAX_UPLOAD_BYTES.div_ceil(3) * 4 + 256 * 1024;

/// Object storage for user photos (profile pictures, concern evidence).
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores `bytes` and returns a public URL.
    async fn upload(
        &self,
        owner: Uuid,
        folder: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError>;

    /// Deletes a blob previously returned by `upload`. Unknown URLs are ignored.
    async fn remove(&self, url: &str) -> Result<(), AppError>;
}

/// Decodes a base64 payload as sent by clients. Tolerates a `data:` URL prefix.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, AppError> {
    let raw = match payload.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => payload,
    };
    STANDARD
        .decode(raw.trim())
        .map_err(|_| AppError::invalid("data", "The attached image could not be read."))
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Writes blobs under `root/<folder>/<owner>/<uuid>.<ext>`; served back under
/// `<base_url>/uploads/...`.
pub struct LocalBlobStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(
        &self,
        owner: Uuid,
        folder: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, AppError> {
        let ext = extension_for(content_type)
            .ok_or_else(|| AppError::Upload(format!("unsupported content type {content_type:?}")))?;
        if bytes.is_empty() {
            return Err(AppError::Upload("empty payload".into()));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Upload(format!("{} bytes exceeds the limit", bytes.len())));
        }

        let dir = self.root.join(folder).join(owner.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Upload(format!("create {}: {e}", dir.display())))?;

        let name = format!("{}.{ext}", Uuid::new_v4());
        let path = dir.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::Upload(format!("write {}: {e}", path.display())))?;

        tracing::debug!(%owner, folder, size = bytes.len(), "blob stored");
        Ok(format!("{}/uploads/{folder}/{owner}/{name}", self.base_url))
    }

    async fn remove(&self, url: &str) -> Result<(), AppError> {
        let Some(relative) = url
            .strip_prefix(self.base_url.as_str())
            .and_then(|rest| rest.strip_prefix("/uploads/"))
        else {
            return Ok(());
        };
        let relative = Path::new(relative);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Ok(());
        }

        let path = self.root.join(relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Upload(format!("remove {}: {e}", path.display()))),
        }
    }
}
