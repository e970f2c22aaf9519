use axum::{
    extract::{DefaultBodyLimit, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::{
    blob::MAX_UPLOAD_BODY_BYTES,
    concerns::{Concern, ConcernDraft, ConcernReceipt, Evidence},
    error::ApiError,
    models::{ok, ApiOk, AppState},
    routes::profile_routes::ImageUpload,
    session::Session,
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/concerns",
        get(list_concerns)
            .post(create_concern)
            .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES)),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConcernRequest {
    #[serde(flatten)]
    pub draft: ConcernDraft,
    pub evidence: Option<ImageUpload>,
    /// File the concern even if the photo cannot be stored.
    #[serde(default)]
    pub continue_without_evidence: bool,
}

pub async fn list_concerns(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<Vec<Concern>>>, ApiError> {
    Ok(ok(state.concerns.list(&session).await?))
}

pub async fn create_concern(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Json(req), _): WithRejection<Json<CreateConcernRequest>, ApiError>,
) -> Result<Json<ApiOk<ConcernReceipt>>, ApiError> {
    session.require()?;
    let evidence = match &req.evidence {
        Some(upload) => Some(Evidence {
            bytes: upload.decode()?,
            content_type: upload.content_type.clone(),
        }),
        None => None,
    };
    let receipt = state
        .concerns
        .create(&session, req.draft, evidence, req.continue_without_evidence)
        .await?;
    Ok(ok(receipt))
}
