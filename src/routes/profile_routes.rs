use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::{
    blob::{decode_base64, MAX_UPLOAD_BODY_BYTES},
    error::ApiError,
    models::{ok, ApiOk, AppState},
    profile::{ProfileInput, UserProfile},
    session::Session,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(save_profile))
        .route(
            "/profile/picture",
            put(set_picture).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES)),
        )
}

/// Image payload as sent by the mobile client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    /// base64, optionally as a `data:` URL
    pub data: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "image/jpeg".to_string()
}

impl ImageUpload {
    pub fn decode(&self) -> Result<Vec<u8>, ApiError> {
        decode_base64(&self.data).map_err(|_| {
            ApiError::BadRequest("BAD_IMAGE", "The attached image could not be read.".into())
        })
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<UserProfile>>, ApiError> {
    Ok(ok(state.profiles.get(&session).await?))
}

pub async fn save_profile(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Json(input), _): WithRejection<Json<ProfileInput>, ApiError>,
) -> Result<Json<ApiOk<UserProfile>>, ApiError> {
    Ok(ok(state.profiles.save(&session, input).await?))
}

pub async fn set_picture(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Json(req), _): WithRejection<Json<ImageUpload>, ApiError>,
) -> Result<Json<ApiOk<UserProfile>>, ApiError> {
    // sign-in is checked before the payload is decoded
    session.require()?;
    let bytes = req.decode()?;
    let profile = state
        .profiles
        .set_picture(&session, bytes, &req.content_type)
        .await?;
    Ok(ok(profile))
}
