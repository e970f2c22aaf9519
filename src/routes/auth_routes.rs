use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    identity::{AccountSummary, DeviceInfo, OtpIssued, SignedIn},
    models::{ok, ApiOk, AppState, OkData},
    session::Session,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/otp/request", post(request_otp))
        .route("/otp/verify", post(verify_otp))
        .route("/pin", post(set_pin))
        .route("/pin/login", post(pin_login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub challenge_id: Uuid,
    #[serde(default)]
    pub code: String,
    #[serde(flatten)]
    pub device: DeviceInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPinRequest {
    #[serde(default)]
    pub pin: String,
    #[serde(default)]
    pub confirm_pin: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinLoginRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub pin: String,
    #[serde(flatten)]
    pub device: DeviceInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: Uuid,
    /// No profile yet: the client should show the details form next.
    pub is_new_user: bool,
    pub has_pin: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeData {
    pub account: AccountSummary,
    pub profile_complete: bool,
}

async fn sign_in_data(state: &AppState, signed: SignedIn) -> Result<SignInData, ApiError> {
    let profile = state.profiles.find(signed.user_id).await?;
    Ok(SignInData {
        access_token: signed.access_token,
        expires_at: signed.expires_at,
        user_id: signed.user_id,
        is_new_user: profile.is_none(),
        has_pin: signed.has_pin,
    })
}

pub async fn request_otp(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<OtpRequest>, ApiError>,
) -> Result<Json<ApiOk<OtpIssued>>, ApiError> {
    Ok(ok(state.identity.request_otp(&req.phone_number).await?))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<VerifyOtpRequest>, ApiError>,
) -> Result<Json<ApiOk<SignInData>>, ApiError> {
    let signed = state
        .identity
        .verify_otp(req.challenge_id, &req.code, &req.device)
        .await?;
    Ok(ok(sign_in_data(&state, signed).await?))
}

pub async fn set_pin(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Json(req), _): WithRejection<Json<SetPinRequest>, ApiError>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    state.identity.set_pin(&session, &req.pin, &req.confirm_pin).await?;
    Ok(ok(OkData::yes()))
}

pub async fn pin_login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<PinLoginRequest>, ApiError>,
) -> Result<Json<ApiOk<SignInData>>, ApiError> {
    let signed = state
        .identity
        .login_with_pin(&req.phone_number, &req.pin, &req.device)
        .await?;
    Ok(ok(sign_in_data(&state, signed).await?))
}

pub async fn me(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<MeData>>, ApiError> {
    let account = state.identity.me(&session).await?;
    let profile = state.profiles.find(account.user_id).await?;
    Ok(ok(MeData {
        account,
        profile_complete: profile.is_some(),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    state.identity.logout(&session).await?;
    Ok(ok(OkData::yes()))
}
