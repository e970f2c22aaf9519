// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    appointments::{Appointment, AppointmentDraft, AppointmentListing, BookingOptions},
    error::ApiError,
    models::{ok, ApiOk, AppState},
    session::Session,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route("/appointments/options", get(get_options))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment).put(reschedule_appointment),
        )
        .route("/appointments/{appointment_id}/cancel", post(cancel_appointment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    #[serde(flatten)]
    pub draft: AppointmentDraft,
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionQuery {
    pub expected_version: Option<i64>,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<AppointmentListing>>, ApiError> {
    Ok(ok(state.appointments.list_by_owner(&session).await?))
}

pub async fn get_options(State(state): State<AppState>) -> Json<ApiOk<BookingOptions>> {
    ok(state.appointments.options())
}

pub async fn get_appointment(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    Ok(ok(state.appointments.get(&session, appointment_id).await?))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Json(draft), _): WithRejection<Json<AppointmentDraft>, ApiError>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    Ok(ok(state.appointments.create(&session, &draft).await?))
}

pub async fn reschedule_appointment(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<RescheduleRequest>, ApiError>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let updated = state
        .appointments
        .reschedule(&session, appointment_id, &req.draft, req.expected_version)
        .await?;
    Ok(ok(updated))
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    session: Session,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Query(q), _): WithRejection<Query<VersionQuery>, ApiError>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let cancelled = state
        .appointments
        .cancel(&session, appointment_id, q.expected_version)
        .await?;
    Ok(ok(cancelled))
}
