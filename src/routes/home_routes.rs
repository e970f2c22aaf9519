use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::appointments::Appointment;
use crate::error::ApiError;
use crate::models::{ApiOk, AppState, ok};
use crate::session::Session;

const HOME_UPCOMING: usize = 3;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeData {
    /// None until the details form has been completed.
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub upcoming: Vec<Appointment>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/home", get(home))
}

pub async fn home(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiOk<HomeData>>, ApiError> {
    let owner = session.owner()?;
    let profile = state.profiles.find(owner).await?;
    let upcoming = state.appointments.next_upcoming(&session, HOME_UPCOMING).await?;

    Ok(ok(HomeData {
        display_name: profile.as_ref().map(|p| p.display_name()),
        profile_picture_url: profile.and_then(|p| p.profile_picture_url),
        upcoming,
    }))
}
