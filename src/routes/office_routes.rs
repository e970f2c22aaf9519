use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::appointments::{HoursWindow, bookable_hours};
use crate::models::{ApiOk, AppState, ok};

pub fn router() -> Router<AppState> {
    Router::new().route("/office", get(get_office))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeData {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub office_hours: Vec<HoursWindow>,
}

/// Public; no sign-in needed.
pub async fn get_office(State(state): State<AppState>) -> Json<ApiOk<OfficeData>> {
    ok(OfficeData {
        name: state.office.name.clone(),
        address: state.office.address.clone(),
        phone: state.office.phone.clone(),
        office_hours: bookable_hours(),
    })
}
