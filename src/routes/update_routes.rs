use axum::{extract::State, routing::get, Json, Router};

use crate::{
    error::ApiError,
    models::{ok, ApiOk, AppState},
    updates::UpdateItem,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/updates", get(list_updates))
}

pub async fn list_updates(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<UpdateItem>>>, ApiError> {
    Ok(ok(state.updates.feed().await?))
}
