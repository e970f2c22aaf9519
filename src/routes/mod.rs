use std::path::Path;

use crate::models::AppState;
use axum::Router;
use tower_http::services::ServeDir;

pub mod appointment_routes;
pub mod auth_routes;
pub mod concern_routes;
pub mod home_routes;
pub mod office_routes;
pub mod profile_routes;
pub mod update_routes;

pub fn router(state: AppState, upload_dir: &Path) -> Router {
    let api = Router::new()
        .merge(appointment_routes::router())
        .merge(profile_routes::router())
        .merge(concern_routes::router())
        .merge(office_routes::router())
        .merge(home_routes::router())
        .merge(update_routes::router());

    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1", api)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .with_state(state)
}

#[cfg(test)]
mod tests;
