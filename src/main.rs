mod appointments;
mod auth;
mod blob;
mod clock;
mod concerns;
mod config;
mod db;
mod error;
mod identity;
mod middleware;
mod models;
mod profile;
mod routes;
mod session;
mod updates;

use std::sync::Arc;

use crate::{
    appointments::{MemoryAppointmentStore, PgAppointmentStore},
    blob::LocalBlobStorage,
    clock::SystemClock,
    concerns::{MemoryConcernStore, PgConcernStore},
    config::Config,
    identity::{LogOtpSender, MemoryIdentityStore, PgIdentityStore},
    models::{AppState, Backends},
    profile::{MemoryProfileStore, PgProfileStore},
    updates::{MemoryUpdateStore, PgUpdateStore},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    tokio::fs::create_dir_all(&cfg.upload_dir).await?;

    let blobs = Arc::new(LocalBlobStorage::new(&cfg.upload_dir, &cfg.public_base_url));
    let sms = Arc::new(LogOtpSender);
    let clock = Arc::new(SystemClock);

    let backends = match cfg.database_url.as_deref() {
        Some(url) => {
            let pool = db::connect_pg(url, cfg.request_timeout).await?;
            Backends {
                identity: Arc::new(PgIdentityStore::new(pool.clone())),
                appointments: Arc::new(PgAppointmentStore::new(pool.clone())),
                profiles: Arc::new(PgProfileStore::new(pool.clone())),
                concerns: Arc::new(PgConcernStore::new(pool.clone())),
                updates: Arc::new(PgUpdateStore::new(pool)),
                blobs,
                sms,
                clock,
            }
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores; data is lost on restart");
            Backends {
                identity: Arc::new(MemoryIdentityStore::new()),
                appointments: Arc::new(MemoryAppointmentStore::new()),
                profiles: Arc::new(MemoryProfileStore::new()),
                concerns: Arc::new(MemoryConcernStore::new()),
                updates: Arc::new(MemoryUpdateStore::new()),
                blobs,
                sms,
                clock,
            }
        }
    };

    let state = AppState::assemble(&cfg, backends);

    // mobile clients and local web previews call the API cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state, &cfg.upload_dir)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
