use std::sync::Arc;

use axum::Json;
use serde::Serialize;

use crate::appointments::{AppointmentService, AppointmentStore, OfficeCalendar};
use crate::blob::BlobStorage;
use crate::clock::Clock;
use crate::concerns::{ConcernService, ConcernStore};
use crate::config::{Config, OfficeConfig};
use crate::identity::{IdentityService, IdentitySettings, IdentityStore, OtpSender};
use crate::profile::{ProfileService, ProfileStore};
use crate::updates::{UpdateService, UpdateStore};

#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub appointments: AppointmentService,
    pub profiles: ProfileService,
    pub concerns: ConcernService,
    pub updates: UpdateService,
    pub office: OfficeConfig,
}

/// Storage and delivery backends, Postgres-backed or in-memory.
pub struct Backends {
    pub identity: Arc<dyn IdentityStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub concerns: Arc<dyn ConcernStore>,
    pub updates: Arc<dyn UpdateStore>,
    pub blobs: Arc<dyn BlobStorage>,
    pub sms: Arc<dyn OtpSender>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn assemble(cfg: &Config, b: Backends) -> Self {
        let timeout = cfg.request_timeout;
        let calendar = OfficeCalendar::new(cfg.office_offset);
        AppState {
            identity: IdentityService::new(
                b.identity,
                b.sms,
                b.clock.clone(),
                IdentitySettings {
                    session_ttl_hours: cfg.session_ttl_hours,
                    otp_ttl_minutes: cfg.otp_ttl_minutes,
                    default_country_code: cfg.default_country_code.clone(),
                    timeout,
                },
            ),
            appointments: AppointmentService::new(
                b.appointments,
                b.clock.clone(),
                calendar,
                timeout,
            ),
            profiles: ProfileService::new(
                b.profiles,
                b.blobs.clone(),
                b.clock.clone(),
                calendar,
                timeout,
            ),
            concerns: ConcernService::new(b.concerns, b.blobs, b.clock, timeout),
            updates: UpdateService::new(b.updates, calendar, timeout),
            office: cfg.office.clone(),
        }
    }
}

/* -------------------------
   Response envelope
--------------------------*/

/// Every successful body is `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiOk<T>> {
    Json(ApiOk { data })
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl OkData {
    pub fn yes() -> Self {
        OkData { ok: true }
    }
}
