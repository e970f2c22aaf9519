//! Citizen-filed concerns (road, garbage, water...) with optional photo evidence.

mod model;
mod service;
mod store;

pub use model::{Concern, ConcernDraft};
pub use service::{ConcernReceipt, ConcernService, Evidence};
pub use store::{ConcernStore, MemoryConcernStore, PgConcernStore};
