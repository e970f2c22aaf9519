//! Office announcements, newest first.

mod model;
mod service;
mod store;

pub use model::UpdateItem;
pub use service::UpdateService;
pub use store::{MemoryUpdateStore, PgUpdateStore, UpdateStore};

#[cfg(test)]
pub use model::UpdatePost;
