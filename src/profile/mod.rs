mod model;
mod service;
mod store;

pub use model::{ProfileInput, UserProfile};
pub use service::ProfileService;
pub use store::{MemoryProfileStore, PgProfileStore, ProfileStore};
