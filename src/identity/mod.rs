//! Sign-in: phone number + one-time code, optional 6-digit PIN bound to one
//! device, and opaque bearer sessions.

mod phone;
mod service;
mod sms;
mod store;

pub use service::{
    AccountSummary, DeviceInfo, IdentityService, IdentitySettings, OtpIssued, SignedIn,
};
pub use sms::{LogOtpSender, OtpSender};
pub use store::{IdentityStore, MemoryIdentityStore, PgIdentityStore};

#[cfg(test)]
pub use sms::testing::CapturingSender;
