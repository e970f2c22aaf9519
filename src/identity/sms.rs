use async_trait::async_trait;

use crate::error::AppError;

/// Delivers one-time codes to a phone number.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, phone_e164: &str, code: &str) -> Result<(), AppError>;
}

/// Development sender: writes the code to the log instead of an SMS gateway.
#[derive(Debug, Default)]
pub struct LogOtpSender;

#[async_trait]
impl OtpSender for LogOtpSender {
    async fn send(&self, phone_e164: &str, code: &str) -> Result<(), AppError> {
        tracing::info!(phone = %mask(phone_e164), %code, "one-time code issued");
        Ok(())
    }
}

/// Keeps the last four digits only.
pub fn mask(phone_e164: &str) -> String {
    let keep = phone_e164.len().saturating_sub(4);
    format!("{}{}", "*".repeat(keep), &phone_e164[keep..])
}
