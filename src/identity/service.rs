use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{
    generate_access_token, generate_otp_code, hash_access_token, hash_otp_code, hash_pin,
    is_valid_pin, verify_pin,
};
use crate::clock::{bounded, Clock};
use crate::error::AppError;
use crate::identity::phone::normalize_phone;
use crate::identity::sms::{mask, OtpSender};
use crate::identity::store::{Account, IdentityStore, NewSession, OtpChallenge};
use crate::session::{Identity, Session};

pub const MAX_OTP_ATTEMPTS: i32 = 5;
pub const MAX_PIN_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub session_ttl_hours: i64,
    pub otp_ttl_minutes: i64,
    pub default_country_code: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
    pub challenge_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub sent_to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default)]
    pub device_id: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub has_pin: bool,
}

#[cfg(test)]
impl SignedIn {
    pub fn session(&self) -> Session {
        Session::authenticated(Identity {
            user_id: self.user_id,
            session_id: self.session_id,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub user_id: Uuid,
    pub phone_number: String,
    pub has_pin: bool,
    pub bound_device_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountSummary {
    fn from(a: Account) -> Self {
        Self {
            user_id: a.user_id,
            phone_number: a.phone_number,
            has_pin: a.pin_hash.is_some(),
            bound_device_id: a.bound_device_id,
            created_at: a.created_at,
        }
    }
}

/// Phone + one-time code sign-in, PIN setup and PIN sign-in bound to a
/// single device.
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn IdentityStore>,
    sender: Arc<dyn OtpSender>,
    clock: Arc<dyn Clock>,
    settings: IdentitySettings,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        sender: Arc<dyn OtpSender>,
        clock: Arc<dyn Clock>,
        settings: IdentitySettings,
    ) -> Self {
        Self {
            store,
            sender,
            clock,
            settings,
        }
    }

    pub async fn request_otp(&self, raw_phone: &str) -> Result<OtpIssued, AppError> {
        let phone = normalize_phone(raw_phone, &self.settings.default_country_code)?;
        let now = self.clock.now();
        let code = generate_otp_code();
        let challenge_id = Uuid::new_v4();
        let challenge = OtpChallenge {
            challenge_id,
            phone_number: phone.clone(),
            code_hash: hash_otp_code(challenge_id, &code),
            attempts: 0,
            expires_at: now + chrono::Duration::minutes(self.settings.otp_ttl_minutes),
            consumed_at: None,
        };

        bounded(self.settings.timeout, self.store.insert_challenge(&challenge, now)).await?;
        bounded(self.settings.timeout, self.sender.send(&phone, &code)).await?;

        Ok(OtpIssued {
            challenge_id,
            expires_at: challenge.expires_at,
            sent_to: mask(&phone),
        })
    }

    pub async fn verify_otp(
        &self,
        challenge_id: Uuid,
        code: &str,
        device: &DeviceInfo,
    ) -> Result<SignedIn, AppError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::invalid("code", "Please enter the OTP code."));
        }
        let device_id = require_device(device)?;
        let now = self.clock.now();
        let t = self.settings.timeout;

        let challenge = bounded(t, self.store.find_challenge(challenge_id))
            .await?
            .filter(|c| c.consumed_at.is_none() && c.expires_at > now)
            .ok_or(AppError::InvalidCode)?;
        if challenge.attempts >= MAX_OTP_ATTEMPTS {
            return Err(AppError::TooManyAttempts);
        }

        if hash_otp_code(challenge_id, code) != challenge.code_hash {
            let attempts = bounded(t, self.store.record_challenge_attempt(challenge_id)).await?;
            tracing::warn!(%challenge_id, attempts, "wrong one-time code");
            return Err(if attempts >= MAX_OTP_ATTEMPTS {
                AppError::TooManyAttempts
            } else {
                AppError::InvalidCode
            });
        }

        if !bounded(t, self.store.consume_challenge(challenge_id, now)).await? {
            return Err(AppError::InvalidCode);
        }

        let account = bounded(t, self.store.create_account(&challenge.phone_number, now)).await?;
        // proving the phone number is what allows (re)binding a device
        bounded(t, self.store.bind_device(account.user_id, device_id)).await?;

        tracing::info!(user_id = %account.user_id, "signed in with one-time code");
        self.open_session(&account, device_id, device.device_name.clone()).await
    }

    pub async fn set_pin(&self, session: &Session, pin: &str, confirm_pin: &str) -> Result<(), AppError> {
        let owner = session.owner()?;
        let pin = pin.trim();
        if !is_valid_pin(pin) {
            return Err(AppError::invalid("pin", "Please enter a valid 6-digit PIN."));
        }
        if pin != confirm_pin.trim() {
            return Err(AppError::invalid("confirm_pin", "PINs do not match. Please try again."));
        }
        let hash = hash_pin(pin)?;
        bounded(self.settings.timeout, self.store.set_pin(owner, &hash)).await?;
        tracing::info!(user_id = %owner, "PIN set");
        Ok(())
    }

    pub async fn login_with_pin(
        &self,
        raw_phone: &str,
        pin: &str,
        device: &DeviceInfo,
    ) -> Result<SignedIn, AppError> {
        let phone = normalize_phone(raw_phone, &self.settings.default_country_code)?;
        let device_id = require_device(device)?;
        let t = self.settings.timeout;

        let account = bounded(t, self.store.find_account_by_phone(&phone)).await?;
        let Some(account) = account else {
            return Err(AppError::PinNotSet);
        };
        let Some(pin_hash) = account.pin_hash.as_deref() else {
            return Err(AppError::PinNotSet);
        };
        if account.failed_pin_attempts >= MAX_PIN_ATTEMPTS {
            return Err(AppError::TooManyAttempts);
        }
        if account.bound_device_id.as_deref() != Some(device_id) {
            tracing::warn!(user_id = %account.user_id, "PIN sign-in from unbound device");
            return Err(AppError::DeviceNotBound);
        }

        if !verify_pin(pin.trim(), pin_hash) {
            let failures = bounded(t, self.store.record_pin_failure(account.user_id)).await?;
            tracing::warn!(user_id = %account.user_id, failures, "wrong PIN");
            return Err(if failures >= MAX_PIN_ATTEMPTS {
                AppError::TooManyAttempts
            } else {
                AppError::InvalidPin
            });
        }
        if account.failed_pin_attempts > 0 {
            bounded(t, self.store.reset_pin_failures(account.user_id)).await?;
        }

        self.open_session(&account, device_id, device.device_name.clone()).await
    }

    /// Maps a bearer token to the identity behind it, if the session is live.
    pub async fn resolve(&self, token: &str) -> Result<Option<Identity>, AppError> {
        let hash = hash_access_token(token);
        let now = self.clock.now();
        let session = bounded(self.settings.timeout, self.store.find_active_session(&hash, now)).await?;
        Ok(session.map(|s| Identity {
            user_id: s.user_id,
            session_id: s.session_id,
        }))
    }

    pub async fn me(&self, session: &Session) -> Result<AccountSummary, AppError> {
        let owner = session.owner()?;
        bounded(self.settings.timeout, self.store.find_account(owner))
            .await?
            .map(AccountSummary::from)
            .ok_or(AppError::AuthenticationRequired)
    }

    pub async fn logout(&self, session: &Session) -> Result<(), AppError> {
        let identity = session.require()?;
        let now = self.clock.now();
        if !bounded(self.settings.timeout, self.store.revoke_session(identity.session_id, now)).await? {
            return Err(AppError::AuthenticationRequired);
        }
        Ok(())
    }

    async fn open_session(
        &self,
        account: &Account,
        device_id: &str,
        device_name: Option<String>,
    ) -> Result<SignedIn, AppError> {
        let now = self.clock.now();
        let access_token = generate_access_token();
        let record = bounded(
            self.settings.timeout,
            self.store.insert_session(NewSession {
                user_id: account.user_id,
                token_hash: hash_access_token(&access_token),
                device_id: device_id.to_string(),
                device_name,
                expires_at: now + chrono::Duration::hours(self.settings.session_ttl_hours),
                created_at: now,
            }),
        )
        .await?;

        Ok(SignedIn {
            access_token,
            expires_at: record.expires_at,
            user_id: account.user_id,
            session_id: record.session_id,
            has_pin: account.pin_hash.is_some(),
        })
    }
}

fn require_device(device: &DeviceInfo) -> Result<&str, AppError> {
    let id = device.device_id.trim();
    if id.is_empty() {
        return Err(AppError::invalid("device_id", "device_id is required"));
    }
    Ok(id)
}
