use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Account {
    pub user_id: Uuid,
    pub phone_number: String,
    pub pin_hash: Option<String>,
    pub bound_device_id: Option<String>,
    pub failed_pin_attempts: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpChallenge {
    pub challenge_id: Uuid,
    pub phone_number: String,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub token_hash: String,
    pub device_id: String,
    pub device_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Accounts, one-time-code challenges and sessions.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_account_by_phone(&self, phone: &str) -> Result<Option<Account>, AppError>;
    async fn find_account(&self, user_id: Uuid) -> Result<Option<Account>, AppError>;
    /// Returns the existing account when the phone number is already registered.
    async fn create_account(&self, phone: &str, now: DateTime<Utc>) -> Result<Account, AppError>;
    async fn set_pin(&self, user_id: Uuid, pin_hash: &str) -> Result<(), AppError>;
    /// Binds `device_id` and clears the PIN failure counter.
    async fn bind_device(&self, user_id: Uuid, device_id: &str) -> Result<(), AppError>;
    /// Returns the failure count after incrementing.
    async fn record_pin_failure(&self, user_id: Uuid) -> Result<i32, AppError>;
    async fn reset_pin_failures(&self, user_id: Uuid) -> Result<(), AppError>;

    /// Also drops challenges that are consumed or expired as of `now`.
    async fn insert_challenge(&self, challenge: &OtpChallenge, now: DateTime<Utc>) -> Result<(), AppError>;
    async fn find_challenge(&self, challenge_id: Uuid) -> Result<Option<OtpChallenge>, AppError>;
    /// Returns the attempt count after incrementing.
    async fn record_challenge_attempt(&self, challenge_id: Uuid) -> Result<i32, AppError>;
    /// Marks the challenge used. False if it was already consumed.
    async fn consume_challenge(&self, challenge_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError>;

    async fn insert_session(&self, session: NewSession) -> Result<SessionRecord, AppError>;
    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, AppError>;
    async fn revoke_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError>;
}

/* ============================================================
   Postgres
   ============================================================ */

pub struct PgIdentityStore {
    db: PgPool,
}

impl PgIdentityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_account_by_phone(&self, phone: &str) -> Result<Option<Account>, AppError> {
        Ok(sqlx::query_as::<_, Account>(
            r#"
            SELECT user_id, phone_number, pin_hash, bound_device_id, failed_pin_attempts, created_at
            FROM account
            WHERE phone_number = $1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn find_account(&self, user_id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(sqlx::query_as::<_, Account>(
            r#"
            SELECT user_id, phone_number, pin_hash, bound_device_id, failed_pin_attempts, created_at
            FROM account
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn create_account(&self, phone: &str, now: DateTime<Utc>) -> Result<Account, AppError> {
        // no-op update so RETURNING also yields the existing row
        Ok(sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO account (phone_number, created_at)
            VALUES ($1, $2)
            ON CONFLICT (phone_number)
            DO UPDATE SET phone_number = EXCLUDED.phone_number
            RETURNING user_id, phone_number, pin_hash, bound_device_id, failed_pin_attempts, created_at
            "#,
        )
        .bind(phone)
        .bind(now)
        .fetch_one(&self.db)
        .await?)
    }

    async fn set_pin(&self, user_id: Uuid, pin_hash: &str) -> Result<(), AppError> {
        let res = sqlx::query(
            r#"
            UPDATE account
            SET pin_hash = $2, failed_pin_attempts = 0
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(pin_hash)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("account"));
        }
        Ok(())
    }

    async fn bind_device(&self, user_id: Uuid, device_id: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE account
            SET bound_device_id = $2, failed_pin_attempts = 0
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn record_pin_failure(&self, user_id: Uuid) -> Result<i32, AppError> {
        Ok(sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE account
            SET failed_pin_attempts = failed_pin_attempts + 1
            WHERE user_id = $1
            RETURNING failed_pin_attempts
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?)
    }

    async fn reset_pin_failures(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query(r#"UPDATE account SET failed_pin_attempts = 0 WHERE user_id = $1"#)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn insert_challenge(&self, c: &OtpChallenge, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("DELETE FROM otp_challenge WHERE expires_at <= $1 OR consumed_at IS NOT NULL")
            .bind(now)
            .execute(&self.db)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO otp_challenge (challenge_id, phone_number, code_hash, attempts, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(c.challenge_id)
        .bind(&c.phone_number)
        .bind(&c.code_hash)
        .bind(c.attempts)
        .bind(c.expires_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_challenge(&self, challenge_id: Uuid) -> Result<Option<OtpChallenge>, AppError> {
        Ok(sqlx::query_as::<_, OtpChallenge>(
            r#"
            SELECT challenge_id, phone_number, code_hash, attempts, expires_at, consumed_at
            FROM otp_challenge
            WHERE challenge_id = $1
            "#,
        )
        .bind(challenge_id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn record_challenge_attempt(&self, challenge_id: Uuid) -> Result<i32, AppError> {
        Ok(sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE otp_challenge
            SET attempts = attempts + 1
            WHERE challenge_id = $1
            RETURNING attempts
            "#,
        )
        .bind(challenge_id)
        .fetch_one(&self.db)
        .await?)
    }

    async fn consume_challenge(&self, challenge_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let res = sqlx::query(
            r#"
            UPDATE otp_challenge
            SET consumed_at = $2
            WHERE challenge_id = $1
              AND consumed_at IS NULL
            "#,
        )
        .bind(challenge_id)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn insert_session(&self, s: NewSession) -> Result<SessionRecord, AppError> {
        Ok(sqlx::query_as::<_, SessionRecord>(
            r#"
            INSERT INTO session_token
                (user_id, session_token_hash, device_id, device_name, expires_at, created_at)
            VALUES
                ($1, $2, $3, $4, $5, $6)
            RETURNING session_id, user_id, device_id, device_name, expires_at, created_at
            "#,
        )
        .bind(s.user_id)
        .bind(&s.token_hash)
        .bind(&s.device_id)
        .bind(s.device_name.as_deref())
        .bind(s.expires_at)
        .bind(s.created_at)
        .fetch_one(&self.db)
        .await?)
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, AppError> {
        Ok(sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT session_id, user_id, device_id, device_name, expires_at, created_at
            FROM session_token
            WHERE session_token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn revoke_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = $2
            WHERE session_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}

/* ============================================================
   In-memory
   ============================================================ */

#[derive(Debug, Clone)]
struct StoredSession {
    record: SessionRecord,
    token_hash: String,
    revoked_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    challenges: HashMap<Uuid, OtpChallenge>,
    sessions: HashMap<Uuid, StoredSession>,
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    tables: RwLock<Tables>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_account_by_phone(&self, phone: &str) -> Result<Option<Account>, AppError> {
        let t = self.tables.read().await;
        Ok(t.accounts.values().find(|a| a.phone_number == phone).cloned())
    }

    async fn find_account(&self, user_id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.tables.read().await.accounts.get(&user_id).cloned())
    }

    async fn create_account(&self, phone: &str, now: DateTime<Utc>) -> Result<Account, AppError> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t.accounts.values().find(|a| a.phone_number == phone) {
            return Ok(existing.clone());
        }
        let account = Account {
            user_id: Uuid::new_v4(),
            phone_number: phone.to_string(),
            pin_hash: None,
            bound_device_id: None,
            failed_pin_attempts: 0,
            created_at: now,
        };
        t.accounts.insert(account.user_id, account.clone());
        Ok(account)
    }

    async fn set_pin(&self, user_id: Uuid, pin_hash: &str) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        let a = t.accounts.get_mut(&user_id).ok_or(AppError::NotFound("account"))?;
        a.pin_hash = Some(pin_hash.to_string());
        a.failed_pin_attempts = 0;
        Ok(())
    }

    async fn bind_device(&self, user_id: Uuid, device_id: &str) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        if let Some(a) = t.accounts.get_mut(&user_id) {
            a.bound_device_id = Some(device_id.to_string());
            a.failed_pin_attempts = 0;
        }
        Ok(())
    }

    async fn record_pin_failure(&self, user_id: Uuid) -> Result<i32, AppError> {
        let mut t = self.tables.write().await;
        let a = t.accounts.get_mut(&user_id).ok_or(AppError::NotFound("account"))?;
        a.failed_pin_attempts += 1;
        Ok(a.failed_pin_attempts)
    }

    async fn reset_pin_failures(&self, user_id: Uuid) -> Result<(), AppError> {
        if let Some(a) = self.tables.write().await.accounts.get_mut(&user_id) {
            a.failed_pin_attempts = 0;
        }
        Ok(())
    }

    async fn insert_challenge(&self, challenge: &OtpChallenge, now: DateTime<Utc>) -> Result<(), AppError> {
        let mut t = self.tables.write().await;
        t.challenges
            .retain(|_, c| c.consumed_at.is_none() && c.expires_at > now);
        t.challenges.insert(challenge.challenge_id, challenge.clone());
        Ok(())
    }

    async fn find_challenge(&self, challenge_id: Uuid) -> Result<Option<OtpChallenge>, AppError> {
        Ok(self.tables.read().await.challenges.get(&challenge_id).cloned())
    }

    async fn record_challenge_attempt(&self, challenge_id: Uuid) -> Result<i32, AppError> {
        let mut t = self.tables.write().await;
        let c = t
            .challenges
            .get_mut(&challenge_id)
            .ok_or(AppError::NotFound("challenge"))?;
        c.attempts += 1;
        Ok(c.attempts)
    }

    async fn consume_challenge(&self, challenge_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        match t.challenges.get_mut(&challenge_id) {
            Some(c) if c.consumed_at.is_none() => {
                c.consumed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_session(&self, s: NewSession) -> Result<SessionRecord, AppError> {
        let record = SessionRecord {
            session_id: Uuid::new_v4(),
            user_id: s.user_id,
            device_id: s.device_id,
            device_name: s.device_name,
            expires_at: s.expires_at,
            created_at: s.created_at,
        };
        let mut t = self.tables.write().await;
        // revoked and expired sessions can never resolve again
        t.sessions
            .retain(|_, old| old.revoked_at.is_none() && old.record.expires_at > s.created_at);
        t.sessions.insert(
            record.session_id,
            StoredSession {
                record: record.clone(),
                token_hash: s.token_hash,
                revoked_at: None,
            },
        );
        Ok(record)
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, AppError> {
        let t = self.tables.read().await;
        Ok(t.sessions
            .values()
            .find(|s| s.token_hash == token_hash && s.revoked_at.is_none() && s.record.expires_at > now)
            .map(|s| s.record.clone()))
    }

    async fn revoke_session(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        match t.sessions.get_mut(&session_id) {
            Some(s) if s.revoked_at.is_none() => {
                s.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
