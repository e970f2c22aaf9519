use argon2::{
    Argon2,
    PasswordHash,
    PasswordVerifier,
    PasswordHasher,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};

use crate::error::AppError;

pub const PIN_LENGTH: usize = 6;
pub const OTP_LENGTH: usize = 6;

/// Verify a PIN against the Argon2 hash stored on the account.
pub fn verify_pin(pin: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok()
}

/// Hash a new PIN using Argon2id with a random salt.
pub fn hash_pin(pin: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut PHOsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(pin.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| AppError::Internal(format!("argon2 hash error: {e}")))
}

/// Generate an opaque session token to return to the client.
/// Only hash(token) is ever stored.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash token for storage (SHA-256 hex).
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}

/// `OTP_LENGTH` random digits, zero padded.
pub fn generate_otp_code() -> String {
    let n: u32 = OsRng.gen_range(0..10u32.pow(OTP_LENGTH as u32));
    format!("{n:0width$}", width = OTP_LENGTH)
}

/// OTP codes are salted with their challenge id so equal codes never share a hash.
pub fn hash_otp_code(challenge_id: Uuid, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(challenge_id.as_bytes());
    hasher.update(code.trim().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && pin.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_hash_verifies_only_the_same_pin() {
        let h = hash_pin("482913").unwrap();
        assert!(verify_pin("482913", &h));
        assert!(!verify_pin("482914", &h));
        assert!(!verify_pin("482913", "not-a-phc-string"));
    }

    #[test]
    fn tokens_are_unique_and_hash_stably() {
        let a = generate_access_token();
        let b = generate_access_token();
        assert_ne!(a, b);
        assert_eq!(hash_access_token(&a), hash_access_token(&a));
        assert_eq!(hash_access_token(&a).len(), 64);
    }

    #[test]
    fn otp_codes_are_six_digits() {
        for _ in 0..50 {
            let c = generate_otp_code();
            assert_eq!(c.len(), OTP_LENGTH);
            assert!(c.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn otp_hash_depends_on_challenge() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(hash_otp_code(a, "123456"), hash_otp_code(a, " 123456 "));
        assert_ne!(hash_otp_code(a, "123456"), hash_otp_code(b, "123456"));
    }

    #[test]
    fn pin_shape() {
        assert!(is_valid_pin("000123"));
        assert!(!is_valid_pin("12345"));
        assert!(!is_valid_pin("1234567"));
        assert!(!is_valid_pin("12a456"));
    }
}
