use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;

#[derive(Clone, Debug)]
pub struct Config {
    /// Absent means "run on in-memory stores" (local development only).
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub request_timeout: Duration,
    pub otp_ttl_minutes: i64,
    pub office_offset: FixedOffset,
    pub default_country_code: String,
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub office: OfficeConfig,
}

#[derive(Clone, Debug)]
pub struct OfficeConfig {
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", 24 * 30);
        // backend calls are bounded to 15..=30 seconds
        let timeout_secs = parse_or::<u64>("REQUEST_TIMEOUT_SECS", 20).clamp(15, 30);
        let otp_ttl_minutes = parse_or("OTP_TTL_MINUTES", 5);

        let offset_minutes = parse_or::<i32>("OFFICE_UTC_OFFSET_MINUTES", 8 * 60);
        let office_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!("OFFICE_UTC_OFFSET_MINUTES out of range: {offset_minutes}")
        })?;

        let default_country_code = env::var("DEFAULT_COUNTRY_CODE")
            .map(|s| s.trim().trim_start_matches('+').to_string())
            .unwrap_or_else(|_| "1".to_string());
        if default_country_code.is_empty() || !default_country_code.chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("DEFAULT_COUNTRY_CODE must be digits, got {default_country_code:?}");
        }

        let upload_dir = PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into()));
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{bind_addr}"))
            .trim_end_matches('/')
            .to_string();

        let office = OfficeConfig {
            name: env::var("OFFICE_NAME").unwrap_or_else(|_| "District Office".into()),
            address: env::var("OFFICE_ADDRESS")
                .unwrap_or_else(|_| "123 Legislative Building, District Ave.".into()),
            phone: env::var("OFFICE_PHONE").unwrap_or_else(|_| "(123) 456-7890".into()),
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            request_timeout: Duration::from_secs(timeout_secs),
            otp_ttl_minutes,
            office_offset,
            default_country_code,
            upload_dir,
            public_base_url,
            office,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}
