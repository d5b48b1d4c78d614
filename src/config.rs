use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// New `like` edges a user may record per UTC day. `0` disables the quota.
    pub daily_like_limit: u32,
    /// Period of the background mutuality repair. `0` disables it.
    pub reconcile_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
    pub max_attempts: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub matching: MatchingConfig,
    pub otp: OtpConfig,
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "APP_PORT", 8080)?;
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "shaadi-mantrana".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "shaadi-mantrana-users".into()),
            ttl_minutes: parse_or(&lookup, "JWT_TTL_MINUTES", 60)?,
            refresh_ttl_minutes: parse_or(&lookup, "JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
        };
        let matching = MatchingConfig {
            daily_like_limit: parse_or(&lookup, "DAILY_LIKE_LIMIT", 5)?,
            reconcile_interval_secs: parse_or(&lookup, "RECONCILE_INTERVAL_SECS", 300)?,
        };
        let otp = OtpConfig {
            ttl_minutes: parse_or(&lookup, "OTP_TTL_MINUTES", 10)?,
            max_attempts: parse_or(&lookup, "OTP_MAX_ATTEMPTS", 5)?,
        };
        let admin_emails = lookup("ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            database_url,
            jwt,
            matching,
            otp,
            admin_emails,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("APP_HOST/APP_PORT do not form an address: {}:{}", self.host, self.port))
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e == email)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
