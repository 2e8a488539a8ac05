use std::str::FromStr;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Argon2id cost parameters. Defaults follow the argon2 crate's recommendation.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PasswordHashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown STORE_BACKEND {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub store_timeout_ms: u64,
    pub email_case_sensitive: bool,
    pub password_hash: PasswordHashConfig,
    pub jwt: JwtConfig,
}

/// Ten years; longer lifetimes cannot be represented as token expiry.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "claimdesk".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "claimdesk-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        if jwt.secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        for (key, value) in [
            ("JWT_TTL_MINUTES", jwt.ttl_minutes),
            ("JWT_REFRESH_TTL_MINUTES", jwt.refresh_ttl_minutes),
        ] {
            if !(1..=MAX_TTL_MINUTES).contains(&value) {
                bail!("{key} must be between 1 and {MAX_TTL_MINUTES}, got {value}");
            }
        }

        let defaults = PasswordHashConfig::default();
        let password_hash = PasswordHashConfig {
            memory_kib: env_parse("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib),
            iterations: env_parse("PASSWORD_HASH_ITERATIONS", defaults.iterations),
            parallelism: env_parse("PASSWORD_HASH_PARALLELISM", defaults.parallelism),
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 8080),
            store_backend,
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS", 5_000),
            email_case_sensitive: env_parse("EMAIL_CASE_SENSITIVE", true),
            password_hash,
            jwt,
        })
    }
}
