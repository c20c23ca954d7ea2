use std::{net::SocketAddr, time::Duration};

use axum_extra::extract::cookie::SameSite;
use tracing::warn;

use crate::error::AppError;

pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;
pub const MAX_REQUEST_TIMEOUT_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    /// Anything other than production, development or test runs as development.
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            "test" => Self::Test,
            other => {
                warn!(environment = %other, "unknown environment, running as development");
                Self::Development
            }
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_days: i64,
    pub refresh_ttl_days: i64,
}

/// Attributes shared by the `accessToken` and `refreshToken` cookies.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub secure: bool,
    pub same_site: SameSite,
    pub domain: Option<String>,
    pub access_max_age: time::Duration,
    pub refresh_max_age: time::Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub cors_origins: Vec<String>,
    pub environment: Environment,
    pub log_level: String,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("APP_ENV").or_else(|| get("NODE_ENV")) {
            Some(raw) => Environment::parse(&raw),
            None => Environment::Development,
        };
        let is_prod = environment.is_production();

        let jwt = JwtConfig {
            access_secret: required(&get, "JWT_SECRET")?,
            refresh_secret: required(&get, "REFRESH_TOKEN_SECRET")?,
            access_ttl_days: bounded(&get, "TOKEN_EXPIRES_IN", 7, MAX_TOKEN_TTL_DAYS)?,
            refresh_ttl_days: bounded(&get, "REFRESH_TOKEN_EXPIRES_IN", 30, MAX_TOKEN_TTL_DAYS)?,
        };

        let domain = match get("COOKIE_DOMAIN") {
            Some(d) => Some(d),
            None if is_prod => None,
            None => Some("localhost".to_string()),
        };
        let cookie = CookieConfig {
            secure: is_prod,
            same_site: if is_prod { SameSite::None } else { SameSite::Lax },
            domain,
            access_max_age: time::Duration::days(jwt.access_ttl_days),
            refresh_max_age: time::Duration::days(jwt.refresh_ttl_days),
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let default_level = if is_prod { "info" } else { "debug" };
        let log_level = get("LOG_LEVEL").unwrap_or_else(|| default_level.to_string());

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&get, "PORT", 5500)?,
            database_url: required(&get, "DATABASE_URL")?,
            max_connections: parsed(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt,
            cookie,
            cors_origins,
            environment,
            log_level,
            request_timeout: Duration::from_secs(
                bounded(&get, "REQUEST_TIMEOUT_SECS", 30, MAX_REQUEST_TIMEOUT_SECS)? as u64,
            ),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Configuration(format!("invalid bind address: {e}")))
    }
}

fn required(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, AppError> {
    get(key).ok_or_else(|| AppError::Configuration(format!("missing {key} env variable")))
}

fn parsed<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Configuration(format!("{key} has an invalid value"))),
        None => Ok(default),
    }
}

fn bounded(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: i64,
    max: i64,
) -> Result<i64, AppError> {
    let value = parsed(get, key, default)?;
    if !(1..=max).contains(&value) {
        return Err(AppError::Configuration(format!(
            "{key} must be between 1 and {max}"
        )));
    }
    Ok(value)
}
