// src/config.rs
use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub session_ttl_days: i64,
    /// Window used by the question query when no publication dates are given.
    pub query_default_days: i64,
    pub password_hash_iterations: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3030,
            database_url: None,
            database_max_connections: 5,
            session_ttl_days: 14,
            query_default_days: 60,
            password_hash_iterations: 600_000,
        }
    }
}

impl Config {
    /// Reads settings from the environment, after `.env` has been loaded.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        if database_url.is_none() {
            warn!("DATABASE_URL not set, polls will be kept in memory only");
        }

        Ok(Self {
            port: try_load("PORT", defaults.port)?,
            database_url,
            database_max_connections: try_load(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            session_ttl_days: try_load("SESSION_TTL_DAYS", defaults.session_ttl_days)?,
            query_default_days: try_load("QUERY_DEFAULT_DAYS", defaults.query_default_days)?,
            password_hash_iterations: try_load(
                "PASSWORD_HASH_ITERATIONS",
                defaults.password_hash_iterations,
            )?,
        })
    }
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
