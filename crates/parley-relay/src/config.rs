//! Environment-driven configuration for the relay binary.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// Largest accepted `RELAY_BATCH_SIZE`.
pub const MAX_BATCH_SIZE: u32 = 1000;

/// Relay settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// PostgreSQL connection string (`DATABASE_URL`).
    pub database_url: String,
    /// Operational HTTP listener (`HOST`, `PORT`).
    pub listen_addr: SocketAddr,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`).
    pub max_connections: u32,
    /// Records claimed per batch (`RELAY_BATCH_SIZE`).
    pub batch_size: u32,
    /// Idle sleep between empty polls (`RELAY_POLL_INTERVAL_MS`).
    pub poll_interval: Duration,
    /// How long a failed record holds back its aggregate
    /// (`RELAY_RETRY_BACKOFF_MS`).
    pub retry_backoff: Duration,
    /// Run embedded migrations at startup (`RUN_MIGRATIONS`).
    pub run_migrations: bool,
}

impl RelayConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is unset or any value
    /// fails to parse or is out of range.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns the raw value of
    /// a variable or `None` when it is unset.
    ///
    /// # Errors
    ///
    /// See [`RelayConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config("DATABASE_URL environment variable must be set".to_string())
            })?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parsed(&lookup, "PORT", 3000)?;
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;

        let max_connections: u32 = parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        if max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        let batch_size: u32 = parsed(&lookup, "RELAY_BATCH_SIZE", 50)?;
        if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(AppError::Config(format!(
                "RELAY_BATCH_SIZE must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}"
            )));
        }

        let poll_interval_ms: u64 = parsed(&lookup, "RELAY_POLL_INTERVAL_MS", 1000)?;
        let retry_backoff_ms: u64 = parsed(&lookup, "RELAY_RETRY_BACKOFF_MS", 30_000)?;
        if retry_backoff_ms == 0 {
            return Err(AppError::Config(
                "RELAY_RETRY_BACKOFF_MS must be at least 1".to_string(),
            ));
        }
        let run_migrations: bool = parsed(&lookup, "RUN_MIGRATIONS", true)?;

        Ok(Self {
            database_url,
            listen_addr,
            max_connections,
            batch_size,
            poll_interval: Duration::from_millis(poll_interval_ms),
            retry_backoff: Duration::from_millis(retry_backoff_ms),
            run_migrations,
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
    }
}
