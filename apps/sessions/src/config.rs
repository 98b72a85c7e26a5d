//! Environment configuration.
//!
//! Variables (a `.env` file is loaded first when present):
//! - DATABASE_URL: PostgreSQL connection string (required)
//! - DATABASE_MAX_CONNECTIONS: pool size, default 10
//! - LADICO_SESSIONS_COLLECTION: collection holding quiz sessions, default "sessions"
//! - LADICO_PASS_MIN_CORRECT: correct answers needed to pass, default 2
//! - RUST_LOG: tracing filter, default "info"

use ladico_core::PassPolicy;

use crate::error::ConfigError;
use crate::services::sessions::ReconcilerSettings;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_COLLECTION: &str = "sessions";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub sessions_collection: String,
    pub pass_min_correct: u32,
    pub log_filter: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            max_connections: parse_number(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            sessions_collection: lookup("LADICO_SESSIONS_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            pass_min_correct: parse_number(
                &lookup,
                "LADICO_PASS_MIN_CORRECT",
                PassPolicy::default().min_correct,
            )?,
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }

    /// Settings for the session reconciler.
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            collection: self.sessions_collection.clone(),
            pass_policy: PassPolicy {
                min_correct: self.pass_min_correct,
            },
        }
    }
}

fn parse_number<F>(lookup: &F, name: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}
