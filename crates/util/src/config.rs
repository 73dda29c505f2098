use std::{env, path::PathBuf};

use thiserror::Error;

use super::database_url;

pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_EXPORT_DIR: &str = "exports";
pub const DEFAULT_DISPATCH_MAX_WORKERS: usize = 4;
pub const DEFAULT_DISPATCH_QUEUE_DEPTH: usize = 64;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub database_url: String,
    pub db_max_connections: u32,
    pub export_dir: PathBuf,
    pub dispatch_max_workers: usize,
    pub dispatch_queue_depth: usize,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;

        let export_dir = env::var("EXPORT_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EXPORT_DIR.to_string());

        Ok(Self {
            environment,
            database_url: database_url(),
            db_max_connections: positive("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            export_dir: PathBuf::from(export_dir),
            dispatch_max_workers: positive("DISPATCH_MAX_WORKERS", DEFAULT_DISPATCH_MAX_WORKERS)?,
            dispatch_queue_depth: positive("DISPATCH_QUEUE_DEPTH", DEFAULT_DISPATCH_QUEUE_DEPTH)?,
        })
    }
}

/// Reads a count that must be at least one, falling back to `default` when unset.
fn positive<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value >= T::from(1) => Ok(value),
        _ => Err(ConfigError::NotPositive { name, value: raw }),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APP_ENV must be one of 'development', 'production', or 'test' (got {0})")]
    InvalidEnvironment(String),
    #[error("{name} must be a positive integer (got {value})")]
    NotPositive { name: &'static str, value: String },
}
