pub mod config;

use std::env;

pub use config::{AppConfig, ConfigError, Environment};

pub const DEFAULT_DB_NAME: &str = "order_desk.db";

/// Connection settings of a networked server. The embedded engine has no use
/// for them.
pub const IGNORED_CONNECTION_VARS: [&str; 3] = ["DB_HOST", "DB_USER", "DB_PASS"];

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production builds
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Returns the SQLite connection string.
///
/// `DATABASE_URL` wins when set; otherwise the file named by `DB_NAME`
/// (default [`DEFAULT_DB_NAME`]) is used.
pub fn database_url() -> String {
    match env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            let name = env::var("DB_NAME")
                .ok()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
            format!("sqlite://{name}")
        }
    }
}

/// Names of [`IGNORED_CONNECTION_VARS`] that are set in the environment.
pub fn ignored_connection_vars() -> Vec<&'static str> {
    IGNORED_CONNECTION_VARS
        .into_iter()
        .filter(|name| env::var_os(name).is_some())
        .collect()
}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));
