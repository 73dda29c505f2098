use std::{path::PathBuf, str::FromStr, time::Duration};

use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use thiserror::Error;

mod customers;
mod dashboard;
mod export;
mod orders;
mod procedure;
mod products;
mod quantities;
mod search;
#[cfg(test)]
mod test_support;

pub use customers::CustomerRepository;
pub use dashboard::DashboardRepository;
pub use export::{ExportDataset, ExportError, ExportFile, ExportOutcome, Exporter, UnknownDataset};
pub use orders::OrderRepository;
pub use procedure::{MutationOutcome, Procedure};
pub use products::ProductRepository;
pub use quantities::QuantityRepository;
pub use search::{SearchFailure, SearchRepository, SearchResults, SearchScope};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens a pool for the provided connection string, creating the file when missing.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn quantities(&self) -> QuantityRepository {
        QuantityRepository::new(self.pool.clone())
    }

    /// Returns a handle for the global search and the order filter.
    pub fn search(&self) -> SearchRepository {
        SearchRepository::new(self.pool.clone())
    }

    /// Returns a handle for the dashboard aggregates.
    pub fn dashboard(&self) -> DashboardRepository {
        DashboardRepository::new(self.pool.clone())
    }

    /// Returns an exporter writing CSV files into `dir`.
    pub fn exporter(&self, dir: impl Into<PathBuf>) -> Exporter {
        Exporter::new(self.pool.clone(), dir.into())
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Errors raised while opening the database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid database url: {0}")]
    Url(sqlx::Error),
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
}

/// A pooled connection could not be acquired. Fatal to the attempted
/// operation; raised before any procedure runs.
#[derive(Debug, Error)]
#[error("database connection unavailable: {0}")]
pub struct ConnectionFault(#[source] pub sqlx::Error);

/// A procedure or query ran and failed. Carries a message fit for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct RemoteFault {
    pub operation: &'static str,
    pub message: String,
}

/// Outcome of any data access call other than a list.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Connection(#[from] ConnectionFault),
    #[error(transparent)]
    Remote(#[from] RemoteFault),
}

impl CallError {
    /// Message shown to the user; remote faults show only their message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(fault) => fault.to_string(),
            Self::Remote(fault) => fault.message.clone(),
        }
    }
}
