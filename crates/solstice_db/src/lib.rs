//! Unified SQLite store for Solstice.
//!
//! This crate provides the single database layer for the application: project
//! and document rows, milestone records, rule tables and the audit log. It
//! implements the `solstice_engine` store traits so the reconciler and the
//! version writer run against it unchanged.
//!
//! # Usage
//!
//! ```rust,ignore
//! use solstice_db::{SolsticeDb, Result};
//!
//! let db = SolsticeDb::open("~/.solstice/solstice.sqlite3").await?;
//! db.seed_default_rules().await?;
//!
//! let rules = db.list_rules().await?;
//! let projects = db.list_projects().await?;
//! ```

mod error;
mod schema;

// Method implementations organized by domain
mod documents;
mod projects;
mod rules;

pub use error::{DbError, Result};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;

/// Unified database handle for all Solstice operations.
#[derive(Clone, Debug)]
pub struct SolsticeDb {
    pool: SqlitePool,
}

impl SolsticeDb {
    /// Open a database at the given path, creating the file, its parent
    /// directory and any missing tables or indexes.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self::connect(path, "rwc").await?;
        db.ensure_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(db)
    }

    /// Open an existing database without creating anything.
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DbError::NotFound(format!(
                "Database not found: {}",
                path.display()
            )));
        }
        Self::connect(path, "rw").await
    }

    async fn connect(path: &Path, mode: &str) -> Result<Self> {
        let url = format!("sqlite:{}?mode={mode}", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(&url)
            .await?;
        Ok(Self { pool })
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamps are persisted as integer milliseconds since the Unix epoch.
impl SolsticeDb {
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    pub fn millis_to_datetime(millis: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(chrono::Utc::now)
    }

    pub(crate) fn opt_millis(value: Option<i64>) -> Option<chrono::DateTime<chrono::Utc>> {
        value.and_then(chrono::DateTime::from_timestamp_millis)
    }

    pub(crate) fn datetime_to_millis(
        value: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Option<i64> {
        value.map(|dt| dt.timestamp_millis())
    }
}
