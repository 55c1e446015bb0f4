//! Error taxonomy for the SQLite layer and its mapping into the engine's
//! store errors.

use solstice_engine::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A row the caller referred to does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or foreign-key violation. Version races and duplicate
    /// current rows land here via the partial unique indexes.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A persisted value does not map back to a known enum variant.
    #[error("invalid stored value: {0}")]
    InvalidState(String),

    /// JSON (de)serialization of rule prerequisites or selectors failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

/// Map a sqlx error from an INSERT/UPDATE, turning uniqueness violations
/// into `Constraint` so they surface to the engine as conflicts.
pub(crate) fn map_write_err(err: sqlx::Error) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Constraint(db_err.message().to_string())
        }
        _ => DbError::Sqlx(err),
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Constraint(msg) => StoreError::Conflict(msg),
            other => StoreError::Backend(anyhow::Error::new(other)),
        }
    }
}
