//! Store contract: the logical operations the engine needs from the backing
//! project/document store.
//!
//! The store's uniqueness indexes are the sole concurrency control; the
//! engine holds no locks of its own and treats a [`StoreError::Conflict`] as
//! a store-enforced race it may retry around.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use solstice_model::{Document, DocumentFilter, ProgressSnapshot, ProjectMilestone};

/// Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation (version race or duplicate current row).
    #[error("store conflict: {0}")]
    Conflict(String),

    /// Any other backend failure.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields for inserting a new document row.
///
/// The writer always inserts with `is_current = false`; promotion is a
/// separate stage of the protocol.
#[derive(Debug, Clone)]
pub struct NewDocumentRow {
    pub project_id: i64,
    pub type_key: String,
    pub doc_type_code: Option<String>,
    pub legacy_type: Option<String>,
    pub version: i64,
    pub is_archived: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
}

/// Document-side operations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Maximum existing version among non-deleted rows under the key, if any.
    async fn find_max_version(&self, project_id: i64, type_key: &str)
        -> StoreResult<Option<i64>>;

    /// Insert a new (inactive) document row. Returns the stored row.
    ///
    /// Must return [`StoreError::Conflict`] on a version-uniqueness
    /// violation so the writer can retry with a fresh version.
    async fn insert_document(&self, row: &NewDocumentRow) -> StoreResult<Document>;

    /// Clear `is_current` on all non-deleted rows under the key. Returns the
    /// number of rows demoted (0 or 1 when the invariant holds).
    async fn demote_current(&self, project_id: i64, type_key: &str) -> StoreResult<u64>;

    /// Mark one row current.
    async fn promote_document(&self, document_id: i64) -> StoreResult<()>;

    /// Soft-delete a row (also clears `is_current`). Deleted rows are never
    /// reused as current.
    async fn soft_delete(&self, document_id: i64) -> StoreResult<()>;

    /// Record a file attachment for a document version.
    async fn record_attachment(
        &self,
        document_id: i64,
        file_name: &str,
        storage_ref: &str,
    ) -> StoreResult<i64>;

    /// Fetch documents for the given projects. Soft-deleted rows are excluded
    /// unless the filter asks for them.
    async fn fetch_documents(
        &self,
        project_ids: &[i64],
        filter: &DocumentFilter,
    ) -> StoreResult<Vec<Document>>;
}

/// Project/milestone-side operations.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Fetch all milestone rows for the given projects.
    async fn fetch_milestones(&self, project_ids: &[i64]) -> StoreResult<Vec<ProjectMilestone>>;

    /// Insert or update one milestone row, keyed on (project, code).
    async fn upsert_milestone(&self, milestone: &ProjectMilestone) -> StoreResult<()>;

    /// Stored progress snapshot, if the project exists.
    async fn fetch_progress(&self, project_id: i64) -> StoreResult<Option<ProgressSnapshot>>;

    /// Write the derived progress snapshot back to the project row.
    async fn update_project_progress(
        &self,
        project_id: i64,
        snapshot: &ProgressSnapshot,
    ) -> StoreResult<()>;

    /// Append an audit entry. Best-effort from the caller's perspective.
    async fn record_audit(
        &self,
        entity_type: &str,
        entity_id: i64,
        action: &str,
        reason: &str,
    ) -> StoreResult<()>;
}
