//! Safe document version writer.
//!
//! Introduces a new document version for a (project, type key) and promotes
//! it to current through three separately persisted stages:
//!
//! 1. read the fresh max version and assign max + 1;
//! 2. insert the new row with `is_current = false` (retried on a version
//!    race, up to [`MAX_VERSION_RETRIES`] retries);
//! 3. demote the old current row, then promote the new one.
//!
//! A failure in stage 3 soft-deletes the new row before returning, leaving
//! the key in a valid state. Inserting directly with `is_current = true`
//! would transiently hold two current rows under the store's partial unique
//! index; the staged form trades that for a short window with zero current
//! rows, which readers must treat as "in flux, retry read".

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use solstice_model::Document;

use crate::store::{DocumentStore, NewDocumentRow, ProjectStore, StoreError};

/// Retries after the initial attempt when stage 2 hits a version race.
const MAX_VERSION_RETRIES: u32 = 2;

/// A file to attach once the new version is current.
#[derive(Debug, Clone)]
pub struct AttachmentInput {
    pub file_name: String,
    /// Opaque reference into the external file store.
    pub storage_ref: String,
}

/// One document upload replacing the current version for its key.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub project_id: i64,
    pub doc_type_code: Option<String>,
    pub legacy_type: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub attachment: Option<AttachmentInput>,
    /// Actor recorded in the audit entry.
    pub actor: Option<String>,
}

impl DocumentUpload {
    /// Versioning key: the type code when present, otherwise the legacy label.
    pub fn type_key(&self) -> Option<&str> {
        self.doc_type_code
            .as_deref()
            .or(self.legacy_type.as_deref())
    }
}

/// Writer failures surfaced to the caller.
///
/// For `DemotionFailed` and `PromotionFailed` the newly inserted row has
/// been rolled back (soft-deleted) before the error is returned, unless the
/// rollback itself failed, which is logged for operator intervention.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("upload has neither a type code nor a legacy label")]
    MissingTypeKey,

    #[error(
        "version conflict for project {project_id} key '{type_key}' after {attempts} attempts"
    )]
    VersionConflict {
        project_id: i64,
        type_key: String,
        attempts: u32,
    },

    #[error("failed to demote previous current document")]
    DemotionFailed {
        #[source]
        source: StoreError,
    },

    #[error("failed to promote new document version")]
    PromotionFailed {
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Write a new document version and promote it to current.
///
/// On success the returned [`Document`] is the promoted row. Attachment and
/// audit records are best-effort secondary effects: their failure is logged
/// and does not unwind the document write.
pub async fn replace_current<S>(store: &S, upload: &DocumentUpload) -> Result<Document, WriterError>
where
    S: DocumentStore + ProjectStore,
{
    let type_key = upload.type_key().ok_or(WriterError::MissingTypeKey)?;

    let mut inserted = None;
    let mut attempts = 0u32;
    while attempts <= MAX_VERSION_RETRIES {
        attempts += 1;

        // Stage 1: version assignment, re-read fresh at write time.
        let max = store
            .find_max_version(upload.project_id, type_key)
            .await?
            .unwrap_or(0);
        let version = max + 1;

        // Stage 2: insert inactive.
        let row = NewDocumentRow {
            project_id: upload.project_id,
            type_key: type_key.to_string(),
            doc_type_code: upload.doc_type_code.clone(),
            legacy_type: upload.legacy_type.clone(),
            version,
            is_archived: upload.is_archived,
            submitted_at: upload.submitted_at,
            issued_at: upload.issued_at,
        };
        match store.insert_document(&row).await {
            Ok(doc) => {
                inserted = Some(doc);
                break;
            }
            Err(err) if err.is_conflict() => {
                debug!(
                    project_id = upload.project_id,
                    type_key,
                    version,
                    attempt = attempts,
                    "version race on insert, retrying"
                );
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    let mut doc = match inserted {
        Some(doc) => doc,
        None => {
            return Err(WriterError::VersionConflict {
                project_id: upload.project_id,
                type_key: type_key.to_string(),
                attempts,
            })
        }
    };

    // Stage 3a: demote the old current row.
    if let Err(err) = store.demote_current(upload.project_id, type_key).await {
        rollback(store, doc.id).await;
        return Err(WriterError::DemotionFailed { source: err });
    }

    // Stage 3b: promote the new row. Between a 3b failure and its rollback
    // the key briefly has zero current rows; readers must treat that as
    // in-flux rather than "no document exists".
    if let Err(err) = store.promote_document(doc.id).await {
        rollback(store, doc.id).await;
        return Err(WriterError::PromotionFailed { source: err });
    }
    doc.is_current = true;

    info!(
        project_id = upload.project_id,
        type_key,
        document_id = doc.id,
        version = doc.version,
        "document version promoted"
    );

    // Secondary effects after the promote has committed.
    if let Some(att) = &upload.attachment {
        match store
            .record_attachment(doc.id, &att.file_name, &att.storage_ref)
            .await
        {
            Ok(_) => doc.attachment_count += 1,
            Err(err) => warn!(
                document_id = doc.id,
                file_name = %att.file_name,
                %err,
                "failed to record attachment"
            ),
        }
    }

    let reason = format!(
        "replaced current version with v{} by {}",
        doc.version,
        upload.actor.as_deref().unwrap_or("system")
    );
    if let Err(err) = store.record_audit("document", doc.id, "replace_current", &reason).await {
        warn!(document_id = doc.id, %err, "failed to record audit entry");
    }

    Ok(doc)
}

/// Compensating rollback: soft-delete the orphaned row from stage 2. A
/// rollback failure leaves an inconsistency that needs operator attention;
/// it is logged, not retried indefinitely.
async fn rollback<S: DocumentStore>(store: &S, document_id: i64) {
    if let Err(err) = store.soft_delete(document_id).await {
        error!(
            document_id,
            %err,
            "rollback soft-delete failed; orphaned inactive row needs manual cleanup"
        );
    }
}
