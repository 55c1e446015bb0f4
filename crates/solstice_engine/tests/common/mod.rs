//! In-memory store double with failure injection for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use solstice_engine::store::{
    DocumentStore, NewDocumentRow, ProjectStore, StoreError, StoreResult,
};
use solstice_model::{Document, DocumentFilter, ProgressSnapshot, ProjectMilestone};

fn backend(msg: &str) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("{msg}"))
}

#[derive(Default)]
pub struct MockStore {
    pub documents: Mutex<Vec<Document>>,
    pub milestones: Mutex<Vec<ProjectMilestone>>,
    pub progress: Mutex<HashMap<i64, ProgressSnapshot>>,
    pub attachments: Mutex<Vec<(i64, String, String)>>,
    pub audits: Mutex<Vec<(String, i64, String, String)>>,
    next_id: AtomicI64,

    /// Stage 2 conflicts to inject before inserts succeed again, on top of
    /// the uniqueness check the mock always enforces.
    pub inject_conflicts: AtomicU32,
    pub fail_demote: AtomicBool,
    pub fail_promote: AtomicBool,
    pub fail_soft_delete: AtomicBool,
    pub fail_attachment: AtomicBool,
    pub fail_progress_fetch: AtomicBool,
    pub fail_progress_update: AtomicBool,

    pub milestone_writes: AtomicUsize,
    pub progress_writes: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-deleted current rows for a key; the invariant under test says
    /// this is never longer than 1.
    pub fn current_rows(&self, project_id: i64, type_key: &str) -> Vec<Document> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| {
                d.project_id == project_id
                    && d.type_key == type_key
                    && d.is_current
                    && !d.is_deleted
            })
            .cloned()
            .collect()
    }

    pub fn all_rows(&self, project_id: i64, type_key: &str) -> Vec<Document> {
        self.documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.project_id == project_id && d.type_key == type_key)
            .cloned()
            .collect()
    }

    pub fn milestone(&self, project_id: i64, code: &str) -> Option<ProjectMilestone> {
        self.milestones
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.project_id == project_id && m.milestone_code == code)
            .cloned()
    }

    /// Seed a current document row directly, bypassing the writer.
    pub fn seed_document(
        &self,
        project_id: i64,
        doc_type_code: &str,
        submitted_at: Option<chrono::DateTime<Utc>>,
        issued_at: Option<chrono::DateTime<Utc>>,
        attachment_count: i64,
    ) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        self.documents.lock().unwrap().push(Document {
            id,
            project_id,
            type_key: doc_type_code.to_string(),
            doc_type_code: Some(doc_type_code.to_string()),
            legacy_type: None,
            version: 1,
            is_current: true,
            is_deleted: false,
            is_archived: false,
            submitted_at,
            issued_at,
            attachment_count,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub fn seed_milestone(&self, project_id: i64, code: &str, completed: bool) {
        self.milestones.lock().unwrap().push(ProjectMilestone {
            project_id,
            milestone_code: code.to_string(),
            is_completed: completed,
            completed_at: completed.then(Utc::now),
            completed_by: None,
            note: None,
        });
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn find_max_version(
        &self,
        project_id: i64,
        type_key: &str,
    ) -> StoreResult<Option<i64>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.project_id == project_id && d.type_key == type_key && !d.is_deleted)
            .map(|d| d.version)
            .max())
    }

    async fn insert_document(&self, row: &NewDocumentRow) -> StoreResult<Document> {
        if self.inject_conflicts.load(Ordering::SeqCst) > 0 {
            self.inject_conflicts.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Conflict("injected version race".into()));
        }

        let mut docs = self.documents.lock().unwrap();
        let duplicate = docs.iter().any(|d| {
            d.project_id == row.project_id
                && d.type_key == row.type_key
                && d.version == row.version
                && !d.is_deleted
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "duplicate version {} for key '{}'",
                row.version, row.type_key
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let doc = Document {
            id,
            project_id: row.project_id,
            type_key: row.type_key.clone(),
            doc_type_code: row.doc_type_code.clone(),
            legacy_type: row.legacy_type.clone(),
            version: row.version,
            is_current: false,
            is_deleted: false,
            is_archived: row.is_archived,
            submitted_at: row.submitted_at,
            issued_at: row.issued_at,
            attachment_count: 0,
            created_at: now,
            updated_at: now,
        };
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn demote_current(&self, project_id: i64, type_key: &str) -> StoreResult<u64> {
        if self.fail_demote.load(Ordering::SeqCst) {
            return Err(backend("demote unavailable"));
        }
        let mut count = 0;
        for d in self.documents.lock().unwrap().iter_mut() {
            if d.project_id == project_id && d.type_key == type_key && d.is_current && !d.is_deleted
            {
                d.is_current = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn promote_document(&self, document_id: i64) -> StoreResult<()> {
        if self.fail_promote.load(Ordering::SeqCst) {
            return Err(backend("promote unavailable"));
        }
        let mut docs = self.documents.lock().unwrap();
        let (project_id, type_key) = match docs.iter().find(|d| d.id == document_id) {
            Some(d) if !d.is_deleted => (d.project_id, d.type_key.clone()),
            _ => return Err(backend("document not found")),
        };
        // Same enforcement a partial unique index would give.
        let other_current = docs.iter().any(|d| {
            d.project_id == project_id
                && d.type_key == type_key
                && d.is_current
                && !d.is_deleted
                && d.id != document_id
        });
        if other_current {
            return Err(StoreError::Conflict(format!(
                "key '{type_key}' already has a current row"
            )));
        }
        for d in docs.iter_mut() {
            if d.id == document_id {
                d.is_current = true;
            }
        }
        Ok(())
    }

    async fn soft_delete(&self, document_id: i64) -> StoreResult<()> {
        if self.fail_soft_delete.load(Ordering::SeqCst) {
            return Err(backend("soft delete unavailable"));
        }
        for d in self.documents.lock().unwrap().iter_mut() {
            if d.id == document_id {
                d.is_deleted = true;
                d.is_current = false;
            }
        }
        Ok(())
    }

    async fn record_attachment(
        &self,
        document_id: i64,
        file_name: &str,
        storage_ref: &str,
    ) -> StoreResult<i64> {
        if self.fail_attachment.load(Ordering::SeqCst) {
            return Err(backend("file store unavailable"));
        }
        let mut attachments = self.attachments.lock().unwrap();
        attachments.push((document_id, file_name.to_string(), storage_ref.to_string()));
        for d in self.documents.lock().unwrap().iter_mut() {
            if d.id == document_id {
                d.attachment_count += 1;
            }
        }
        Ok(attachments.len() as i64)
    }

    async fn fetch_documents(
        &self,
        project_ids: &[i64],
        filter: &DocumentFilter,
    ) -> StoreResult<Vec<Document>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| project_ids.contains(&d.project_id))
            .filter(|d| filter.include_deleted || !d.is_deleted)
            .filter(|d| !filter.current_only || d.is_current)
            .filter(|d| {
                filter
                    .type_key
                    .as_deref()
                    .map(|k| d.type_key == k)
                    .unwrap_or(true)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProjectStore for MockStore {
    async fn fetch_milestones(&self, project_ids: &[i64]) -> StoreResult<Vec<ProjectMilestone>> {
        Ok(self
            .milestones
            .lock()
            .unwrap()
            .iter()
            .filter(|m| project_ids.contains(&m.project_id))
            .cloned()
            .collect())
    }

    async fn upsert_milestone(&self, milestone: &ProjectMilestone) -> StoreResult<()> {
        self.milestone_writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.milestones.lock().unwrap();
        if let Some(existing) = rows.iter_mut().find(|m| {
            m.project_id == milestone.project_id && m.milestone_code == milestone.milestone_code
        }) {
            *existing = milestone.clone();
        } else {
            rows.push(milestone.clone());
        }
        Ok(())
    }

    async fn fetch_progress(&self, project_id: i64) -> StoreResult<Option<ProgressSnapshot>> {
        if self.fail_progress_fetch.load(Ordering::SeqCst) {
            return Err(backend("project table unavailable"));
        }
        Ok(self.progress.lock().unwrap().get(&project_id).cloned())
    }

    async fn update_project_progress(
        &self,
        project_id: i64,
        snapshot: &ProgressSnapshot,
    ) -> StoreResult<()> {
        if self.fail_progress_update.load(Ordering::SeqCst) {
            return Err(backend("project table unavailable"));
        }
        self.progress_writes.fetch_add(1, Ordering::SeqCst);
        self.progress
            .lock()
            .unwrap()
            .insert(project_id, snapshot.clone());
        Ok(())
    }

    async fn record_audit(
        &self,
        entity_type: &str,
        entity_id: i64,
        action: &str,
        reason: &str,
    ) -> StoreResult<()> {
        self.audits.lock().unwrap().push((
            entity_type.to_string(),
            entity_id,
            action.to_string(),
            reason.to_string(),
        ));
        Ok(())
    }
}
