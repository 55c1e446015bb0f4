//! Document operations: versioned rows, attachments and the store-trait
//! surface the version writer runs against.

use async_trait::async_trait;
use sqlx::Row;

use solstice_engine::store::{DocumentStore, NewDocumentRow, StoreResult};
use solstice_model::{Document, DocumentFilter};

use crate::error::{map_write_err, DbError, Result};
use crate::SolsticeDb;

impl SolsticeDb {
    /// Get one document row by id, with its attachment count.
    pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT d.*,
                   (SELECT COUNT(*) FROM sol_document_file f WHERE f.document_id = d.id)
                       AS attachment_count
            FROM sol_document d
            WHERE d.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_document(&row)).transpose()
    }

    async fn insert_document_row(&self, doc: &NewDocumentRow) -> Result<Document> {
        let now = Self::now_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO sol_document
                (project_id, type_key, doc_type_code, legacy_type, version,
                 is_current, is_deleted, is_archived, submitted_at, issued_at,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc.project_id)
        .bind(&doc.type_key)
        .bind(&doc.doc_type_code)
        .bind(&doc.legacy_type)
        .bind(doc.version)
        .bind(doc.is_archived)
        .bind(Self::datetime_to_millis(doc.submitted_at))
        .bind(Self::datetime_to_millis(doc.issued_at))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        let id = result.last_insert_rowid();
        self.get_document(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("document {id} vanished after insert")))
    }

    async fn fetch_document_rows(
        &self,
        project_ids: &[i64],
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; project_ids.len()].join(", ");
        let mut sql = format!(
            r#"
            SELECT d.*,
                   (SELECT COUNT(*) FROM sol_document_file f WHERE f.document_id = d.id)
                       AS attachment_count
            FROM sol_document d
            WHERE d.project_id IN ({placeholders})
            "#
        );
        if !filter.include_deleted {
            sql.push_str(" AND d.is_deleted = 0");
        }
        if filter.current_only {
            sql.push_str(" AND d.is_current = 1");
        }
        if filter.type_key.is_some() {
            sql.push_str(" AND d.type_key = ?");
        }
        sql.push_str(" ORDER BY d.project_id, d.type_key, d.version");

        let mut query = sqlx::query(&sql);
        for id in project_ids {
            query = query.bind(id);
        }
        if let Some(key) = &filter.type_key {
            query = query.bind(key);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_document).collect()
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
        Ok(Document {
            id: row.get("id"),
            project_id: row.get("project_id"),
            type_key: row.get("type_key"),
            doc_type_code: row.get("doc_type_code"),
            legacy_type: row.get("legacy_type"),
            version: row.get("version"),
            is_current: row.get("is_current"),
            is_deleted: row.get("is_deleted"),
            is_archived: row.get("is_archived"),
            submitted_at: Self::opt_millis(row.get("submitted_at")),
            issued_at: Self::opt_millis(row.get("issued_at")),
            attachment_count: row.get("attachment_count"),
            created_at: Self::millis_to_datetime(row.get("created_at")),
            updated_at: Self::millis_to_datetime(row.get("updated_at")),
        })
    }
}

#[async_trait]
impl DocumentStore for SolsticeDb {
    async fn find_max_version(
        &self,
        project_id: i64,
        type_key: &str,
    ) -> StoreResult<Option<i64>> {
        let row = sqlx::query(
            r#"
            SELECT MAX(version) AS max_version FROM sol_document
            WHERE project_id = ? AND type_key = ? AND is_deleted = 0
            "#,
        )
        .bind(project_id)
        .bind(type_key)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;

        Ok(row.get::<Option<i64>, _>("max_version"))
    }

    async fn insert_document(&self, row: &NewDocumentRow) -> StoreResult<Document> {
        Ok(self.insert_document_row(row).await?)
    }

    async fn demote_current(&self, project_id: i64, type_key: &str) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sol_document SET is_current = 0, updated_at = ?
            WHERE project_id = ? AND type_key = ? AND is_current = 1 AND is_deleted = 0
            "#,
        )
        .bind(Self::now_millis())
        .bind(project_id)
        .bind(type_key)
        .execute(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;

        Ok(result.rows_affected())
    }

    async fn promote_document(&self, document_id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sol_document SET is_current = 1, updated_at = ?
            WHERE id = ? AND is_deleted = 0
            "#,
        )
        .bind(Self::now_millis())
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("document {document_id}")).into());
        }
        Ok(())
    }

    async fn soft_delete(&self, document_id: i64) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE sol_document SET is_deleted = 1, is_current = 0, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Self::now_millis())
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;
        Ok(())
    }

    async fn record_attachment(
        &self,
        document_id: i64,
        file_name: &str,
        storage_ref: &str,
    ) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sol_document_file (document_id, file_name, storage_ref, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(document_id)
        .bind(file_name)
        .bind(storage_ref)
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;

        Ok(result.last_insert_rowid())
    }

    async fn fetch_documents(
        &self,
        project_ids: &[i64],
        filter: &DocumentFilter,
    ) -> StoreResult<Vec<Document>> {
        Ok(self.fetch_document_rows(project_ids, filter).await?)
    }
}
