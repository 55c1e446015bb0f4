//! Database schema creation for all Solstice tables.
//!
//! All CREATE TABLE statements live here - single source of truth. The two
//! partial unique indexes on `sol_document` are load-bearing: they are the
//! store-level enforcement of version uniqueness and the at-most-one-current
//! invariant that the version writer's protocol relies on.

use crate::error::Result;
use crate::SolsticeDb;
use tracing::info;

impl SolsticeDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // Enable WAL mode for better concurrent access
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;

        self.create_project_tables().await?;
        self.create_document_tables().await?;
        self.create_rule_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    /// Projects, milestone records and the audit log.
    async fn create_project_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sol_project (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                capacity_kw REAL,
                admin_progress REAL NOT NULL DEFAULT 0,
                engineering_progress REAL NOT NULL DEFAULT 0,
                overall_progress REAL NOT NULL DEFAULT 0,
                admin_stage TEXT,
                engineering_stage TEXT,
                construction_status TEXT NOT NULL DEFAULT '尚未開工',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sol_project_milestone (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES sol_project(id),
                milestone_code TEXT NOT NULL,
                is_completed INTEGER NOT NULL DEFAULT 0,
                completed_at INTEGER,
                completed_by TEXT,
                note TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE(project_id, milestone_code)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sol_audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                reason TEXT,
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_milestone_project ON sol_project_milestone(project_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_entity ON sol_audit_log(entity_type, entity_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Versioned documents and their file attachments.
    async fn create_document_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sol_document (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES sol_project(id),
                type_key TEXT NOT NULL,
                doc_type_code TEXT,
                legacy_type TEXT,
                version INTEGER NOT NULL,
                is_current INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                is_archived INTEGER NOT NULL DEFAULT 0,
                submitted_at INTEGER,
                issued_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Version unique per key among non-deleted rows.
        sqlx::query(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_document_version
               ON sol_document(project_id, type_key, version)
               WHERE is_deleted = 0"#,
        )
        .execute(&self.pool)
        .await?;

        // At most one current row per key among non-deleted rows.
        sqlx::query(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_document_current
               ON sol_document(project_id, type_key)
               WHERE is_current = 1 AND is_deleted = 0"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_document_project ON sol_document(project_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sol_document_file (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL REFERENCES sol_document(id),
                file_name TEXT NOT NULL,
                storage_ref TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_document_file_doc ON sol_document_file(document_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Milestone rule tables (seeded configuration).
    async fn create_rule_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sol_milestone_rule (
                code TEXT PRIMARY KEY,
                track TEXT NOT NULL,
                label TEXT NOT NULL,
                weight REAL NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL,
                prerequisites TEXT NOT NULL DEFAULT '[]',
                criterion TEXT NOT NULL,
                selectors TEXT NOT NULL DEFAULT '[]',
                attachment_as_proof INTEGER NOT NULL DEFAULT 1,
                active INTEGER NOT NULL DEFAULT 1
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_rule_track ON sol_milestone_rule(track, sort_order)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
