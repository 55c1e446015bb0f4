//! Project operations: CRUD, milestone records, the derived progress cache
//! and the audit log.

use async_trait::async_trait;
use sqlx::Row;

use solstice_engine::store::{ProjectStore, StoreResult};
use solstice_model::{ConstructionStatus, ProgressSnapshot, Project, ProjectMilestone};

use crate::error::{DbError, Result};
use crate::SolsticeDb;

impl SolsticeDb {
    /// Create a new project with zeroed progress.
    pub async fn create_project(&self, name: &str, capacity_kw: Option<f64>) -> Result<Project> {
        let now = Self::now_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO sol_project (name, capacity_kw, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(capacity_kw)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_project(id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("project {id} vanished after insert")))
    }

    pub async fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT * FROM sol_project WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| Self::row_to_project(&row)).transpose()
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query("SELECT * FROM sol_project ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_project).collect()
    }

    pub async fn list_project_ids(&self) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT id FROM sol_project ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    /// Manually set a milestone's completion flag. This is the only path
    /// that may uncomplete a milestone; reconciliation never does.
    pub async fn set_milestone_manual(
        &self,
        project_id: i64,
        code: &str,
        completed: bool,
        actor: Option<&str>,
        note: Option<&str>,
    ) -> Result<()> {
        let now = Self::now_millis();
        let completed_at = completed.then_some(now);
        sqlx::query(
            r#"
            INSERT INTO sol_project_milestone
                (project_id, milestone_code, is_completed, completed_at,
                 completed_by, note, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, milestone_code) DO UPDATE SET
                is_completed = excluded.is_completed,
                completed_at = excluded.completed_at,
                completed_by = excluded.completed_by,
                note = excluded.note,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(project_id)
        .bind(code)
        .bind(completed)
        .bind(completed_at)
        .bind(actor)
        .bind(note)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_project(row: &sqlx::sqlite::SqliteRow) -> Result<Project> {
        Ok(Project {
            id: row.get("id"),
            name: row.get("name"),
            capacity_kw: row.get("capacity_kw"),
            progress: Self::row_to_progress(row)?,
            created_at: Self::millis_to_datetime(row.get("created_at")),
            updated_at: Self::millis_to_datetime(row.get("updated_at")),
        })
    }

    fn row_to_progress(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressSnapshot> {
        let status_str: String = row.get("construction_status");
        let construction_status = ConstructionStatus::parse(&status_str).ok_or_else(|| {
            DbError::invalid_state(format!("unknown construction status: {status_str}"))
        })?;

        Ok(ProgressSnapshot {
            admin_progress: row.get("admin_progress"),
            engineering_progress: row.get("engineering_progress"),
            overall_progress: row.get("overall_progress"),
            admin_stage: row.get("admin_stage"),
            engineering_stage: row.get("engineering_stage"),
            construction_status,
        })
    }

    fn row_to_milestone(row: &sqlx::sqlite::SqliteRow) -> ProjectMilestone {
        ProjectMilestone {
            project_id: row.get("project_id"),
            milestone_code: row.get("milestone_code"),
            is_completed: row.get("is_completed"),
            completed_at: Self::opt_millis(row.get("completed_at")),
            completed_by: row.get("completed_by"),
            note: row.get("note"),
        }
    }
}

#[async_trait]
impl ProjectStore for SolsticeDb {
    async fn fetch_milestones(&self, project_ids: &[i64]) -> StoreResult<Vec<ProjectMilestone>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; project_ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM sol_project_milestone WHERE project_id IN ({placeholders})
             ORDER BY project_id, milestone_code"
        );

        let mut query = sqlx::query(&sql);
        for id in project_ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;
        Ok(rows.iter().map(Self::row_to_milestone).collect())
    }

    async fn upsert_milestone(&self, milestone: &ProjectMilestone) -> StoreResult<()> {
        let now = Self::now_millis();
        sqlx::query(
            r#"
            INSERT INTO sol_project_milestone
                (project_id, milestone_code, is_completed, completed_at,
                 completed_by, note, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, milestone_code) DO UPDATE SET
                is_completed = excluded.is_completed,
                completed_at = excluded.completed_at,
                completed_by = excluded.completed_by,
                note = excluded.note,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(milestone.project_id)
        .bind(&milestone.milestone_code)
        .bind(milestone.is_completed)
        .bind(Self::datetime_to_millis(milestone.completed_at))
        .bind(&milestone.completed_by)
        .bind(&milestone.note)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;
        Ok(())
    }

    async fn fetch_progress(&self, project_id: i64) -> StoreResult<Option<ProgressSnapshot>> {
        let row = sqlx::query("SELECT * FROM sol_project WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        Ok(row.map(|row| Self::row_to_progress(&row)).transpose()?)
    }

    async fn update_project_progress(
        &self,
        project_id: i64,
        snapshot: &ProgressSnapshot,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sol_project SET
                admin_progress = ?,
                engineering_progress = ?,
                overall_progress = ?,
                admin_stage = ?,
                engineering_stage = ?,
                construction_status = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(snapshot.admin_progress)
        .bind(snapshot.engineering_progress)
        .bind(snapshot.overall_progress)
        .bind(&snapshot.admin_stage)
        .bind(&snapshot.engineering_stage)
        .bind(snapshot.construction_status.as_str())
        .bind(Self::now_millis())
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(format!("project {project_id}")).into());
        }
        Ok(())
    }

    async fn record_audit(
        &self,
        entity_type: &str,
        entity_id: i64,
        action: &str,
        reason: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sol_audit_log (entity_type, entity_id, action, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(reason)
        .bind(Self::now_millis())
        .execute(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;
        Ok(())
    }
}
