//! Milestone rule table: seeding and retrieval.

use sqlx::Row;

use solstice_model::{rules, DocSelector, MatchCriterion, MilestoneRule, Track};

use crate::error::{DbError, Result};
use crate::SolsticeDb;

impl SolsticeDb {
    /// Seed the default rule tables. Idempotent: existing codes are left
    /// untouched, so local weight/label edits survive re-runs.
    pub async fn seed_default_rules(&self) -> Result<usize> {
        self.seed_rules(&rules::default_rules()).await
    }

    pub async fn seed_rules(&self, rules: &[MilestoneRule]) -> Result<usize> {
        let mut inserted = 0;
        for rule in rules {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO sol_milestone_rule
                    (code, track, label, weight, sort_order, prerequisites,
                     criterion, selectors, attachment_as_proof, active)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&rule.code)
            .bind(rule.track.as_str())
            .bind(&rule.label)
            .bind(rule.weight)
            .bind(rule.sort_order)
            .bind(serde_json::to_string(&rule.prerequisites)?)
            .bind(rule.criterion.as_str())
            .bind(serde_json::to_string(&rule.selectors)?)
            .bind(rule.treat_attachment_as_proof)
            .bind(rule.active)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    /// All rules, admin track first, in evaluation order.
    pub async fn list_rules(&self) -> Result<Vec<MilestoneRule>> {
        let rows = sqlx::query(
            "SELECT * FROM sol_milestone_rule ORDER BY track, sort_order",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_rule).collect()
    }

    fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<MilestoneRule> {
        let track_str: String = row.get("track");
        let track = Track::parse(&track_str)
            .ok_or_else(|| DbError::invalid_state(format!("unknown track: {track_str}")))?;

        let criterion_str: String = row.get("criterion");
        let criterion = MatchCriterion::parse(&criterion_str).ok_or_else(|| {
            DbError::invalid_state(format!("unknown match criterion: {criterion_str}"))
        })?;

        let prerequisites: Vec<String> =
            serde_json::from_str(row.get::<&str, _>("prerequisites"))?;
        let selectors: Vec<DocSelector> = serde_json::from_str(row.get::<&str, _>("selectors"))?;

        Ok(MilestoneRule {
            code: row.get("code"),
            track,
            label: row.get("label"),
            weight: row.get("weight"),
            sort_order: row.get("sort_order"),
            prerequisites,
            criterion,
            selectors,
            treat_attachment_as_proof: row.get("attachment_as_proof"),
            active: row.get("active"),
        })
    }
}
