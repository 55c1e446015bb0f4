//! Reconcile command - recompute milestone completion and progress.

use clap::Args;
use std::path::Path;
use tracing::info;

use solstice_db::SolsticeDb;
use solstice_engine::{reconcile_all, reconcile_project, ReconcileOutcome};
use solstice_model::WeightConfig;

use crate::cli::output::{format_percent, print_table};

/// Arguments for the reconcile command
#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    /// Project ID to reconcile
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub project: Option<i64>,

    /// Reconcile every project in one pass
    #[arg(long)]
    pub all: bool,

    /// Admin track weight in the overall blend
    #[arg(long, default_value_t = 50.0)]
    pub admin_weight: f64,

    /// Engineering track weight in the overall blend
    #[arg(long, default_value_t = 50.0)]
    pub eng_weight: f64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(db_path: &Path, args: ReconcileArgs) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;

    rt.block_on(async {
        let db = crate::cli::open_db(db_path).await?;
        let rules = db.list_rules().await?;
        let weights = WeightConfig {
            admin_weight: args.admin_weight,
            engineering_weight: args.eng_weight,
        };

        let outcomes = if args.all {
            let ids = db.list_project_ids().await?;
            reconcile_all(&db, &ids, &rules, &weights).await?
        } else {
            let project_id = args.project.unwrap_or_default();
            check_exists(&db, project_id).await?;
            vec![reconcile_project(&db, project_id, &rules, &weights).await?]
        };

        let written = outcomes.iter().filter(|o| o.progress_written).count();
        info!(projects = outcomes.len(), written, "reconciliation pass done");

        if args.json {
            println!("{}", serde_json::to_string_pretty(&to_json(&outcomes))?);
            return Ok(());
        }

        print_outcomes(&outcomes);
        Ok(())
    })
}

async fn check_exists(db: &SolsticeDb, project_id: i64) -> anyhow::Result<()> {
    if db.get_project(project_id).await?.is_none() {
        anyhow::bail!("Project {project_id} not found");
    }
    Ok(())
}

fn print_outcomes(outcomes: &[ReconcileOutcome]) {
    let rows = outcomes
        .iter()
        .map(|o| {
            vec![
                o.project_id.to_string(),
                format_percent(o.snapshot.admin_progress),
                format_percent(o.snapshot.engineering_progress),
                format_percent(o.snapshot.overall_progress),
                o.snapshot.construction_status.as_str().to_string(),
                o.newly_completed.join(", "),
                if o.progress_written { "yes" } else { "no-op" }.to_string(),
            ]
        })
        .collect();

    print_table(
        &[
            "PROJECT",
            "ADMIN",
            "ENG",
            "OVERALL",
            "STATUS",
            "NEWLY COMPLETED",
            "WRITTEN",
        ],
        rows,
    );
}

fn to_json(outcomes: &[ReconcileOutcome]) -> serde_json::Value {
    serde_json::Value::Array(
        outcomes
            .iter()
            .map(|o| {
                serde_json::json!({
                    "projectId": o.project_id,
                    "snapshot": o.snapshot,
                    "newlyCompleted": o.newly_completed,
                    "milestonesWritten": o.milestones_written,
                    "progressWritten": o.progress_written,
                })
            })
            .collect(),
    )
}
