//! Milestone command - manual completion records and listing.

use clap::Subcommand;
use std::path::Path;
use tracing::info;

use solstice_db::SolsticeDb;
use solstice_engine::{reconcile_project, ProjectStore};
use solstice_model::{MilestoneRule, WeightConfig};

use crate::cli::output::{format_opt_date, print_table};

/// Subcommands for milestone management
#[derive(Subcommand, Debug, Clone)]
pub enum MilestoneAction {
    /// Manually mark a milestone complete or incomplete
    Set {
        /// Project ID
        project: i64,
        /// Milestone code (e.g. ENG_02_CIVIL_WORKS)
        code: String,
        /// Clear the completion instead of setting it
        #[arg(long)]
        uncomplete: bool,
        /// Actor recorded on the milestone row
        #[arg(long)]
        actor: Option<String>,
        /// Free-form note
        #[arg(long)]
        note: Option<String>,
        /// Skip the reconciliation pass after the change
        #[arg(long)]
        no_reconcile: bool,
        /// Weight of the administrative track in the overall percentage
        #[arg(long, default_value_t = 50.0)]
        admin_weight: f64,
        /// Weight of the engineering track in the overall percentage
        #[arg(long, default_value_t = 50.0)]
        eng_weight: f64,
    },
    /// List milestone state for a project
    List {
        /// Project ID
        project: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(db_path: &Path, action: MilestoneAction) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;

    rt.block_on(async {
        let db = crate::cli::open_db(db_path).await?;
        match action {
            MilestoneAction::Set {
                project,
                code,
                uncomplete,
                actor,
                note,
                no_reconcile,
                admin_weight,
                eng_weight,
            } => {
                run_set(
                    &db,
                    project,
                    &code,
                    !uncomplete,
                    actor.as_deref(),
                    note.as_deref(),
                    no_reconcile,
                    WeightConfig {
                        admin_weight,
                        engineering_weight: eng_weight,
                    },
                )
                .await
            }
            MilestoneAction::List { project, json } => run_list(&db, project, json).await,
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_set(
    db: &SolsticeDb,
    project: i64,
    code: &str,
    completed: bool,
    actor: Option<&str>,
    note: Option<&str>,
    no_reconcile: bool,
    weights: WeightConfig,
) -> anyhow::Result<()> {
    let rules = db.list_rules().await?;
    if !rules.iter().any(|r| r.code == code) {
        let known: Vec<&str> = rules.iter().map(|r| r.code.as_str()).collect();
        anyhow::bail!(
            "Unknown milestone code '{code}'. Known codes: {}",
            known.join(", ")
        );
    }

    let note = match note {
        Some(n) => Some(format!("manual: {n}")),
        None if completed => Some("manual".to_string()),
        None => None,
    };
    db.set_milestone_manual(project, code, completed, actor, note.as_deref())
        .await?;
    println!(
        "Milestone {code} {} for project {project}",
        if completed { "completed" } else { "cleared" }
    );

    if no_reconcile {
        return Ok(());
    }

    let outcome = reconcile_project(db, project, &rules, &weights).await?;
    info!(
        project_id = project,
        overall = outcome.snapshot.overall_progress,
        "reconciled after manual milestone change"
    );
    println!(
        "Overall progress: {:.2}%",
        outcome.snapshot.overall_progress
    );
    Ok(())
}

async fn run_list(db: &SolsticeDb, project: i64, json: bool) -> anyhow::Result<()> {
    let rules = db.list_rules().await?;
    let milestones = db.fetch_milestones(&[project]).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&milestones)?);
        return Ok(());
    }

    let rows = rules
        .iter()
        .map(|rule: &MilestoneRule| {
            let stored = milestones.iter().find(|m| m.milestone_code == rule.code);
            vec![
                rule.track.as_str().to_string(),
                rule.code.clone(),
                rule.label.clone(),
                stored
                    .map(|m| if m.is_completed { "done" } else { "" }.to_string())
                    .unwrap_or_default(),
                format_opt_date(stored.and_then(|m| m.completed_at)),
                stored
                    .and_then(|m| m.note.clone())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    print_table(
        &["TRACK", "CODE", "LABEL", "STATE", "COMPLETED", "NOTE"],
        rows,
    );
    Ok(())
}
