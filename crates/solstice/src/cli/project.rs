//! Project command - create and list projects.

use clap::Subcommand;
use std::path::Path;

use crate::cli::output::{format_percent, print_table};

/// Subcommands for project management
#[derive(Subcommand, Debug, Clone)]
pub enum ProjectAction {
    /// Create a new project
    Add {
        /// Project name
        name: String,
        /// Installed capacity in kW
        #[arg(long)]
        capacity: Option<f64>,
    },
    /// List all projects with their progress
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(db_path: &Path, action: ProjectAction) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;

    rt.block_on(async {
        let db = crate::cli::open_db(db_path).await?;
        match action {
            ProjectAction::Add { name, capacity } => {
                let project = db.create_project(&name, capacity).await?;
                println!("Created project #{}: {}", project.id, project.name);
                Ok(())
            }
            ProjectAction::List { json } => run_list(&db, json).await,
        }
    })
}

async fn run_list(db: &solstice_db::SolsticeDb, json: bool) -> anyhow::Result<()> {
    let projects = db.list_projects().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    if projects.is_empty() {
        println!("No projects. Create one with `solstice project add <name>`.");
        return Ok(());
    }

    let rows = projects
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                p.capacity_kw
                    .map(|kw| format!("{kw:.1}"))
                    .unwrap_or_else(|| "-".to_string()),
                format_percent(p.progress.admin_progress),
                format_percent(p.progress.engineering_progress),
                format_percent(p.progress.overall_progress),
                p.progress.construction_status.as_str().to_string(),
            ]
        })
        .collect();

    print_table(
        &["ID", "NAME", "KW", "ADMIN", "ENG", "OVERALL", "STATUS"],
        rows,
    );
    Ok(())
}
