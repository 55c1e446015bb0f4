//! Progress command - show one project's derived progress snapshot.

use anyhow::Context;
use clap::Args;
use std::path::Path;

use crate::cli::output::{format_percent, print_status_line, print_table};

/// Arguments for the progress command
#[derive(Args, Debug, Clone)]
pub struct ProgressArgs {
    /// Project ID
    pub project: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(db_path: &Path, args: ProgressArgs) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;

    rt.block_on(async {
        let db = crate::cli::open_db(db_path).await?;
        let project = db
            .get_project(args.project)
            .await?
            .with_context(|| format!("Project {} not found", args.project))?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&project)?);
            return Ok(());
        }

        println!("Project #{}: {}", project.id, project.name);
        if let Some(kw) = project.capacity_kw {
            println!("Capacity: {kw:.1} kW");
        }
        println!();

        let p = &project.progress;
        print_table(
            &["TRACK", "PROGRESS", "STAGE"],
            vec![
                vec![
                    "admin".to_string(),
                    format_percent(p.admin_progress),
                    p.admin_stage.clone().unwrap_or_else(|| "-".to_string()),
                ],
                vec![
                    "engineering".to_string(),
                    format_percent(p.engineering_progress),
                    p.engineering_stage
                        .clone()
                        .unwrap_or_else(|| "-".to_string()),
                ],
                vec![
                    "overall".to_string(),
                    format_percent(p.overall_progress),
                    "".to_string(),
                ],
            ],
        );
        print_status_line("Construction", p.construction_status);
        Ok(())
    })
}
