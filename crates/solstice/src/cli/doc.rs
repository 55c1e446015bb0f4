//! Doc command - upload document versions and list them.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use std::path::Path;
use tracing::info;

use solstice_db::SolsticeDb;
use solstice_engine::writer::{replace_current, AttachmentInput, DocumentUpload};
use solstice_engine::{reconcile_project, DocumentStore, WriterError};
use solstice_model::{DocumentFilter, WeightConfig};

use crate::cli::output::{format_opt_date, print_table};

/// Subcommands for document management
#[derive(Subcommand, Debug, Clone)]
pub enum DocAction {
    /// Upload a new document version, replacing the current one
    Upload {
        /// Project ID
        project: i64,
        /// Document type code (e.g. PPA, GRID_APP)
        #[arg(long, conflicts_with = "legacy")]
        code: Option<String>,
        /// Legacy document label for pre-catalog documents
        #[arg(long)]
        legacy: Option<String>,
        /// Submission date (YYYY-MM-DD)
        #[arg(long)]
        submitted: Option<String>,
        /// Issuance date (YYYY-MM-DD)
        #[arg(long)]
        issued: Option<String>,
        /// Attachment file name to record alongside the version
        #[arg(long)]
        file: Option<String>,
        /// Storage reference for the attachment (defaults to the file name)
        #[arg(long, requires = "file")]
        storage_ref: Option<String>,
        /// Mark the version as archived on upload
        #[arg(long)]
        archived: bool,
        /// Actor recorded in the audit trail
        #[arg(long)]
        actor: Option<String>,
        /// Skip the reconciliation pass after the upload
        #[arg(long)]
        no_reconcile: bool,
        /// Weight of the administrative track in the overall percentage
        #[arg(long, default_value_t = 50.0)]
        admin_weight: f64,
        /// Weight of the engineering track in the overall percentage
        #[arg(long, default_value_t = 50.0)]
        eng_weight: f64,
    },
    /// List document versions for a project
    List {
        /// Project ID
        project: i64,
        /// Show every version, not just the current ones
        #[arg(long)]
        all: bool,
        /// Filter by document type key
        #[arg(long = "type")]
        type_key: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(db_path: &Path, action: DocAction) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;

    rt.block_on(async {
        let db = crate::cli::open_db(db_path).await?;
        match action {
            DocAction::Upload {
                project,
                code,
                legacy,
                submitted,
                issued,
                file,
                storage_ref,
                archived,
                actor,
                no_reconcile,
                admin_weight,
                eng_weight,
            } => {
                run_upload(
                    &db,
                    UploadArgs {
                        project,
                        code,
                        legacy,
                        submitted,
                        issued,
                        file,
                        storage_ref,
                        archived,
                        actor,
                        no_reconcile,
                        weights: WeightConfig {
                            admin_weight,
                            engineering_weight: eng_weight,
                        },
                    },
                )
                .await
            }
            DocAction::List {
                project,
                all,
                type_key,
                json,
            } => run_list(&db, project, all, type_key, json).await,
        }
    })
}

struct UploadArgs {
    project: i64,
    code: Option<String>,
    legacy: Option<String>,
    submitted: Option<String>,
    issued: Option<String>,
    file: Option<String>,
    storage_ref: Option<String>,
    archived: bool,
    actor: Option<String>,
    no_reconcile: bool,
    weights: WeightConfig,
}

async fn run_upload(db: &SolsticeDb, args: UploadArgs) -> anyhow::Result<()> {
    if args.code.is_none() && args.legacy.is_none() {
        anyhow::bail!("Either --code or --legacy is required");
    }

    db.get_project(args.project)
        .await?
        .with_context(|| format!("Project {} not found", args.project))?;

    let attachment = args.file.map(|file_name| {
        let storage_ref = args.storage_ref.unwrap_or_else(|| file_name.clone());
        AttachmentInput {
            file_name,
            storage_ref,
        }
    });

    let upload = DocumentUpload {
        project_id: args.project,
        doc_type_code: args.code,
        legacy_type: args.legacy,
        submitted_at: parse_date(args.submitted.as_deref())?,
        issued_at: parse_date(args.issued.as_deref())?,
        is_archived: args.archived,
        attachment,
        actor: args.actor,
    };

    let doc = match replace_current(db, &upload).await {
        Ok(doc) => doc,
        Err(WriterError::VersionConflict {
            type_key, attempts, ..
        }) => {
            anyhow::bail!(
                "Concurrent uploads for '{type_key}' kept winning the version race \
                 ({attempts} attempts). Retry the upload."
            );
        }
        Err(err) => return Err(err.into()),
    };

    println!(
        "Stored {} v{} for project {} (current)",
        doc.type_key, doc.version, doc.project_id
    );

    if args.no_reconcile {
        return Ok(());
    }

    let rules = db.list_rules().await?;
    let outcome = reconcile_project(db, args.project, &rules, &args.weights).await?;
    info!(
        project_id = args.project,
        newly_completed = outcome.newly_completed.len(),
        "reconciled after upload"
    );
    for code in &outcome.newly_completed {
        println!("Milestone completed: {code}");
    }
    println!(
        "Overall progress: {:.2}%",
        outcome.snapshot.overall_progress
    );
    Ok(())
}

async fn run_list(
    db: &SolsticeDb,
    project: i64,
    all: bool,
    type_key: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let filter = DocumentFilter {
        current_only: !all,
        include_deleted: false,
        type_key,
    };
    let docs = db.fetch_documents(&[project], &filter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    if docs.is_empty() {
        println!("No documents for project {project}.");
        return Ok(());
    }

    let rows = docs
        .iter()
        .map(|d| {
            vec![
                d.type_key.clone(),
                d.version.to_string(),
                if d.is_current { "yes" } else { "" }.to_string(),
                format_opt_date(d.submitted_at),
                format_opt_date(d.issued_at),
                d.attachment_count.to_string(),
            ]
        })
        .collect();

    print_table(
        &["TYPE", "VER", "CURRENT", "SUBMITTED", "ISSUED", "FILES"],
        rows,
    );
    Ok(())
}

/// Parse a YYYY-MM-DD argument into a UTC midnight timestamp.
fn parse_date(value: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{value}', expected YYYY-MM-DD"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("Invalid midnight timestamp")?;
    Ok(Some(midnight.and_utc()))
}
