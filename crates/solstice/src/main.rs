//! Solstice CLI
//!
//! Project-progress tooling for solar installations: document version
//! management, milestone reconciliation, and progress display backed by a
//! local SQLite database.

use clap::{Parser, Subcommand};
use solstice_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "solstice", about = "Solar project progress tracker")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Database path (default: ~/.solstice/solstice.sqlite3)
    #[arg(long, global = true, env = "SOLSTICE_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and seed the default milestone rules
    Init,

    /// Manage projects
    Project {
        #[command(subcommand)]
        action: cli::project::ProjectAction,
    },

    /// Manage project documents
    Doc {
        #[command(subcommand)]
        action: cli::doc::DocAction,
    },

    /// Manage milestone completion records
    Milestone {
        #[command(subcommand)]
        action: cli::milestone::MilestoneAction,
    },

    /// Recompute milestone completion and progress from documents
    Reconcile(cli::reconcile::ReconcileArgs),

    /// Show a project's progress snapshot
    Progress(cli::progress::ProgressArgs),
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    let db_path = cli.db.unwrap_or_else(solstice_logging::default_db_path);

    match cli.command {
        Commands::Init => cli::init::run(&db_path),
        Commands::Project { action } => cli::project::run(&db_path, action),
        Commands::Doc { action } => cli::doc::run(&db_path, action),
        Commands::Milestone { action } => cli::milestone::run(&db_path, action),
        Commands::Reconcile(args) => cli::reconcile::run(&db_path, args),
        Commands::Progress(args) => cli::progress::run(&db_path, args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "solstice",
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {err}");
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}
