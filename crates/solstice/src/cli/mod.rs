//! CLI command modules.

pub mod doc;
pub mod init;
pub mod milestone;
pub mod output;
pub mod progress;
pub mod project;
pub mod reconcile;

use anyhow::Context;
use std::path::Path;

use solstice_db::SolsticeDb;

/// Build the current-thread runtime CLI commands execute on.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

/// Open an existing database, refusing to create one implicitly.
pub async fn open_db(db_path: &Path) -> anyhow::Result<SolsticeDb> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run `solstice init` first.",
            db_path.display()
        );
    }
    SolsticeDb::open_existing(db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}
