//! Init command - create the database and seed the default rule tables.

use anyhow::Context;
use std::path::Path;
use tracing::info;

use solstice_db::SolsticeDb;

pub fn run(db_path: &Path) -> anyhow::Result<()> {
    let rt = crate::cli::runtime()?;

    rt.block_on(async {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory {}", parent.display())
            })?;
        }

        let db = SolsticeDb::open(db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

        let inserted = db.seed_default_rules().await?;
        let total = db.list_rules().await?.len();
        info!(inserted, total, "seeded milestone rules");

        println!("Database ready at {}", db_path.display());
        println!("Milestone rules: {total} ({inserted} newly seeded)");
        Ok(())
    })
}
