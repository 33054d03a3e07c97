use std::path::Path;

use anyhow::{anyhow, Context, Result};

use photo_archive::storage::{self, RestoreKind};

use crate::app::{describe, App};

pub async fn run_restore(app: &App, kind: &str, file: &Path) -> Result<()> {
    let kind: RestoreKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let text = storage::read_restore_candidate(kind, file)
        .with_context(|| format!("Refusing to restore {}", file.display()))?;

    let outcome = app.manager.restore(kind, &text).await?;
    println!(
        "Restored {} chapters from {}: {}",
        outcome.value,
        file.display(),
        describe(&outcome.durability)
    );
    Ok(())
}

pub fn run_export(app: &App, dir: &Path) -> Result<()> {
    let config = app.manager.config();
    let written = storage::export_archive(
        dir,
        &app.manager.snapshot(),
        &config.source_path,
        &config.json_path,
    )
    .context("Export failed")?;

    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
