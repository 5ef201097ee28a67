use std::path::Path;

use anyhow::{Context, Result};

use inkbridge_lib::sync::{MetadataIndex, Reconciler};

use crate::app::{self, App};
use crate::OutputFormat;

pub fn run(app: &App, workspace: &Path, format: &OutputFormat) -> Result<()> {
    let root = app.workspace(workspace)?;

    let (report, index) = app::runtime()?.block_on(async {
        let store = app.open_store().await?;
        let mut index = MetadataIndex::new();
        let report = Reconciler::new(&*store, &app.codec, &root)
            .with_timeout(app.settings.remote_timeout())
            .run(&mut index)
            .await
            .context("Reconciliation failed")?;
        anyhow::Ok((report, index))
    })?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "workspace": root.to_string_lossy(),
                "report": report,
                "index": index,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Synced {}", root.display());
            let rows = [
                ("Notebooks created locally", report.notebooks_created_locally),
                ("Notebooks created remotely", report.notebooks_created_remotely),
                ("Notes created remotely", report.notes_created_remotely),
                ("Notes written locally", report.notes_written_locally),
                ("Notes pushed", report.notes_pushed),
                ("Notes pulled", report.notes_pulled),
                ("Local files deleted", report.local_files_deleted),
                ("Foreign notes skipped", report.foreign_notes),
                ("Format mismatches", report.format_mismatches),
                ("Unchanged", report.unchanged),
            ];
            for (label, count) in rows {
                println!("  {:<28} {}", label, count);
            }
            println!(
                "\n{} notebooks, {} notes indexed",
                index.notebook_count(),
                index.note_count()
            );
        }
    }

    Ok(())
}
