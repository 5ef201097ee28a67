use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use inkbridge_lib::sync::{EventProcessor, MetadataIndex, Reconciler};
use inkbridge_lib::watcher::start_watcher;

use crate::app::{self, App};

/// Reconcile once, then handle filesystem events until interrupted.
pub fn run(app: &App, workspace: &Path) -> Result<()> {
    let root = app.workspace(workspace)?;
    let timeout = app.settings.remote_timeout();

    app::runtime()?.block_on(async {
        let store = app.open_store().await?;
        let mut index = MetadataIndex::new();

        Reconciler::new(&*store, &app.codec, &root)
            .with_timeout(timeout)
            .run(&mut index)
            .await
            .context("Startup reconciliation failed")?;

        // Started after reconciliation so its own writes are not echoed back
        let (tx, rx) = mpsc::channel(app.settings.queue_capacity);
        let _watcher = start_watcher(&root, tx).context("Failed to watch workspace")?;

        let processor = EventProcessor::new(&*store, &app.codec, &root).with_timeout(timeout);
        tokio::select! {
            _ = processor.run(&mut index, rx) => {
                log::warn!("Watcher stopped delivering events");
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for interrupt")?;
                log::info!("Interrupted, shutting down");
            }
        }

        log::info!(
            "Stopped with {} notebook(s) and {} note(s) indexed",
            index.notebook_count(),
            index.note_count()
        );
        anyhow::Ok(())
    })
}
