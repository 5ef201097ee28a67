use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use inkbridge_lib::codec::{Codec, Theme};
use inkbridge_lib::config::Settings;
use inkbridge_lib::remote::{HttpNoteStore, MemoryNoteStore, NoteStore};

/// Shared state for CLI commands
pub struct App {
    pub settings: Settings,
    pub codec: Codec,
}

impl App {
    pub fn new(settings: Settings) -> Result<Self> {
        let theme = Theme::load(&settings.style, settings.themes_dir.as_deref())
            .with_context(|| format!("Failed to load theme '{}'", settings.style))?;
        log::debug!("Using theme '{}'", theme.name);

        Ok(Self {
            settings,
            codec: Codec::new(theme),
        })
    }

    /// Connect to the configured store and check the login.
    pub async fn open_store(&self) -> Result<Box<dyn NoteStore>> {
        self.settings.validate()?;

        if self.settings.test {
            log::info!("Test mode: using an in-memory store, nothing is sent remotely");
            return Ok(Box::new(MemoryNoteStore::untracked()));
        }

        let token = self
            .settings
            .resolve_token()
            .context("Failed to get auth token")?;
        let store = HttpNoteStore::new(&self.settings.service_url, token, self.settings.remote_timeout())
            .context("Failed to create note service client")?;

        tokio::time::timeout(self.settings.remote_timeout(), store.verify())
            .await
            .context("Login timed out")?
            .context("Login failed")?;

        Ok(Box::new(store))
    }

    /// Canonical workspace root; it must be an existing directory.
    pub fn workspace(&self, path: &Path) -> Result<PathBuf> {
        let root = path
            .canonicalize()
            .with_context(|| format!("Workspace {} not found", path.display()))?;
        if !root.is_dir() {
            bail!("Workspace {} is not a directory", root.display());
        }
        Ok(root)
    }
}

/// Single-threaded runtime: events are handled strictly one at a time.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}
