//! Startup reconciliation
//!
//! Walks the workspace and the remote listing once, converges them, and
//! builds a fresh [`MetadataIndex`]. Any error aborts the pass and leaves the
//! caller's index untouched.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec::{self, Codec, CodecError, SourceFormat};
use crate::remote::{NoteStore, NoteSummary, NotebookId};

use super::error::with_timeout;
use super::events::{is_transient, split_file_name};
use super::{MetadataIndex, SyncError, DEFAULT_REMOTE_TIMEOUT};

/// Counts of what a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub notebooks_created_locally: usize,
    pub notebooks_created_remotely: usize,
    /// Remote notes updated from a newer local file
    pub notes_pushed: usize,
    pub notes_created_remotely: usize,
    /// Local files rewritten from a newer remote note
    pub notes_pulled: usize,
    pub notes_written_locally: usize,
    pub local_files_deleted: usize,
    /// Remote notes without a source block (not created by this tool)
    pub foreign_notes: usize,
    /// Pulled notes whose stored format differs from the local file extension
    pub format_mismatches: usize,
    pub unchanged: usize,
}

#[derive(Debug)]
struct LocalNote {
    path: PathBuf,
    format: SourceFormat,
    modified: DateTime<Utc>,
}

pub struct Reconciler<'a, S: NoteStore + ?Sized> {
    store: &'a S,
    codec: &'a Codec,
    root: &'a Path,
    timeout: Duration,
}

impl<'a, S: NoteStore + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, codec: &'a Codec, root: &'a Path) -> Self {
        Self {
            store,
            codec,
            root,
            timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Upper bound for each remote call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Converge the workspace with the remote store and replace `index` with
    /// the result.
    pub async fn run(&self, index: &mut MetadataIndex) -> Result<ReconcileReport, SyncError> {
        log::info!("[reconcile] Starting for {}", self.root.display());
        let started = Instant::now();

        let mut fresh = MetadataIndex::new();
        let mut report = ReconcileReport::default();

        self.reconcile_notebooks(&mut fresh, &mut report).await?;

        let notebooks: Vec<(String, NotebookId)> = fresh
            .notebooks()
            .map(|(name, id)| (name.to_string(), id.clone()))
            .collect();
        for (name, notebook_id) in notebooks {
            self.reconcile_notes(&name, &notebook_id, &mut fresh, &mut report)
                .await?;
        }

        *index = fresh;

        log::info!(
            "[reconcile] Finished in {}ms: {} notebook(s), {} note(s), {:?}",
            started.elapsed().as_millis(),
            index.notebook_count(),
            index.note_count(),
            report
        );
        Ok(report)
    }

    async fn reconcile_notebooks(
        &self,
        index: &mut MetadataIndex,
        report: &mut ReconcileReport,
    ) -> Result<(), SyncError> {
        let mut local = list_local_notebooks(self.root)?;
        let remote = with_timeout(self.timeout, self.store.list_notebooks()).await?;

        for notebook in remote {
            if notebook.is_default {
                if local.remove(&notebook.name) {
                    log::warn!(
                        "[reconcile] '{}' is the default notebook and is not synced",
                        notebook.name
                    );
                }
                continue;
            }
            if !is_representable(&notebook.name) {
                log::warn!(
                    "[reconcile] Notebook name '{}' cannot be used as a directory, skipping",
                    notebook.name
                );
                continue;
            }

            if !local.remove(&notebook.name) {
                let dir = self.root.join(&notebook.name);
                log::info!("[reconcile] Creating local notebook {}", dir.display());
                fs::create_dir(&dir)?;
                report.notebooks_created_locally += 1;
            }
            index.insert_notebook(&notebook.name, notebook.id);
        }

        for name in local {
            log::info!("[reconcile] Creating remote notebook '{}'", name);
            let created = with_timeout(self.timeout, self.store.create_notebook(&name)).await?;
            index.insert_notebook(&name, created.id);
            report.notebooks_created_remotely += 1;
        }

        Ok(())
    }

    async fn reconcile_notes(
        &self,
        notebook: &str,
        notebook_id: &NotebookId,
        index: &mut MetadataIndex,
        report: &mut ReconcileReport,
    ) -> Result<(), SyncError> {
        let dir = self.root.join(notebook);
        let mut local = list_local_notes(&dir)?;
        let remote = with_timeout(self.timeout, self.store.find_notes(notebook_id)).await?;
        log::debug!(
            "[reconcile] {}: {} local file(s), {} remote note(s)",
            notebook,
            local.len(),
            remote.len()
        );

        // A title can be trashed and recreated remotely; the live note wins.
        let active_titles: HashSet<&str> = remote
            .iter()
            .filter(|n| n.active)
            .map(|n| n.title.as_str())
            .collect();

        for note in remote.iter().filter(|n| !n.active) {
            if active_titles.contains(note.title.as_str()) {
                continue;
            }
            if let Some(file) = local.remove(&note.title) {
                log::info!(
                    "[reconcile] '{}/{}' was deleted remotely, removing {}",
                    notebook,
                    note.title,
                    file.path.display()
                );
                fs::remove_file(&file.path)?;
                report.local_files_deleted += 1;
            }
        }

        for note in remote.iter().filter(|n| n.active) {
            if !is_representable(&note.title) {
                log::warn!(
                    "[reconcile] Note title '{}/{}' cannot be used as a file name, skipping",
                    notebook,
                    note.title
                );
                continue;
            }
            if index.contains_note(notebook, &note.title) {
                log::warn!(
                    "[reconcile] Duplicate remote title '{}/{}' ({}), keeping the first",
                    notebook,
                    note.title,
                    note.id
                );
                continue;
            }

            match local.remove(&note.title) {
                Some(file) => {
                    self.resolve(notebook, notebook_id, note, &file, report)
                        .await?
                }
                None => self.pull_new(&dir, notebook, note, report).await?,
            }
            index.insert_note(notebook_id, &note.title, note.id.clone());
        }

        for (title, file) in local {
            log::info!("[reconcile] Creating remote note '{}/{}'", notebook, title);
            let content = self.encode_file(&file)?;
            let created = with_timeout(
                self.timeout,
                self.store.create_note(&title, &content, notebook_id),
            )
            .await?;
            index.insert_note(notebook_id, &title, created.id);
            report.notes_created_remotely += 1;
        }

        Ok(())
    }

    /// Both sides have the note. A strictly newer local file is pushed;
    /// otherwise the remote content is taken.
    async fn resolve(
        &self,
        notebook: &str,
        notebook_id: &NotebookId,
        note: &NoteSummary,
        file: &LocalNote,
        report: &mut ReconcileReport,
    ) -> Result<(), SyncError> {
        if file.modified > note.updated_at {
            log::info!(
                "[reconcile] Local '{}/{}' is newer ({} > {}), pushing",
                notebook,
                note.title,
                file.modified,
                note.updated_at
            );
            let content = self.encode_file(file)?;
            with_timeout(
                self.timeout,
                self.store
                    .update_note(&note.id, &note.title, &content, notebook_id),
            )
            .await?;
            report.notes_pushed += 1;
            return Ok(());
        }

        let document = with_timeout(self.timeout, self.store.get_note_content(&note.id)).await?;
        let Some((source, format)) = decode_remote(&document)? else {
            log::warn!(
                "[reconcile] '{}/{}' has no source block, keeping the local file",
                notebook,
                note.title
            );
            report.foreign_notes += 1;
            return Ok(());
        };
        if format != file.format {
            log::warn!(
                "[reconcile] '{}/{}' is stored as {} but the local file is {}, keeping {}",
                notebook,
                note.title,
                format.tag(),
                file.format.tag(),
                file.path.display()
            );
            report.format_mismatches += 1;
        }

        if fs::read_to_string(&file.path)? != source {
            log::info!(
                "[reconcile] Remote '{}/{}' is newer, pulling into {}",
                notebook,
                note.title,
                file.path.display()
            );
            fs::write(&file.path, &source)?;
            report.notes_pulled += 1;
        } else {
            report.unchanged += 1;
        }
        set_modified(&file.path, note.updated_at)?;
        Ok(())
    }

    /// Remote-only note: write it out as a new local file.
    async fn pull_new(
        &self,
        dir: &Path,
        notebook: &str,
        note: &NoteSummary,
        report: &mut ReconcileReport,
    ) -> Result<(), SyncError> {
        let document = with_timeout(self.timeout, self.store.get_note_content(&note.id)).await?;
        let Some((source, format)) = decode_remote(&document)? else {
            log::warn!(
                "[reconcile] '{}/{}' has no source block, not writing it locally",
                notebook,
                note.title
            );
            report.foreign_notes += 1;
            return Ok(());
        };

        let path = dir.join(format!("{}.{}", note.title, format.extension()));
        log::info!("[reconcile] Writing '{}/{}' to {}", notebook, note.title, path.display());
        write_new_file(&path, &source, note.updated_at)?;
        report.notes_written_locally += 1;
        Ok(())
    }

    fn encode_file(&self, file: &LocalNote) -> Result<String, SyncError> {
        let source = fs::read_to_string(&file.path)?;
        Ok(self.codec.encode(&source, file.format))
    }
}

/// `Ok(None)` for documents that were not produced by the codec.
fn decode_remote(document: &str) -> Result<Option<(String, SourceFormat)>, SyncError> {
    match codec::decode(document) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(CodecError::MissingSourceBlock) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Names that map onto a single path component.
fn is_representable(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !is_transient(name)
}

fn list_local_notebooks(root: &Path) -> Result<BTreeSet<String>, SyncError> {
    let mut notebooks = BTreeSet::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if !is_transient(name) => {
                notebooks.insert(name.to_string());
            }
            Some(_) => {}
            None => log::warn!(
                "[reconcile] Skipping non UTF-8 directory {}",
                entry.path().display()
            ),
        }
    }
    Ok(notebooks)
}

/// Files of a notebook directory keyed by title. On title clashes
/// (`a.md` and `a.txt`) the first name in lexical order wins.
fn list_local_notes(dir: &Path) -> Result<BTreeMap<String, LocalNote>, SyncError> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut notes = BTreeMap::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            log::warn!("[reconcile] Skipping non UTF-8 file {}", path.display());
            continue;
        };
        if is_transient(&name) {
            log::debug!("[reconcile] Ignoring transient file {}", path.display());
            continue;
        }
        let (title, extension) = match split_file_name(&name) {
            Ok(parts) => parts,
            Err(e) => {
                log::warn!("[reconcile] Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if notes.contains_key(title) {
            log::warn!(
                "[reconcile] {} has the same title as another file, skipping",
                path.display()
            );
            continue;
        }

        let modified: DateTime<Utc> = fs::metadata(&path)?.modified()?.into();
        notes.insert(
            title.to_string(),
            LocalNote {
                format: SourceFormat::from_extension(extension),
                path,
                modified,
            },
        );
    }
    Ok(notes)
}

/// Create `path` with `content`; never overwrites an existing file.
fn write_new_file(path: &Path, content: &str, modified: DateTime<Utc>) -> Result<(), SyncError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => SyncError::LocalFileExists(path.to_path_buf()),
            _ => SyncError::Io(e),
        })?;
    file.write_all(content.as_bytes())?;
    file.set_modified(SystemTime::from(modified))?;
    Ok(())
}

/// Align a local file's mtime with the remote note so the next start sees
/// them as equal.
fn set_modified(path: &Path, modified: DateTime<Utc>) -> Result<(), SyncError> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(SystemTime::from(modified))?;
    Ok(())
}
