//! Live event handling
//!
//! Events are consumed one at a time from a bounded channel; each one is
//! fully handled, including its remote call, before the next is received.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::codec::{Codec, SourceFormat};
use crate::remote::{NoteId, NoteStore, NotebookId, StoreError};

use super::error::with_timeout;
use super::events::{is_transient, split_file_name, FsEvent, FsEventKind};
use super::{MetadataIndex, SyncError, DEFAULT_REMOTE_TIMEOUT};

/// How long a deleted file may take to reappear before the delete is
/// propagated. Atomic-save editors rename the old file away and write a new
/// one under the same name.
pub const DEFAULT_DELETE_GRACE: Duration = Duration::from_millis(250);

/// The single remote operation an event maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    CreateNotebook {
        name: String,
    },
    CreateNote {
        notebook: String,
        notebook_id: NotebookId,
        title: String,
        path: PathBuf,
        format: SourceFormat,
    },
    UpdateNote {
        notebook: String,
        notebook_id: NotebookId,
        note_id: NoteId,
        title: String,
        path: PathBuf,
        format: SourceFormat,
    },
    ExpungeNote {
        notebook: String,
        note_id: NoteId,
        title: String,
        path: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EventOutcome {
    Ignored,
    NotebookCreated { name: String },
    NoteCreated { notebook: String, title: String },
    NoteUpdated { notebook: String, title: String },
    NoteExpunged { notebook: String, title: String },
}

pub struct EventProcessor<'a, S: NoteStore + ?Sized> {
    store: &'a S,
    codec: &'a Codec,
    root: &'a Path,
    timeout: Duration,
    delete_grace: Duration,
}

impl<'a, S: NoteStore + ?Sized> EventProcessor<'a, S> {
    pub fn new(store: &'a S, codec: &'a Codec, root: &'a Path) -> Self {
        Self {
            store,
            codec,
            root,
            timeout: DEFAULT_REMOTE_TIMEOUT,
            delete_grace: DEFAULT_DELETE_GRACE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delete_grace(mut self, grace: Duration) -> Self {
        self.delete_grace = grace;
        self
    }

    /// Consume events until the sender side is dropped. Failures are logged
    /// and the loop moves on to the next event.
    pub async fn run(&self, index: &mut MetadataIndex, mut events: mpsc::Receiver<FsEvent>) {
        log::info!("[events] Processing changes under {}", self.root.display());

        while let Some(event) = events.recv().await {
            match self.handle(index, &event).await {
                Ok(EventOutcome::Ignored) => {}
                Ok(outcome) => log::info!("[events] {:?}", outcome),
                Err(e) => log::error!(
                    "[events] Failed to handle {:?} for {}: {}",
                    event.kind,
                    event.path().display(),
                    e
                ),
            }
        }

        log::info!("[events] Event channel closed");
    }

    pub async fn handle(
        &self,
        index: &mut MetadataIndex,
        event: &FsEvent,
    ) -> Result<EventOutcome, SyncError> {
        match self.plan(index, event)? {
            Some(op) => self.apply(index, op).await,
            None => Ok(EventOutcome::Ignored),
        }
    }

    /// Decide what, if anything, an event requires remotely. Does not touch
    /// the store or the index.
    pub fn plan(&self, index: &MetadataIndex, event: &FsEvent) -> Result<Option<RemoteOp>, SyncError> {
        if is_transient(&event.name) {
            log::debug!("[events] Ignoring transient {}", event.path().display());
            return Ok(None);
        }

        if event.is_dir {
            return Ok(self.plan_directory(index, event));
        }

        let Some(notebook) = self.notebook_of(&event.parent) else {
            log::debug!(
                "[events] Ignoring {} outside a notebook directory",
                event.path().display()
            );
            return Ok(None);
        };
        let (title, extension) = split_file_name(&event.name)?;

        let op = match (event.kind, index.note_id(notebook, title)) {
            (FsEventKind::Created, Some(_)) => {
                log::info!(
                    "[events] '{}/{}' already exists remotely, keeping the remote copy",
                    notebook,
                    title
                );
                None
            }
            (FsEventKind::Created | FsEventKind::ClosedWrite, None) => {
                Some(RemoteOp::CreateNote {
                    notebook: notebook.to_string(),
                    notebook_id: self.known_notebook(index, notebook)?,
                    title: title.to_string(),
                    path: event.path(),
                    format: SourceFormat::from_extension(extension),
                })
            }
            (FsEventKind::ClosedWrite, Some(note_id)) => Some(RemoteOp::UpdateNote {
                notebook: notebook.to_string(),
                notebook_id: self.known_notebook(index, notebook)?,
                note_id: note_id.clone(),
                title: title.to_string(),
                path: event.path(),
                format: SourceFormat::from_extension(extension),
            }),
            (FsEventKind::Deleted, Some(_)) if event.path().exists() => {
                log::info!(
                    "[events] '{}/{}' was replaced on disk, keeping the remote note",
                    notebook,
                    title
                );
                None
            }
            (FsEventKind::Deleted, Some(note_id)) => Some(RemoteOp::ExpungeNote {
                notebook: notebook.to_string(),
                note_id: note_id.clone(),
                title: title.to_string(),
                path: event.path(),
            }),
            (FsEventKind::Deleted, None) => {
                log::warn!(
                    "[events] '{}/{}' was deleted but is not known remotely",
                    notebook,
                    title
                );
                None
            }
        };
        Ok(op)
    }

    /// Run a planned operation, then record its result in the index.
    pub async fn apply(
        &self,
        index: &mut MetadataIndex,
        op: RemoteOp,
    ) -> Result<EventOutcome, SyncError> {
        match op {
            RemoteOp::CreateNotebook { name } => {
                let notebook =
                    with_timeout(self.timeout, self.store.create_notebook(&name)).await?;
                index.insert_notebook(&name, notebook.id);
                Ok(EventOutcome::NotebookCreated { name })
            }
            RemoteOp::CreateNote {
                notebook,
                notebook_id,
                title,
                path,
                format,
            } => {
                let content = self.encode_file(&path, format)?;
                let note = with_timeout(
                    self.timeout,
                    self.store.create_note(&title, &content, &notebook_id),
                )
                .await?;
                index.insert_note(&notebook_id, &title, note.id);
                Ok(EventOutcome::NoteCreated { notebook, title })
            }
            RemoteOp::UpdateNote {
                notebook,
                notebook_id,
                note_id,
                title,
                path,
                format,
            } => {
                let content = self.encode_file(&path, format)?;
                with_timeout(
                    self.timeout,
                    self.store
                        .update_note(&note_id, &title, &content, &notebook_id),
                )
                .await?;
                Ok(EventOutcome::NoteUpdated { notebook, title })
            }
            RemoteOp::ExpungeNote {
                notebook,
                note_id,
                title,
                path,
            } => {
                if !self.delete_grace.is_zero() {
                    tokio::time::sleep(self.delete_grace).await;
                }
                if path.exists() {
                    log::info!(
                        "[events] '{}/{}' reappeared, keeping the remote note",
                        notebook,
                        title
                    );
                    return Ok(EventOutcome::Ignored);
                }

                match with_timeout(self.timeout, self.store.expunge_note(&note_id)).await {
                    Ok(()) => {}
                    Err(SyncError::Store(StoreError::NotFound(_))) => {
                        log::warn!(
                            "[events] '{}/{}' was already gone remotely",
                            notebook,
                            title
                        );
                    }
                    Err(e) => return Err(e),
                }
                index.remove_note(&notebook, &title);
                Ok(EventOutcome::NoteExpunged { notebook, title })
            }
        }
    }

    fn plan_directory(&self, index: &MetadataIndex, event: &FsEvent) -> Option<RemoteOp> {
        if event.parent != self.root {
            log::debug!("[events] Ignoring nested directory {}", event.path().display());
            return None;
        }

        match event.kind {
            FsEventKind::Created if index.contains_notebook(&event.name) => None,
            FsEventKind::Created => Some(RemoteOp::CreateNotebook {
                name: event.name.clone(),
            }),
            FsEventKind::Deleted => {
                log::warn!(
                    "[events] Notebook directory '{}' was removed; notebook deletion is not synced",
                    event.name
                );
                None
            }
            FsEventKind::ClosedWrite => None,
        }
    }

    /// Notebook name for a file's parent directory, if it sits directly
    /// under the root.
    fn notebook_of<'p>(&self, parent: &'p Path) -> Option<&'p str> {
        if parent.parent() != Some(self.root) {
            return None;
        }
        let name = parent.file_name()?.to_str()?;
        (!is_transient(name)).then_some(name)
    }

    fn known_notebook(&self, index: &MetadataIndex, notebook: &str) -> Result<NotebookId, SyncError> {
        index
            .notebook_id(notebook)
            .cloned()
            .ok_or_else(|| SyncError::UnknownNotebook(notebook.to_string()))
    }

    fn encode_file(&self, path: &Path, format: SourceFormat) -> Result<String, SyncError> {
        let source = fs::read_to_string(path)?;
        Ok(self.codec.encode(&source, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, Theme};
    use crate::remote::{MemoryNoteStore, StoreCall};
    use chrono::Utc;
    use tempfile::TempDir;

    struct Fixture {
        temp_dir: TempDir,
        codec: Codec,
        store: MemoryNoteStore,
        index: MetadataIndex,
        personal: NotebookId,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("Personal")).unwrap();

        let store = MemoryNoteStore::new();
        let personal = store.add_notebook("Personal", false);
        let mut index = MetadataIndex::new();
        index.insert_notebook("Personal", personal.clone());

        Fixture {
            temp_dir,
            codec: Codec::new(Theme::load("minimal", None).unwrap()),
            store,
            index,
            personal,
        }
    }

    impl Fixture {
        fn root(&self) -> &Path {
            self.temp_dir.path()
        }

        fn event(&self, kind: FsEventKind, relative: &str) -> FsEvent {
            let path = self.root().join(relative);
            FsEvent::from_path(kind, path.is_dir(), &path).unwrap()
        }

        fn write(&self, relative: &str, content: &str) {
            fs::write(self.root().join(relative), content).unwrap();
        }

        async fn handle(&mut self, event: FsEvent) -> Result<EventOutcome, SyncError> {
            let processor = EventProcessor::new(&self.store, &self.codec, self.temp_dir.path());
            processor.handle(&mut self.index, &event).await
        }
    }

    #[tokio::test]
    async fn test_closed_write_on_known_note_updates_once() {
        let mut fx = fixture();
        let note_id = fx.store.add_note(&fx.personal, "ideas", "<en-note/>", Utc::now());
        fx.index.insert_note(&fx.personal, "ideas", note_id.clone());
        fx.write("Personal/ideas.md", "# hi");

        let event = fx.event(FsEventKind::ClosedWrite, "Personal/ideas.md");
        let outcome = fx.handle(event).await.unwrap();

        assert_eq!(
            outcome,
            EventOutcome::NoteUpdated {
                notebook: "Personal".to_string(),
                title: "ideas".to_string()
            }
        );
        let mutations = fx.store.mutations();
        assert_eq!(mutations.len(), 1);
        assert!(matches!(&mutations[0], StoreCall::UpdateNote { note_id: id, .. } if id == &note_id));
        let document = fx.store.note_content("Personal", "ideas").unwrap();
        assert_eq!(
            codec::decode(&document).unwrap(),
            ("# hi".to_string(), SourceFormat::Markdown)
        );
    }

    #[tokio::test]
    async fn test_new_file_is_created_and_indexed() {
        let mut fx = fixture();
        fx.write("Personal/v1.2 plan.txt", "ship it");

        let event = fx.event(FsEventKind::Created, "Personal/v1.2 plan.txt");
        fx.handle(event).await.unwrap();

        assert!(fx.index.contains_note("Personal", "v1.2 plan"));
        let document = fx.store.note_content("Personal", "v1.2 plan").unwrap();
        assert_eq!(
            codec::decode(&document).unwrap(),
            ("ship it".to_string(), SourceFormat::Plain)
        );
    }

    #[tokio::test]
    async fn test_create_collision_is_a_no_op() {
        let mut fx = fixture();
        let note_id = fx.store.add_note(&fx.personal, "ideas", "<en-note/>", Utc::now());
        fx.index.insert_note(&fx.personal, "ideas", note_id);
        fx.write("Personal/ideas.md", "local");

        let event = fx.event(FsEventKind::Created, "Personal/ideas.md");
        let outcome = fx.handle(event).await.unwrap();

        assert_eq!(outcome, EventOutcome::Ignored);
        assert!(fx.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_expunges_and_forgets() {
        let mut fx = fixture();
        let note_id = fx.store.add_note(&fx.personal, "ideas", "<en-note/>", Utc::now());
        fx.index.insert_note(&fx.personal, "ideas", note_id.clone());

        let event = fx.event(FsEventKind::Deleted, "Personal/ideas.md");
        fx.handle(event).await.unwrap();

        assert_eq!(fx.store.mutations(), vec![StoreCall::ExpungeNote { note_id }]);
        assert!(!fx.index.contains_note("Personal", "ideas"));
    }

    #[tokio::test]
    async fn test_delete_of_unknown_note_is_ignored() {
        let mut fx = fixture();
        let event = fx.event(FsEventKind::Deleted, "Personal/ghost.md");
        assert_eq!(fx.handle(event).await.unwrap(), EventOutcome::Ignored);
        assert!(fx.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_new_directory_creates_notebook() {
        let mut fx = fixture();
        fs::create_dir(fx.root().join("Work")).unwrap();

        let event = fx.event(FsEventKind::Created, "Work");
        fx.handle(event).await.unwrap();

        assert!(fx.index.contains_notebook("Work"));
        assert_eq!(
            fx.store.mutations(),
            vec![StoreCall::CreateNotebook { name: "Work".to_string() }]
        );
    }

    #[tokio::test]
    async fn test_directory_delete_is_not_propagated() {
        let mut fx = fixture();
        let event = FsEvent {
            kind: FsEventKind::Deleted,
            is_dir: true,
            parent: fx.root().to_path_buf(),
            name: "Personal".to_string(),
        };
        assert_eq!(fx.handle(event).await.unwrap(), EventOutcome::Ignored);
        assert!(fx.index.contains_notebook("Personal"));
        assert!(fx.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transient_and_misplaced_files_are_ignored() {
        let mut fx = fixture();
        fs::create_dir_all(fx.root().join("Personal/deep")).unwrap();
        for relative in [
            "Personal/.ideas.md.swp",
            "Personal/ideas.md~",
            "Personal/4913",
            "loose.md",
            "Personal/deep/nested.md",
        ] {
            fx.write(relative, "x");
            for kind in [FsEventKind::Created, FsEventKind::ClosedWrite, FsEventKind::Deleted] {
                let event = fx.event(kind, relative);
                assert_eq!(fx.handle(event).await.unwrap(), EventOutcome::Ignored);
            }
        }

        fs::create_dir(fx.root().join(".git")).unwrap();
        let event = fx.event(FsEventKind::Created, ".git");
        assert!(event.is_dir);
        assert_eq!(fx.handle(event).await.unwrap(), EventOutcome::Ignored);

        assert!(fx.store.calls().is_empty());
        assert!(!fx.index.contains_notebook(".git"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_atomic_save_updates_note_in_place() {
        use crate::watcher::translate;
        use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
        use notify::{Event, EventKind};

        let mut fx = fixture();
        let note_id = fx.store.add_note(&fx.personal, "ideas", "<en-note/>", Utc::now());
        fx.index.insert_note(&fx.personal, "ideas", note_id.clone());

        // Rename the old copy away, then write a fresh file under the old name.
        let path = fx.root().join("Personal/ideas.md");
        let backup = fx.root().join("Personal/ideas.md~");
        fs::write(&path, "old").unwrap();
        fs::rename(&path, &backup).unwrap();
        fs::write(&path, "new").unwrap();

        let raw = [
            Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From))).add_path(path.clone()),
            Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To))).add_path(backup.clone()),
            Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone()),
            Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write))).add_path(path.clone()),
        ];
        for event in raw.iter().flat_map(translate) {
            fx.handle(event).await.unwrap();
        }

        let mutations = fx.store.mutations();
        assert_eq!(mutations.len(), 1);
        assert!(matches!(&mutations[0], StoreCall::UpdateNote { note_id: id, .. } if id == &note_id));
        assert_eq!(fx.index.note_id("Personal", "ideas"), Some(&note_id));
        let document = fx.store.note_content("Personal", "ideas").unwrap();
        assert_eq!(codec::decode(&document).unwrap().0, "new");
    }

    #[tokio::test]
    async fn test_file_reappearing_within_grace_is_not_expunged() {
        let mut fx = fixture();
        let note_id = fx.store.add_note(&fx.personal, "ideas", "<en-note/>", Utc::now());
        fx.index.insert_note(&fx.personal, "ideas", note_id.clone());

        let path = fx.root().join("Personal/ideas.md");
        let event = fx.event(FsEventKind::Deleted, "Personal/ideas.md");
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            fs::write(&path, "back").unwrap();
        });

        let processor = EventProcessor::new(&fx.store, &fx.codec, fx.temp_dir.path())
            .with_delete_grace(Duration::from_millis(500));
        let outcome = processor.handle(&mut fx.index, &event).await.unwrap();
        writer.await.unwrap();

        assert_eq!(outcome, EventOutcome::Ignored);
        assert!(fx.store.mutations().is_empty());
        assert_eq!(fx.index.note_id("Personal", "ideas"), Some(&note_id));
    }

    #[tokio::test]
    async fn test_file_without_extension_is_rejected() {
        let mut fx = fixture();
        fx.write("Personal/README", "x");
        let event = fx.event(FsEventKind::ClosedWrite, "Personal/README");
        assert!(matches!(
            fx.handle(event).await,
            Err(SyncError::InvalidFileName(_))
        ));
    }

    #[tokio::test]
    async fn test_file_in_unknown_notebook_is_rejected() {
        let mut fx = fixture();
        fs::create_dir(fx.root().join("Work")).unwrap();
        fx.write("Work/todo.md", "x");

        let event = fx.event(FsEventKind::ClosedWrite, "Work/todo.md");
        assert!(matches!(
            fx.handle(event).await,
            Err(SyncError::UnknownNotebook(name)) if name == "Work"
        ));
        assert!(fx.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_remote_call_leaves_index_unchanged() {
        let mut fx = fixture();
        fx.write("Personal/ideas.md", "# hi");
        fx.store.set_offline(true);
        let before = fx.index.clone();

        let event = fx.event(FsEventKind::ClosedWrite, "Personal/ideas.md");
        assert!(fx.handle(event).await.is_err());
        assert_eq!(fx.index, before);
    }

    #[tokio::test]
    async fn test_run_continues_after_errors() {
        let mut fx = fixture();
        fx.write("Personal/README", "x");
        fx.write("Personal/ideas.md", "# hi");

        let (tx, rx) = mpsc::channel(4);
        tx.send(fx.event(FsEventKind::ClosedWrite, "Personal/README"))
            .await
            .unwrap();
        tx.send(fx.event(FsEventKind::ClosedWrite, "Personal/ideas.md"))
            .await
            .unwrap();
        drop(tx);

        let processor = EventProcessor::new(&fx.store, &fx.codec, fx.temp_dir.path());
        processor.run(&mut fx.index, rx).await;

        assert!(fx.index.contains_note("Personal", "ideas"));
    }
}
