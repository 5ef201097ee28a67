use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Note, NoteId, NoteStore, NoteSummary, Notebook, NotebookId, StoreError};

/// A call received by [`MemoryNoteStore`], recorded in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    ListNotebooks,
    CreateNotebook { name: String },
    FindNotes { notebook_id: NotebookId },
    GetNoteContent { note_id: NoteId },
    CreateNote { title: String, content: String, notebook_id: NotebookId },
    UpdateNote { note_id: NoteId, title: String, content: String, notebook_id: NotebookId },
    ExpungeNote { note_id: NoteId },
}

impl StoreCall {
    /// True for calls that change remote state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateNotebook { .. }
                | Self::CreateNote { .. }
                | Self::UpdateNote { .. }
                | Self::ExpungeNote { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct StoredNote {
    id: NoteId,
    notebook_id: NotebookId,
    title: String,
    content: String,
    active: bool,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    notebooks: Vec<Notebook>,
    notes: Vec<StoredNote>,
    calls: Vec<StoreCall>,
    untracked: bool,
    offline: bool,
}

/// In-process note store.
///
/// Backs test mode (nothing leaves the machine) and the engine's unit tests,
/// which inspect [`MemoryNoteStore::calls`] to assert exact call sequences.
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    state: Mutex<MemoryState>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that keeps no call log; [`MemoryNoteStore::calls`] stays empty.
    /// Used for long-running test mode sessions.
    pub fn untracked() -> Self {
        let store = Self::default();
        store.state.lock().unwrap().untracked = true;
        store
    }

    /// Seed a notebook without recording a call.
    pub fn add_notebook(&self, name: &str, is_default: bool) -> NotebookId {
        let id = NotebookId(new_id());
        self.state.lock().unwrap().notebooks.push(Notebook {
            id: id.clone(),
            name: name.to_string(),
            is_default,
        });
        id
    }

    /// Seed a note without recording a call.
    pub fn add_note(
        &self,
        notebook_id: &NotebookId,
        title: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> NoteId {
        let id = NoteId(new_id());
        self.state.lock().unwrap().notes.push(StoredNote {
            id: id.clone(),
            notebook_id: notebook_id.clone(),
            title: title.to_string(),
            content: content.to_string(),
            active: true,
            updated_at,
        });
        id
    }

    /// Move a note to the trash.
    pub fn deactivate_note(&self, note_id: &NoteId) {
        let mut state = self.state.lock().unwrap();
        if let Some(note) = state.notes.iter_mut().find(|n| &n.id == note_id) {
            note.active = false;
        }
    }

    /// While offline every call fails with a server error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn notebooks(&self) -> Vec<Notebook> {
        self.state.lock().unwrap().notebooks.clone()
    }

    /// Content of the active note titled `title` in the notebook named `notebook`.
    pub fn note_content(&self, notebook: &str, title: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let notebook_id = state.notebooks.iter().find(|nb| nb.name == notebook)?.id.clone();
        state
            .notes
            .iter()
            .find(|n| n.notebook_id == notebook_id && n.title == title && n.active)
            .map(|n| n.content.clone())
    }

    fn record(&self, call: StoreCall) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.untracked {
            state.calls.push(call);
        }
        if state.offline {
            return Err(StoreError::Server {
                status: 503,
                message: "store is offline".to_string(),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn list_notebooks(&self) -> Result<Vec<Notebook>, StoreError> {
        let state = self.record(StoreCall::ListNotebooks)?;
        Ok(state.notebooks.clone())
    }

    async fn create_notebook(&self, name: &str) -> Result<Notebook, StoreError> {
        let mut state = self.record(StoreCall::CreateNotebook {
            name: name.to_string(),
        })?;
        if state.notebooks.iter().any(|nb| nb.name == name) {
            return Err(StoreError::Conflict(format!("notebook '{}' already exists", name)));
        }
        let notebook = Notebook {
            id: NotebookId(new_id()),
            name: name.to_string(),
            is_default: false,
        };
        state.notebooks.push(notebook.clone());
        Ok(notebook)
    }

    async fn find_notes(&self, notebook_id: &NotebookId) -> Result<Vec<NoteSummary>, StoreError> {
        let state = self.record(StoreCall::FindNotes {
            notebook_id: notebook_id.clone(),
        })?;
        Ok(state
            .notes
            .iter()
            .filter(|n| &n.notebook_id == notebook_id)
            .map(|n| NoteSummary {
                id: n.id.clone(),
                title: n.title.clone(),
                active: n.active,
                updated_at: n.updated_at,
            })
            .collect())
    }

    async fn get_note_content(&self, note_id: &NoteId) -> Result<String, StoreError> {
        let state = self.record(StoreCall::GetNoteContent {
            note_id: note_id.clone(),
        })?;
        state
            .notes
            .iter()
            .find(|n| &n.id == note_id)
            .map(|n| n.content.clone())
            .ok_or_else(|| StoreError::NotFound(note_id.to_string()))
    }

    async fn create_note(
        &self,
        title: &str,
        content: &str,
        notebook_id: &NotebookId,
    ) -> Result<Note, StoreError> {
        let mut state = self.record(StoreCall::CreateNote {
            title: title.to_string(),
            content: content.to_string(),
            notebook_id: notebook_id.clone(),
        })?;
        if !state.notebooks.iter().any(|nb| &nb.id == notebook_id) {
            return Err(StoreError::NotFound(notebook_id.to_string()));
        }
        let id = NoteId(new_id());
        state.notes.push(StoredNote {
            id: id.clone(),
            notebook_id: notebook_id.clone(),
            title: title.to_string(),
            content: content.to_string(),
            active: true,
            updated_at: Utc::now(),
        });
        Ok(Note {
            id,
            title: title.to_string(),
            notebook_id: notebook_id.clone(),
        })
    }

    async fn update_note(
        &self,
        note_id: &NoteId,
        title: &str,
        content: &str,
        notebook_id: &NotebookId,
    ) -> Result<Note, StoreError> {
        let mut state = self.record(StoreCall::UpdateNote {
            note_id: note_id.clone(),
            title: title.to_string(),
            content: content.to_string(),
            notebook_id: notebook_id.clone(),
        })?;
        let note = state
            .notes
            .iter_mut()
            .find(|n| &n.id == note_id)
            .ok_or_else(|| StoreError::NotFound(note_id.to_string()))?;
        note.title = title.to_string();
        note.content = content.to_string();
        note.notebook_id = notebook_id.clone();
        note.updated_at = Utc::now();
        Ok(Note {
            id: note_id.clone(),
            title: title.to_string(),
            notebook_id: notebook_id.clone(),
        })
    }

    async fn expunge_note(&self, note_id: &NoteId) -> Result<(), StoreError> {
        let mut state = self.record(StoreCall::ExpungeNote {
            note_id: note_id.clone(),
        })?;
        let before = state.notes.len();
        state.notes.retain(|n| &n.id != note_id);
        if state.notes.len() == before {
            return Err(StoreError::NotFound(note_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_find_notes() {
        let store = MemoryNoteStore::new();
        let nb = store.create_notebook("Work").await.unwrap();
        let note = store.create_note("todo", "<en-note/>", &nb.id).await.unwrap();

        let notes = store.find_notes(&nb.id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, note.id);
        assert!(notes[0].active);
        assert_eq!(store.get_note_content(&note.id).await.unwrap(), "<en-note/>");
    }

    #[tokio::test]
    async fn test_untracked_store_keeps_no_call_log() {
        let store = MemoryNoteStore::untracked();
        let nb = store.create_notebook("Work").await.unwrap();
        for i in 0..10 {
            let title = format!("todo {i}");
            let note = store.create_note(&title, "<en-note/>", &nb.id).await.unwrap();
            store.update_note(&note.id, &title, "<en-note>done</en-note>", &nb.id).await.unwrap();
        }

        assert!(store.calls().is_empty());
        assert_eq!(store.find_notes(&nb.id).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_duplicate_notebook_name_conflicts() {
        let store = MemoryNoteStore::new();
        store.create_notebook("Work").await.unwrap();
        let err = store.create_notebook("Work").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_offline_store_records_and_fails() {
        let store = MemoryNoteStore::new();
        store.set_offline(true);
        assert!(store.list_notebooks().await.is_err());
        assert_eq!(store.calls(), vec![StoreCall::ListNotebooks]);
    }

    #[tokio::test]
    async fn test_expunge_unknown_note() {
        let store = MemoryNoteStore::new();
        let err = store.expunge_note(&NoteId("nope".to_string())).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deactivated_notes_are_listed_inactive() {
        let store = MemoryNoteStore::new();
        let nb = store.add_notebook("Work", false);
        let id = store.add_note(&nb, "old", "x", Utc::now());
        store.deactivate_note(&id);

        let notes = store.find_notes(&nb).await.unwrap();
        assert!(!notes[0].active);
        assert_eq!(store.note_content("Work", "old"), None);
    }
}
