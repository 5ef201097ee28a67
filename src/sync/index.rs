use std::collections::BTreeMap;

use serde::Serialize;

use crate::remote::{NoteId, NotebookId};

/// What the daemon believes exists remotely.
///
/// `notebooks` maps notebook names to ids, `notes` maps each known notebook id
/// to its notes by title. A note can only be registered under a notebook id
/// that is already a key of `notes`, so removing or forgetting a notebook
/// takes its notes with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataIndex {
    notebooks: BTreeMap<String, NotebookId>,
    notes: BTreeMap<NotebookId, BTreeMap<String, NoteId>>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_notebook(&mut self, name: &str, id: NotebookId) {
        self.notes.entry(id.clone()).or_default();
        if let Some(previous) = self.notebooks.insert(name.to_string(), id.clone()) {
            if previous != id {
                self.notes.remove(&previous);
            }
        }
    }

    pub fn notebook_id(&self, name: &str) -> Option<&NotebookId> {
        self.notebooks.get(name)
    }

    pub fn contains_notebook(&self, name: &str) -> bool {
        self.notebooks.contains_key(name)
    }

    /// Register a note. Returns `false` when the notebook is unknown.
    pub fn insert_note(&mut self, notebook_id: &NotebookId, title: &str, note_id: NoteId) -> bool {
        match self.notes.get_mut(notebook_id) {
            Some(titles) => {
                titles.insert(title.to_string(), note_id);
                true
            }
            None => false,
        }
    }

    pub fn note_id(&self, notebook: &str, title: &str) -> Option<&NoteId> {
        let notebook_id = self.notebooks.get(notebook)?;
        self.notes.get(notebook_id)?.get(title)
    }

    pub fn contains_note(&self, notebook: &str, title: &str) -> bool {
        self.note_id(notebook, title).is_some()
    }

    pub fn remove_note(&mut self, notebook: &str, title: &str) -> Option<NoteId> {
        let notebook_id = self.notebooks.get(notebook)?;
        self.notes.get_mut(notebook_id)?.remove(title)
    }

    /// Known notebooks as `(name, id)`, ordered by name.
    pub fn notebooks(&self) -> impl Iterator<Item = (&str, &NotebookId)> {
        self.notebooks.iter().map(|(name, id)| (name.as_str(), id))
    }

    /// Notes of a notebook as `(title, id)`, ordered by title.
    pub fn notes(&self, notebook: &str) -> impl Iterator<Item = (&str, &NoteId)> {
        self.notebooks
            .get(notebook)
            .and_then(|id| self.notes.get(id))
            .into_iter()
            .flat_map(|titles| titles.iter().map(|(title, id)| (title.as_str(), id)))
    }

    pub fn notebook_count(&self) -> usize {
        self.notebooks.len()
    }

    pub fn note_count(&self) -> usize {
        self.notes.values().map(BTreeMap::len).sum()
    }
}
