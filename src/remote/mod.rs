//! Remote note store gateway
//!
//! The sync engine only talks to the remote side through [`NoteStore`].
//! Two implementations ship with the crate: [`MemoryNoteStore`] for test mode
//! and unit tests, and [`HttpNoteStore`] for a JSON note service.

mod http;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpNoteStore;
pub use memory::{MemoryNoteStore, StoreCall};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Opaque, remote-assigned notebook identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotebookId(pub String);

/// Opaque, remote-assigned note identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub String);

impl std::fmt::Display for NotebookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: NotebookId,
    pub name: String,
    /// The account's default notebook is never synced
    #[serde(default)]
    pub is_default: bool,
}

/// Listing entry for a note, without its content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    pub id: NoteId,
    pub title: String,
    /// `false` for notes sitting in the remote trash
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub notebook_id: NotebookId,
}

/// Operations the sync engine needs from a note service.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Check that the credentials are accepted.
    async fn verify(&self) -> Result<(), StoreError> {
        self.list_notebooks().await.map(|_| ())
    }

    async fn list_notebooks(&self) -> Result<Vec<Notebook>, StoreError>;

    async fn create_notebook(&self, name: &str) -> Result<Notebook, StoreError>;

    /// All notes of a notebook, including inactive ones.
    async fn find_notes(&self, notebook_id: &NotebookId) -> Result<Vec<NoteSummary>, StoreError>;

    async fn get_note_content(&self, note_id: &NoteId) -> Result<String, StoreError>;

    async fn create_note(
        &self,
        title: &str,
        content: &str,
        notebook_id: &NotebookId,
    ) -> Result<Note, StoreError>;

    async fn update_note(
        &self,
        note_id: &NoteId,
        title: &str,
        content: &str,
        notebook_id: &NotebookId,
    ) -> Result<Note, StoreError>;

    /// Permanently delete a note.
    async fn expunge_note(&self, note_id: &NoteId) -> Result<(), StoreError>;
}
