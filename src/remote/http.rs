//! JSON note service client.
//!
//! Endpoints, relative to the configured service URL, all authenticated with
//! `Authorization: Bearer <token>`:
//!
//! | Call               | Request                              | Response            |
//! |--------------------|--------------------------------------|---------------------|
//! | verify             | `GET /user`                          | any 2xx             |
//! | list_notebooks     | `GET /notebooks`                     | `[Notebook]`        |
//! | create_notebook    | `POST /notebooks {name}`             | `Notebook`          |
//! | find_notes         | `GET /notebooks/{id}/notes`          | `[NoteSummary]`     |
//! | get_note_content   | `GET /notes/{id}/content`            | document text       |
//! | create_note        | `POST /notes {title,content,notebookId}` | `Note`          |
//! | update_note        | `PUT /notes/{id} {title,content,notebookId}` | `Note`      |
//! | expunge_note       | `DELETE /notes/{id}`                 | any 2xx             |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Note, NoteId, NoteStore, NoteSummary, Notebook, NotebookId, StoreError};

pub struct HttpNoteStore {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NoteBody<'a> {
    title: &'a str,
    content: &'a str,
    notebook_id: &'a NotebookId,
}

#[derive(Serialize)]
struct NotebookBody<'a> {
    name: &'a str,
}

impl HttpNoteStore {
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Result<Self, StoreError> {
        // Normalize URL - ensure no trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(StoreError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Build full URL for a path; path segments are percent-encoded by the caller.
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn note_url(&self, note_id: &NoteId, suffix: &str) -> String {
        self.url(&format!("notes/{}{}", urlencoding::encode(&note_id.0), suffix))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        let response = request.bearer_auth(&self.token).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::AuthFailed),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(what.to_string())),
            StatusCode::CONFLICT => Err(StoreError::Conflict(
                response.text().await.unwrap_or_default(),
            )),
            status if !status.is_success() => Err(StoreError::Server {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
            _ => Ok(response),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, StoreError> {
        Ok(self.send(request, what).await?.json().await?)
    }
}

#[async_trait]
impl NoteStore for HttpNoteStore {
    async fn verify(&self) -> Result<(), StoreError> {
        self.send(self.client.get(self.url("user")), "user").await?;
        log::info!("Authenticated against {}", self.base_url);
        Ok(())
    }

    async fn list_notebooks(&self) -> Result<Vec<Notebook>, StoreError> {
        self.send_json(self.client.get(self.url("notebooks")), "notebooks")
            .await
    }

    async fn create_notebook(&self, name: &str) -> Result<Notebook, StoreError> {
        let request = self
            .client
            .post(self.url("notebooks"))
            .json(&NotebookBody { name });
        self.send_json(request, name).await
    }

    async fn find_notes(&self, notebook_id: &NotebookId) -> Result<Vec<NoteSummary>, StoreError> {
        let url = self.url(&format!(
            "notebooks/{}/notes",
            urlencoding::encode(&notebook_id.0)
        ));
        self.send_json(self.client.get(url), &notebook_id.0).await
    }

    async fn get_note_content(&self, note_id: &NoteId) -> Result<String, StoreError> {
        let response = self
            .send(self.client.get(self.note_url(note_id, "/content")), &note_id.0)
            .await?;
        Ok(response.text().await?)
    }

    async fn create_note(
        &self,
        title: &str,
        content: &str,
        notebook_id: &NotebookId,
    ) -> Result<Note, StoreError> {
        let request = self.client.post(self.url("notes")).json(&NoteBody {
            title,
            content,
            notebook_id,
        });
        self.send_json(request, title).await
    }

    async fn update_note(
        &self,
        note_id: &NoteId,
        title: &str,
        content: &str,
        notebook_id: &NotebookId,
    ) -> Result<Note, StoreError> {
        let request = self.client.put(self.note_url(note_id, "")).json(&NoteBody {
            title,
            content,
            notebook_id,
        });
        self.send_json(request, &note_id.0).await
    }

    async fn expunge_note(&self, note_id: &NoteId) -> Result<(), StoreError> {
        self.send(self.client.delete(self.note_url(note_id, "")), &note_id.0)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> HttpNoteStore {
        HttpNoteStore::new(url, "token".to_string(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let result = HttpNoteStore::new("ftp://notes", String::new(), Duration::from_secs(5));
        assert!(matches!(result, Err(StoreError::InvalidUrl(_))));
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let store = store("https://notes.example.com/api/");
        assert_eq!(store.url("notebooks"), "https://notes.example.com/api/notebooks");
        assert_eq!(store.url("/user"), "https://notes.example.com/api/user");
    }

    #[test]
    fn test_note_ids_are_percent_encoded() {
        let store = store("https://notes.example.com");
        let id = NoteId("a/b c".to_string());
        assert_eq!(
            store.note_url(&id, "/content"),
            "https://notes.example.com/notes/a%2Fb%20c/content"
        );
    }

    #[test]
    fn test_note_body_wire_format() {
        let notebook_id = NotebookId("nb-1".to_string());
        let body = NoteBody {
            title: "todo",
            content: "<en-note/>",
            notebook_id: &notebook_id,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "title": "todo", "content": "<en-note/>", "notebookId": "nb-1" })
        );
    }

    #[test]
    fn test_summary_wire_format() {
        let summary: NoteSummary = serde_json::from_str(
            r#"{"id":"n1","title":"todo","active":false,"updatedAt":"2024-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        assert_eq!(summary.id, NoteId("n1".to_string()));
        assert!(!summary.active);
        assert_eq!(summary.updated_at.to_rfc3339(), "2024-01-02T03:04:05+00:00");
    }
}
