//! Typed GraphQL client for the managed Notes API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::telemetry::{OpOutcome, OpsSink};

const LIST_NOTES_QUERY: &str =
    "query ListNotes { listNotes { items { id name description image } } }";

const CREATE_NOTE_MUTATION: &str =
    "mutation CreateNote($input: CreateNoteInput!) { createNote(input: $input) { id } }";

const DELETE_NOTE_MUTATION: &str =
    "mutation DeleteNote($input: DeleteNoteInput!) { deleteNote(input: $input) { id } }";

/// A note as the Notes API returns it. `image` is the bare attachment
/// filename; URL resolution happens later in the board.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Creation input. The API assigns the id; callers observe it by re-fetching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteDraft {
    pub name: String,
    pub description: String,
    pub image: Option<String>,
}

#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn list_notes(&self) -> Result<Vec<NoteRecord>, String>;
    async fn create_note(&self, draft: &NoteDraft) -> Result<(), String>;
    async fn delete_note(&self, id: &str) -> Result<(), String>;
}

pub struct GraphqlNotesClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
    ops: Arc<dyn OpsSink>,
}

#[derive(Debug, Deserialize)]
struct ListNotesData {
    #[serde(rename = "listNotes")]
    list_notes: ListNotesConnection,
}

#[derive(Debug, Deserialize)]
struct ListNotesConnection {
    #[serde(default)]
    items: Vec<NoteRecord>,
}

impl GraphqlNotesClient {
    pub fn new(endpoint: &str, api_key: Option<String>, ops: Arc<dyn OpsSink>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            client: reqwest::Client::new(),
            ops,
        }
    }

    /// Execute a GraphQL document and return the `data` payload.
    async fn execute(
        &self,
        op: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let result = async {
            let resp = request
                .send()
                .await
                .map_err(|e| format!("Notes API request failed: {}", e))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(format!("Notes API HTTP {}: {}", status, body));
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| format!("Parse Notes API response: {}", e))?;
            decode_response(body)
        }
        .await;

        match &result {
            Ok(_) => self.ops.event(op, OpOutcome::Ok, ""),
            Err(e) => self.ops.event(op, OpOutcome::Failed, &format!("error={}", e)),
        }
        result
    }
}

/// Pull `data` out of a GraphQL response body, turning any `errors` entries
/// into a single failure message.
fn decode_response(body: serde_json::Value) -> Result<serde_json::Value, String> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error")
                        .to_string()
                })
                .collect();
            return Err(format!("Notes API error: {}", messages.join("; ")));
        }
    }

    body.get("data")
        .cloned()
        .ok_or_else(|| "Notes API response has no data field".to_string())
}

#[async_trait]
impl NoteRepository for GraphqlNotesClient {
    async fn list_notes(&self) -> Result<Vec<NoteRecord>, String> {
        let data = self
            .execute("list_notes", LIST_NOTES_QUERY, json!({}))
            .await?;
        let parsed: ListNotesData = serde_json::from_value(data)
            .map_err(|e| format!("Parse listNotes payload: {}", e))?;
        Ok(parsed.list_notes.items)
    }

    async fn create_note(&self, draft: &NoteDraft) -> Result<(), String> {
        self.execute(
            "create_note",
            CREATE_NOTE_MUTATION,
            json!({ "input": draft }),
        )
        .await?;
        Ok(())
    }

    async fn delete_note(&self, id: &str) -> Result<(), String> {
        self.execute(
            "delete_note",
            DELETE_NOTE_MUTATION,
            json!({ "input": { "id": id } }),
        )
        .await?;
        Ok(())
    }
}
