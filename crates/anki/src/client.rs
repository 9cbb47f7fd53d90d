use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use danki_core::{DankiError, Result};

use crate::note::AnkiNote;

pub const DEFAULT_URL: &str = "http://localhost:8765";
pub const ANKI_CONNECT_VERSION: u32 = 6;

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Blocking client for the AnkiConnect add-on.
pub struct AnkiClient {
    http: Client,
    url: String,
}

impl AnkiClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| DankiError::Anki(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn invoke<T: DeserializeOwned>(&self, action: &str, params: Value) -> Result<T> {
        let body = request_body(action, params);
        let reply: Value = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json())
            .map_err(|err| {
                DankiError::Anki(format!(
                    "{action} failed (is Anki running with AnkiConnect enabled?): {err}"
                ))
            })?;
        decode_reply(action, reply)
    }

    pub fn deck_names(&self) -> Result<Vec<String>> {
        self.invoke("deckNames", Value::Null)
    }

    pub fn find_notes(&self, query: &str) -> Result<Vec<u64>> {
        self.invoke("findNotes", json!({ "query": query }))
    }

    pub fn add_note<F: Serialize>(&self, note: &AnkiNote<F>) -> Result<u64> {
        let id: u64 = self.invoke("addNote", json!({ "note": note }))?;
        tracing::info!(deck = %note.deck_name, model = %note.model_name, id, "note added");
        Ok(id)
    }

    pub fn is_duplicate(&self, note_type: &str, word: &str) -> Result<bool> {
        Ok(!self.find_notes(&duplicate_query(note_type, word))?.is_empty())
    }

    /// Decks that are empty or already hold notes of `note_type`; the
    /// built-in "Default" deck is never offered.
    pub fn decks_for(&self, note_type: &str) -> Result<Vec<String>> {
        let mut decks = Vec::new();
        for deck in self.deck_names()? {
            if deck.trim().eq_ignore_ascii_case("default") {
                continue;
            }
            let deck_query = format!("deck:\"{}\"", escape_query(&deck));
            if self.find_notes(&deck_query)?.is_empty() {
                decks.push(deck);
                continue;
            }
            let typed = format!("{deck_query} note:\"{}\"", escape_query(note_type));
            if !self.find_notes(&typed)?.is_empty() {
                decks.push(deck);
            }
        }
        Ok(decks)
    }
}

fn request_body(action: &str, params: Value) -> Value {
    let mut body = json!({
        "action": action,
        "version": ANKI_CONNECT_VERSION,
    });
    if !params.is_null() {
        body["params"] = params;
    }
    body
}

fn decode_reply<T: DeserializeOwned>(action: &str, reply: Value) -> Result<T> {
    let reply: Reply = serde_json::from_value(reply)?;
    if let Some(error) = reply.error {
        return Err(DankiError::Anki(format!("{action}: {error}")));
    }
    Ok(serde_json::from_value(reply.result)?)
}

fn duplicate_query(note_type: &str, word: &str) -> String {
    format!(
        "note:\"{}\" base_d:\"{}\"",
        escape_query(note_type.trim()),
        escape_query(word.trim())
    )
}

fn escape_query(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
