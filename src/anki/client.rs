use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::action::Action;
use super::chunk::for_each_chunk;
use super::types::{CardInfo, DeckStats, FieldMap, ModelInfo, ModelTemplate, NewNote, NoteInfo, is_cloze_model};
use crate::config::AnkiConnectConfig;
use crate::error::GatewayError;

/// Raw HTTP reply, fully buffered.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// One HTTP round trip to AnkiConnect. Failing to obtain any reply is a `Connection` error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: String) -> Result<HttpReply, GatewayError>;
}

pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: String) -> Result<HttpReply, GatewayError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplateSides {
    #[serde(rename = "Front", default)]
    front: String,
    #[serde(rename = "Back", default)]
    back: String,
}

/// Quote a value for use inside an Anki search query.
pub fn quote_query_term(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Client for the AnkiConnect add-on. Holds no mutable state and is cheap to clone.
#[derive(Clone)]
pub struct AnkiClient {
    transport: Arc<dyn Transport>,
    config: AnkiConnectConfig,
}

impl AnkiClient {
    pub fn new(config: AnkiConnectConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.url()));
        Self::with_transport(transport, config)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: AnkiConnectConfig) -> Self {
        Self { transport, config }
    }

    /// Run an action with the configured retry budget and initial backoff.
    pub async fn execute(&self, action: Action, params: Value) -> Result<Value, GatewayError> {
        self.execute_with(action, params, self.config.retries, self.config.initial_delay())
            .await
    }

    /// Run an action, retrying transient failures up to `retries` attempts in total.
    ///
    /// The delay doubles after every failed attempt. Semantic failures (remote errors,
    /// unexpected null results) are returned immediately. A null result on an
    /// allow-listed action comes back as `Value::Null`.
    pub async fn execute_with(
        &self,
        action: Action,
        params: Value,
        retries: u32,
        initial_delay: Duration,
    ) -> Result<Value, GatewayError> {
        let payload = json!({
            "action": action.as_str(),
            "version": self.config.version,
            "params": params,
        })
        .to_string();

        let attempts = retries.max(1);
        let mut delay = initial_delay;
        let mut attempt = 1;
        loop {
            match self.attempt(action, &payload).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    log::warn!(
                        "AnkiConnect {} attempt {}/{} failed: {}; retrying after {:?}",
                        action,
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    log::debug!("AnkiConnect {} failed after {} attempt(s): {}", action, attempt, e);
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, action: Action, payload: &str) -> Result<Value, GatewayError> {
        log::debug!("AnkiConnect request: {}", payload);
        let reply = self.transport.post(payload.to_string()).await?;
        log::debug!("AnkiConnect response status {}: {}", reply.status, reply.body);

        if reply.status != 200 {
            return Err(GatewayError::Transport {
                status: reply.status,
                body: reply.body,
            });
        }

        let parsed: ApiResponse = serde_json::from_str(&reply.body)
            .map_err(|_| GatewayError::Protocol { body: reply.body.clone() })?;

        if let Some(error) = parsed.error {
            return Err(GatewayError::Remote(error));
        }

        if parsed.result.is_null() && !action.null_is_success() {
            return Err(GatewayError::UnexpectedNullResult {
                action: action.as_str().to_string(),
            });
        }

        Ok(parsed.result)
    }

    async fn call<T: DeserializeOwned>(&self, action: Action, params: Value) -> Result<T, GatewayError> {
        let result = self.execute(action, params).await?;
        T::deserialize(&result).map_err(|e| GatewayError::Protocol {
            body: format!("unexpected {} result {} ({})", action, result, e),
        })
    }

    /// Like [`call`](Self::call) for per-ID lookups. The remote answers an unknown ID with
    /// an empty object; those entries are dropped.
    async fn call_found<T: DeserializeOwned>(&self, action: Action, params: Value) -> Result<Vec<T>, GatewayError> {
        let entries: Vec<Value> = self.call(action, params).await?;
        let mut found = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.as_object().map_or(false, |m| m.is_empty()) {
                log::debug!("AnkiConnect {} skipped an unknown ID", action);
                continue;
            }
            let item = T::deserialize(&entry).map_err(|e| GatewayError::Protocol {
                body: format!("unexpected {} entry {} ({})", action, entry, e),
            })?;
            found.push(item);
        }
        Ok(found)
    }

    pub async fn create_deck(&self, deck_name: &str) -> Result<u64, GatewayError> {
        self.call(Action::CreateDeck, json!({ "deck": deck_name })).await
    }

    pub async fn add_note(&self, note: &NewNote) -> Result<u64, GatewayError> {
        self.call(Action::AddNote, json!({ "note": note })).await
    }

    /// Add a note after checking every provided field name against the model's live field list.
    pub async fn add_note_validated(&self, note: &NewNote) -> Result<u64, GatewayError> {
        let valid = self.model_field_names(&note.model_name).await?;
        let invalid: Vec<String> = note
            .fields
            .keys()
            .filter(|field| !valid.contains(field))
            .cloned()
            .collect();

        if !invalid.is_empty() {
            return Err(GatewayError::InvalidField {
                model: note.model_name.clone(),
                invalid,
                valid,
            });
        }

        self.add_note(note).await
    }

    pub async fn update_note_fields(&self, note_id: u64, fields: &FieldMap) -> Result<(), GatewayError> {
        self.execute(
            Action::UpdateNoteFields,
            json!({ "note": { "id": note_id, "fields": fields } }),
        )
        .await?;
        Ok(())
    }

    pub async fn replace_tags(&self, note_ids: &[u64], tags: &[String]) -> Result<(), GatewayError> {
        self.execute(
            Action::ReplaceTags,
            json!({ "notes": note_ids, "tags": tags.join(" ") }),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_notes(&self, note_ids: &[u64]) -> Result<(), GatewayError> {
        if note_ids.is_empty() {
            log::warn!("delete_notes called with no note IDs");
            return Ok(());
        }
        self.execute(Action::DeleteNotes, json!({ "notes": note_ids })).await?;
        Ok(())
    }

    pub async fn deck_names(&self) -> Result<Vec<String>, GatewayError> {
        self.call(Action::DeckNames, json!({})).await
    }

    pub async fn find_notes(&self, query: &str) -> Result<Vec<u64>, GatewayError> {
        self.call(Action::FindNotes, json!({ "query": query })).await
    }

    /// Info for the notes that exist; unknown IDs are left out.
    pub async fn notes_info(&self, note_ids: &[u64]) -> Result<Vec<NoteInfo>, GatewayError> {
        let client = self;
        for_each_chunk(note_ids, self.config.chunk_size, move |chunk| {
            client.call_found::<NoteInfo>(Action::NotesInfo, json!({ "notes": chunk }))
        })
        .await
    }

    pub async fn delete_decks(&self, deck_names: &[String]) -> Result<(), GatewayError> {
        if deck_names.is_empty() {
            log::warn!("delete_decks called with no deck names");
            return Ok(());
        }
        self.execute(
            Action::DeleteDecks,
            json!({ "decks": deck_names, "cardsToo": true }),
        )
        .await?;
        Ok(())
    }

    pub async fn find_cards(&self, query: &str) -> Result<Vec<u64>, GatewayError> {
        self.call(Action::FindCards, json!({ "query": query })).await
    }

    /// Info for the cards that exist; unknown IDs are left out.
    pub async fn cards_info(&self, card_ids: &[u64]) -> Result<Vec<CardInfo>, GatewayError> {
        let client = self;
        for_each_chunk(card_ids, self.config.chunk_size, move |chunk| {
            client.call_found::<CardInfo>(Action::CardsInfo, json!({ "cards": chunk }))
        })
        .await
    }

    pub async fn suspend_cards(&self, card_ids: &[u64]) -> Result<(), GatewayError> {
        if card_ids.is_empty() {
            log::warn!("suspend_cards called with no card IDs");
            return Ok(());
        }
        self.execute(Action::Suspend, json!({ "cards": card_ids })).await?;
        Ok(())
    }

    pub async fn unsuspend_cards(&self, card_ids: &[u64]) -> Result<(), GatewayError> {
        if card_ids.is_empty() {
            log::warn!("unsuspend_cards called with no card IDs");
            return Ok(());
        }
        self.execute(Action::Unsuspend, json!({ "cards": card_ids })).await?;
        Ok(())
    }

    pub async fn change_deck(&self, card_ids: &[u64], deck_name: &str) -> Result<(), GatewayError> {
        self.execute(
            Action::ChangeDeck,
            json!({ "cards": card_ids, "deck": deck_name }),
        )
        .await?;
        Ok(())
    }

    /// Stats keyed as the remote returns them (by deck ID).
    pub async fn deck_stats(&self, deck_names: &[String]) -> Result<HashMap<String, DeckStats>, GatewayError> {
        if deck_names.is_empty() {
            return Ok(HashMap::new());
        }
        self.call(Action::GetDeckStats, json!({ "decks": deck_names })).await
    }

    pub async fn model_names(&self) -> Result<Vec<String>, GatewayError> {
        self.call(Action::ModelNames, json!({})).await
    }

    pub async fn model_field_names(&self, model_name: &str) -> Result<Vec<String>, GatewayError> {
        self.call(Action::ModelFieldNames, json!({ "modelName": model_name })).await
    }

    pub async fn model_templates(&self, model_name: &str) -> Result<Vec<ModelTemplate>, GatewayError> {
        let result = self
            .execute(Action::ModelTemplates, json!({ "modelName": model_name }))
            .await?;

        let templates: BTreeMap<String, TemplateSides> = match serde_json::from_value(result) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Unexpected templates data for {}: {}", model_name, e);
                return Ok(Vec::new());
            }
        };

        Ok(templates
            .into_iter()
            .map(|(name, sides)| ModelTemplate {
                name,
                question_format: sides.front,
                answer_format: sides.back,
            })
            .collect())
    }

    pub async fn model_styling(&self, model_name: &str) -> Result<String, GatewayError> {
        let result = self
            .execute(Action::ModelStyling, json!({ "modelName": model_name }))
            .await?;

        Ok(match result {
            Value::Null => String::new(),
            Value::String(css) => css,
            Value::Object(ref map) => match map.get("css") {
                Some(Value::String(css)) => css.clone(),
                _ => {
                    log::warn!("Unexpected styling format for {}: {}", model_name, result);
                    String::new()
                }
            },
            other => {
                log::warn!("Unexpected styling format for {}: {}", model_name, other);
                String::new()
            }
        })
    }

    pub async fn model_info(&self, model_name: &str) -> Result<ModelInfo, GatewayError> {
        let fields = self.model_field_names(model_name).await?;
        let templates = self.model_templates(model_name).await?;
        let css = self.model_styling(model_name).await?;

        Ok(ModelInfo {
            name: model_name.to_string(),
            fields,
            templates,
            css,
            is_cloze: is_cloze_model(model_name),
        })
    }

    /// Info for every model, in the order the remote lists them. Unreadable models are skipped.
    pub async fn all_models_info(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let names = self.model_names().await?;
        let mut models = Vec::with_capacity(names.len());
        for name in names {
            match self.model_info(&name).await {
                Ok(info) => models.push(info),
                Err(e) => log::warn!("Failed to get info for model {}: {}", name, e),
            }
        }
        Ok(models)
    }

    /// Rename a deck by moving its cards to `new_name` and deleting the old deck.
    ///
    /// Returns the number of cards moved. A deck without cards still ends up under the new name.
    /// Renaming into one of the deck's own subdecks is refused: deleting the old deck would
    /// take the moved cards with it.
    pub async fn rename_deck(&self, current_name: &str, new_name: &str) -> Result<usize, GatewayError> {
        let child_prefix = format!("{}::", current_name.to_lowercase());
        if new_name.to_lowercase().starts_with(&child_prefix) {
            return Err(GatewayError::Operation(format!(
                "Cannot rename deck \"{}\" to its own subdeck \"{}\".",
                current_name, new_name
            )));
        }

        let card_ids = self
            .find_cards(&format!("deck:{}", quote_query_term(current_name)))
            .await?;

        let decks = self.deck_names().await?;
        if !decks.iter().any(|d| d == current_name) {
            return Err(GatewayError::Operation(format!(
                "Deck \"{}\" does not exist. Cannot rename.",
                current_name
            )));
        }
        if decks.iter().any(|d| d == new_name) {
            log::warn!(
                "Deck \"{}\" already exists; cards from \"{}\" will be merged into it",
                new_name,
                current_name
            );
        }

        if card_ids.is_empty() {
            log::info!("Deck \"{}\" has no cards; creating \"{}\" directly", current_name, new_name);
            self.create_deck(new_name).await?;
        } else {
            self.change_deck(&card_ids, new_name).await?;
            log::info!(
                "Moved {} card(s) from \"{}\" to \"{}\"",
                card_ids.len(),
                current_name,
                new_name
            );
        }

        if let Err(e) = self.delete_decks(&[current_name.to_string()]).await {
            log::warn!("Could not delete old deck \"{}\" after renaming: {}", current_name, e);
        }

        Ok(card_ids.len())
    }
}
