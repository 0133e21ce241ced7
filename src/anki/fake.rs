//! In-memory stand-in for the AnkiConnect add-on, used by handler and end-to-end tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::client::{AnkiClient, HttpReply, Transport};
use super::types::FieldMap;
use crate::config::AnkiConnectConfig;
use crate::error::GatewayError;

#[derive(Debug, Clone)]
struct FakeNote {
    id: u64,
    card_id: u64,
    deck: String,
    model: String,
    fields: FieldMap,
    tags: Vec<String>,
    suspended: bool,
}

#[derive(Debug, Default)]
struct Collection {
    decks: Vec<String>,
    models: Vec<(String, Vec<String>)>,
    notes: Vec<FakeNote>,
    next_id: u64,
    actions: Vec<String>,
}

pub struct FakeAnki {
    state: Mutex<Collection>,
}

impl FakeAnki {
    /// A collection with the stock "Default" deck and the Basic and Cloze note types.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Collection {
                decks: vec!["Default".to_string()],
                models: vec![
                    ("Basic".to_string(), vec!["Front".to_string(), "Back".to_string()]),
                    ("Cloze".to_string(), vec!["Text".to_string(), "Back Extra".to_string()]),
                ],
                next_id: 1_000,
                ..Default::default()
            }),
        })
    }

    pub fn with_model(self: Arc<Self>, name: &str, fields: &[&str]) -> Arc<Self> {
        self.state.lock().unwrap().models.push((
            name.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        ));
        self
    }

    pub fn without_models(self: Arc<Self>) -> Arc<Self> {
        self.state.lock().unwrap().models.clear();
        self
    }

    pub fn client(self: &Arc<Self>) -> AnkiClient {
        let config = AnkiConnectConfig {
            retries: 1,
            ..AnkiConnectConfig::default()
        };
        AnkiClient::with_transport(self.clone(), config)
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn decks(&self) -> Vec<String> {
        self.state.lock().unwrap().decks.clone()
    }

    pub fn note_count(&self) -> usize {
        self.state.lock().unwrap().notes.len()
    }

    pub fn note_fields(&self, note_id: u64) -> Option<FieldMap> {
        self.state
            .lock()
            .unwrap()
            .notes
            .iter()
            .find(|n| n.id == note_id)
            .map(|n| n.fields.clone())
    }

    pub fn note_tags(&self, note_id: u64) -> Option<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .notes
            .iter()
            .find(|n| n.id == note_id)
            .map(|n| n.tags.clone())
    }

    pub fn is_suspended(&self, card_id: u64) -> bool {
        self.state
            .lock()
            .unwrap()
            .notes
            .iter()
            .any(|n| n.card_id == card_id && n.suspended)
    }
}

impl Collection {
    fn handle(&mut self, action: &str, params: &Value) -> Result<Value, String> {
        match action {
            "createDeck" => {
                let deck = str_param(params, "deck")?;
                if !self.decks.contains(&deck) {
                    self.decks.push(deck.clone());
                }
                let position = self.decks.iter().position(|d| *d == deck).unwrap_or(0);
                Ok(json!(position as u64 + 1))
            }
            "deckNames" => Ok(json!(self.decks)),
            "deleteDecks" => {
                let decks = str_list_param(params, "decks")?;
                self.decks.retain(|d| !decks.contains(d));
                self.notes.retain(|n| !decks.iter().any(|d| in_deck(&n.deck, d)));
                Ok(Value::Null)
            }
            "modelNames" => Ok(json!(self.models.iter().map(|(m, _)| m).collect::<Vec<_>>())),
            "modelFieldNames" => {
                let name = str_param(params, "modelName")?;
                self.model_fields(&name).map(|f| json!(f))
            }
            "modelTemplates" => {
                let name = str_param(params, "modelName")?;
                let fields = self.model_fields(&name)?;
                let front = fields.first().cloned().unwrap_or_default();
                let back = fields.get(1).cloned().unwrap_or_default();
                Ok(json!({
                    "Card 1": {
                        "Front": format!("{{{{{}}}}}", front),
                        "Back": format!("{{{{FrontSide}}}}<hr id=answer>{{{{{}}}}}", back),
                    }
                }))
            }
            "modelStyling" => {
                let name = str_param(params, "modelName")?;
                self.model_fields(&name)?;
                Ok(json!({ "css": ".card { font-family: arial; }" }))
            }
            "addNote" => {
                let note = params.get("note").ok_or("missing note")?;
                let deck = str_param(note, "deckName")?;
                let model = str_param(note, "modelName")?;
                let valid = self.model_fields(&model)?;
                if !self.decks.iter().any(|d| *d == deck) {
                    return Err(format!("deck was not found: {}", deck));
                }
                let fields: FieldMap = serde_json::from_value(note["fields"].clone())
                    .map_err(|e| e.to_string())?;
                let first = valid.first().and_then(|f| fields.get(f));
                if first.map_or(true, |v| v.is_empty()) {
                    return Err("cannot create note because it is empty".to_string());
                }
                let tags: Vec<String> = serde_json::from_value(note["tags"].clone()).unwrap_or_default();
                let id = self.next_id;
                self.next_id += 2;
                self.notes.push(FakeNote {
                    id,
                    card_id: id + 1,
                    deck,
                    model,
                    fields,
                    tags,
                    suspended: false,
                });
                Ok(json!(id))
            }
            "updateNoteFields" => {
                let id = params["note"]["id"].as_u64().ok_or("missing note id")?;
                let fields: FieldMap = serde_json::from_value(params["note"]["fields"].clone())
                    .map_err(|e| e.to_string())?;
                let note = self
                    .notes
                    .iter_mut()
                    .find(|n| n.id == id)
                    .ok_or("Note was not found")?;
                note.fields.extend(fields);
                Ok(Value::Null)
            }
            "replaceTags" => {
                let ids = id_list_param(params, "notes")?;
                let tags = str_param(params, "tags")?;
                for note in self.notes.iter_mut().filter(|n| ids.contains(&n.id)) {
                    note.tags = tags.split_whitespace().map(String::from).collect();
                }
                Ok(Value::Null)
            }
            "deleteNotes" => {
                let ids = id_list_param(params, "notes")?;
                self.notes.retain(|n| !ids.contains(&n.id));
                Ok(Value::Null)
            }
            "findNotes" => {
                let query = str_param(params, "query")?;
                Ok(json!(self.search(&query).iter().map(|n| n.id).collect::<Vec<_>>()))
            }
            "findCards" => {
                let query = str_param(params, "query")?;
                Ok(json!(self.search(&query).iter().map(|n| n.card_id).collect::<Vec<_>>()))
            }
            "notesInfo" => {
                let ids = id_list_param(params, "notes")?;
                Ok(Value::Array(
                    ids.iter()
                        .map(|id| match self.notes.iter().find(|n| n.id == *id) {
                            Some(note) => note_info(note),
                            None => json!({}),
                        })
                        .collect(),
                ))
            }
            "cardsInfo" => {
                let ids = id_list_param(params, "cards")?;
                Ok(Value::Array(
                    ids.iter()
                        .map(|id| match self.notes.iter().find(|n| n.card_id == *id) {
                            Some(note) => card_info(note),
                            None => json!({}),
                        })
                        .collect(),
                ))
            }
            "suspend" | "unsuspend" => {
                let ids = id_list_param(params, "cards")?;
                let suspended = action == "suspend";
                for note in self.notes.iter_mut().filter(|n| ids.contains(&n.card_id)) {
                    note.suspended = suspended;
                }
                Ok(Value::Null)
            }
            "changeDeck" => {
                let ids = id_list_param(params, "cards")?;
                let deck = str_param(params, "deck")?;
                if !self.decks.contains(&deck) {
                    self.decks.push(deck.clone());
                }
                for note in self.notes.iter_mut().filter(|n| ids.contains(&n.card_id)) {
                    note.deck = deck.clone();
                }
                Ok(Value::Null)
            }
            "getDeckStats" => {
                let decks = str_list_param(params, "decks")?;
                let mut stats = Map::new();
                for deck in decks {
                    if let Some(position) = self.decks.iter().position(|d| *d == deck) {
                        let count = self.notes.iter().filter(|n| in_deck(&n.deck, &deck)).count();
                        let deck_id = position as u64 + 1;
                        stats.insert(
                            deck_id.to_string(),
                            json!({
                                "deck_id": deck_id,
                                "name": deck,
                                "new_count": count,
                                "learn_count": 0,
                                "review_count": 0,
                                "total_in_deck": count,
                            }),
                        );
                    }
                }
                Ok(Value::Object(stats))
            }
            other => Err(format!("unsupported action: {}", other)),
        }
    }

    fn model_fields(&self, name: &str) -> Result<Vec<String>, String> {
        self.models
            .iter()
            .find(|(m, _)| m == name)
            .map(|(_, f)| f.clone())
            .ok_or_else(|| format!("model was not found: {}", name))
    }

    /// Supports the subset of the search syntax the gateway emits.
    fn search(&self, query: &str) -> Vec<&FakeNote> {
        let terms = split_query(query);
        self.notes
            .iter()
            .filter(|note| terms.iter().all(|term| matches_term(note, term)))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeAnki {
    async fn post(&self, body: String) -> Result<HttpReply, GatewayError> {
        let request: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
        let action = request["action"].as_str().unwrap_or_default().to_string();

        let mut state = self.state.lock().unwrap();
        state.actions.push(action.clone());
        let reply = match state.handle(&action, &request["params"]) {
            Ok(result) => json!({ "result": result, "error": null }),
            Err(error) => json!({ "result": null, "error": error }),
        };

        Ok(HttpReply {
            status: 200,
            body: reply.to_string(),
        })
    }
}

fn str_param(params: &Value, key: &str) -> Result<String, String> {
    params[key]
        .as_str()
        .map(String::from)
        .ok_or_else(|| format!("missing {}", key))
}

fn str_list_param(params: &Value, key: &str) -> Result<Vec<String>, String> {
    serde_json::from_value(params[key].clone()).map_err(|e| format!("{}: {}", key, e))
}

fn id_list_param(params: &Value, key: &str) -> Result<Vec<u64>, String> {
    serde_json::from_value(params[key].clone()).map_err(|e| format!("{}: {}", key, e))
}

fn in_deck(note_deck: &str, deck: &str) -> bool {
    note_deck == deck || note_deck.starts_with(&format!("{}::", deck))
}

fn split_query(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for c in query.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            ' ' if !quoted => {
                if !current.is_empty() {
                    terms.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

fn matches_term(note: &FakeNote, term: &str) -> bool {
    let contains = |value: &str, needle: &str| value.to_lowercase().contains(&needle.to_lowercase());
    match term.split_once(':') {
        Some(("deck", deck)) => in_deck(&note.deck, deck),
        Some(("note", model)) => note.model == model,
        Some(("tag", tag)) => note.tags.iter().any(|t| t == tag),
        Some(("is", "suspended")) => note.suspended,
        Some(("is", _)) | Some(("added", _)) => true,
        Some((field, pattern)) => note
            .fields
            .get(field)
            .map_or(false, |v| contains(v, pattern.trim_matches('*'))),
        None => note.fields.values().any(|v| contains(v, term)),
    }
}

fn note_info(note: &FakeNote) -> Value {
    let fields: Map<String, Value> = note
        .fields
        .iter()
        .enumerate()
        .map(|(order, (name, value))| (name.clone(), json!({ "value": value, "order": order })))
        .collect();
    json!({
        "noteId": note.id,
        "modelName": note.model,
        "tags": note.tags,
        "fields": fields,
        "cards": [note.card_id],
    })
}

fn card_info(note: &FakeNote) -> Value {
    let question = note.fields.get("Front").or_else(|| note.fields.get("Text"));
    json!({
        "cardId": note.card_id,
        "note": note.id,
        "deckName": note.deck,
        "modelName": note.model,
        "question": question.cloned().unwrap_or_default(),
        "answer": note.fields.get("Back").cloned().unwrap_or_default(),
        "tags": note.tags,
        "type": 0,
        "queue": if note.suspended { -1 } else { 0 },
        "due": 1,
        "interval": 0,
        "factor": 0,
        "reps": 0,
        "lapses": 0,
    })
}
