use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Field name to value for one note. Keys are field names of exactly one note type.
pub type FieldMap = BTreeMap<String, String>;

/// Caller-supplied content with arbitrary keys, not yet tied to any note type.
pub type ContentMap = BTreeMap<String, String>;

pub const BASIC_MODEL: &str = "Basic";
pub const CLOZE_MODEL: &str = "Cloze";

/// Whether a note type uses cloze deletions, judged by its name.
pub fn is_cloze_model(model_name: &str) -> bool {
    model_name.to_lowercase().contains("cloze")
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub deck_name: String,
    pub model_name: String,
    pub fields: FieldMap,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Field {
    pub value: String,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub note_id: u64,
    pub model_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: HashMap<String, Field>,
    #[serde(default)]
    pub cards: Vec<u64>,
}

impl NoteInfo {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|f| f.value.as_str())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CardInfo {
    pub card_id: u64,
    #[serde(default)]
    pub note: u64,
    #[serde(default)]
    pub deck_name: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub card_type: Option<i32>,
    pub queue: Option<i32>,
    pub due: Option<i64>,
    pub interval: Option<i64>,
    pub factor: Option<i64>,
    pub reps: Option<i64>,
    pub lapses: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeckStats {
    #[serde(default)]
    pub deck_id: u64,
    pub name: String,
    #[serde(default)]
    pub new_count: u64,
    #[serde(default)]
    pub learn_count: u64,
    #[serde(default)]
    pub review_count: u64,
    pub total_in_deck: Option<u64>,
}

impl DeckStats {
    pub fn total(&self) -> u64 {
        self.total_in_deck
            .unwrap_or(self.new_count + self.learn_count + self.review_count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelTemplate {
    pub name: String,
    pub question_format: String,
    pub answer_format: String,
}

/// A note type as read from the remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub fields: Vec<String>,
    pub templates: Vec<ModelTemplate>,
    pub css: String,
    pub is_cloze: bool,
}

#[cfg(test)]
impl ModelInfo {
    /// A model with only a name and field list, as used by inference and mapping.
    pub fn with_fields(name: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            templates: Vec::new(),
            css: String::new(),
            is_cloze: is_cloze_model(name),
        }
    }
}
