use async_trait::async_trait;
use serde::Deserialize;

use super::schema::{Field, Kind, Schema};
use super::Tool;
use crate::anki::{is_cloze_model, quote_query_term, AnkiClient, NoteInfo};
use crate::error::GatewayError;

pub struct QueryCards;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCardsInput {
    pub query: Option<String>,
    pub deck_name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub card_state: Option<String>,
    pub added_in_days: Option<u64>,
    pub front_contains: Option<String>,
    pub back_contains: Option<String>,
    pub text_contains: Option<String>,
    pub any_field_contains: Option<String>,
    pub note_model: Option<String>,
}

const CARD_STATES: &[&str] = &["new", "learn", "due", "suspended", "buried"];

impl QueryCardsInput {
    fn has_criteria(&self) -> bool {
        self.query.is_some()
            || self.deck_name.is_some()
            || self.tags.is_some()
            || self.card_state.is_some()
            || self.added_in_days.is_some()
            || self.front_contains.is_some()
            || self.back_contains.is_some()
            || self.text_contains.is_some()
            || self.any_field_contains.is_some()
            || self.note_model.is_some()
    }

    /// A raw query wins; otherwise the structured criteria are joined into one search.
    fn build_query(&self) -> String {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            return query.to_string();
        }

        let non_empty = |s: &Option<String>| s.clone().filter(|v| !v.is_empty());
        let mut parts = Vec::new();

        if let Some(deck) = non_empty(&self.deck_name) {
            parts.push(format!("deck:{}", quote_query_term(&deck)));
        }
        for tag in self.tags.iter().flatten() {
            parts.push(format!("tag:{}", quote_query_term(tag)));
        }
        if let Some(state) = non_empty(&self.card_state) {
            parts.push(format!("is:{}", state));
        }
        if let Some(days) = self.added_in_days.filter(|d| *d > 0) {
            parts.push(format!("added:{}", days));
        }
        if let Some(model) = non_empty(&self.note_model) {
            parts.push(format!("note:{}", quote_query_term(&model)));
        }
        if let Some(front) = non_empty(&self.front_contains) {
            parts.push(format!("Front:*{}*", front));
        }
        if let Some(back) = non_empty(&self.back_contains) {
            parts.push(format!("Back:*{}*", back));
        }
        if let Some(text) = non_empty(&self.text_contains) {
            parts.push(format!("Text:*{}*", text));
        }
        if let Some(any) = non_empty(&self.any_field_contains) {
            if any.contains(' ') {
                parts.push(quote_query_term(&any));
            } else {
                parts.push(any);
            }
        }

        parts.join(" ").trim().to_string()
    }
}

pub(crate) fn format_note(note: &NoteInfo, deck_name: Option<&str>) -> String {
    let mut lines = vec![
        format!("Note ID: {}", note.note_id),
        format!("Model: {}", note.model_name),
    ];
    if let Some(deck) = deck_name {
        lines.push(format!("Deck: {}", deck));
    }
    lines.push(format!(
        "Tags: {}",
        if note.tags.is_empty() { "No tags".to_string() } else { note.tags.join(", ") }
    ));

    if is_cloze_model(&note.model_name) {
        let text = note
            .field("Text")
            .or_else(|| note.field("Front"))
            .unwrap_or("[No primary text field for Cloze]");
        lines.push(format!("Text: {}", text));
        if let Some(extra) = note.field("Back Extra") {
            lines.push(format!("Back Extra: {}", extra));
        }
    } else {
        lines.push(format!("Front: {}", note.field("Front").unwrap_or("[No Front field]")));
        lines.push(format!("Back: {}", note.field("Back").unwrap_or("[No Back field]")));
        if let Some(hint) = note.field("Hint") {
            lines.push(format!("Hint: {}", hint));
        }
    }

    lines.join("\n")
}

#[async_trait]
impl Tool for QueryCards {
    type Input = QueryCardsInput;

    fn name(&self) -> &'static str {
        "query-cards"
    }

    fn description(&self) -> &'static str {
        "Search notes with a raw Anki query or structured criteria (deck, tags, state, added days, field contents, note type)"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::optional("query", Kind::Str, "Raw Anki search query; overrides every other criterion"),
            Field::optional("deckName", Kind::Str, "Restrict to a deck"),
            Field::optional("tags", Kind::StrList, "Notes must carry all of these tags"),
            Field::optional("cardState", Kind::OneOf(CARD_STATES), "Card state"),
            Field::optional("addedInDays", Kind::PositiveInt, "Only notes added in the last N days"),
            Field::optional("frontContains", Kind::Str, "Text the Front field contains"),
            Field::optional("backContains", Kind::Str, "Text the Back field contains"),
            Field::optional("textContains", Kind::Str, "Text the cloze Text field contains"),
            Field::optional("anyFieldContains", Kind::Str, "Text any field contains"),
            Field::optional("noteModel", Kind::Str, "Restrict to a note type"),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: QueryCardsInput) -> Result<String, GatewayError> {
        if !input.has_criteria() {
            return Ok("No search criteria provided. Please specify a 'query' or other search parameters like 'deckName', 'tags', etc.".to_string());
        }

        let query = input.build_query();
        if query.is_empty() {
            return Ok("Search criteria provided did not form a valid query. Please refine your search terms.".to_string());
        }

        let note_ids = client.find_notes(&query).await?;
        if note_ids.is_empty() {
            return Ok(format!("No cards found matching your criteria: \"{}\"", query));
        }

        let notes = client.notes_info(&note_ids).await?;
        let deck_name = input.deck_name.as_deref().filter(|d| !d.is_empty());
        let rendered: Vec<String> = notes.iter().map(|n| format_note(n, deck_name)).collect();

        Ok(format!(
            "Found {} note(s) matching your criteria (\"{}\"):\n\n{}",
            notes.len(),
            query,
            rendered.join("\n\n---\n\n")
        ))
    }
}
