use async_trait::async_trait;
use serde::Deserialize;

use super::cloze::check_cloze_text;
use super::schema::{Field, Kind, Schema};
use super::Tool;
use crate::anki::{is_cloze_model, AnkiClient, CardInfo, FieldMap, NewNote, BASIC_MODEL, CLOZE_MODEL};
use crate::error::{GatewayError, Issue};

const TAGS: Field = Field::optional("tags", Kind::StrList, "Optional tags for the note");

pub struct CreateCard;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardInput {
    pub deck_name: String,
    pub front: String,
    pub back: String,
    pub hint: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
impl Tool for CreateCard {
    type Input = CreateCardInput;

    fn name(&self) -> &'static str {
        "create-card"
    }

    fn description(&self) -> &'static str {
        "Create a new Basic flashcard with a front, a back and an optional hint"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("deckName", Kind::Str, "The deck to add the card to").non_empty(),
            Field::required("front", Kind::Str, "Front side (question)").non_empty(),
            Field::required("back", Kind::Str, "Back side (answer)").non_empty(),
            Field::optional("hint", Kind::Str, "Optional hint shown with the question"),
            TAGS,
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: CreateCardInput) -> Result<String, GatewayError> {
        let mut fields = FieldMap::from([
            ("Front".to_string(), input.front),
            ("Back".to_string(), input.back),
        ]);
        let hint = input.hint.filter(|h| !h.is_empty());
        if let Some(hint) = &hint {
            fields.insert("Hint".to_string(), hint.clone());
        }

        let note_id = client
            .add_note_validated(&NewNote {
                deck_name: input.deck_name.clone(),
                model_name: BASIC_MODEL.to_string(),
                fields,
                tags: input.tags,
            })
            .await?;

        Ok(format!(
            "Successfully created Basic card in deck \"{}\" with note ID: {}{}",
            input.deck_name,
            note_id,
            if hint.is_some() { " with a hint." } else { "." }
        ))
    }
}

pub struct UpdateCard;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardInput {
    pub note_id: u64,
    pub front: Option<String>,
    pub back: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[async_trait]
impl Tool for UpdateCard {
    type Input = UpdateCardInput;

    fn name(&self) -> &'static str {
        "update-card"
    }

    fn description(&self) -> &'static str {
        "Update the front, back or tags of an existing Basic note"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("noteId", Kind::PositiveInt, "ID of the note to update"),
            Field::optional("front", Kind::Str, "New front side"),
            Field::optional("back", Kind::Str, "New back side"),
            Field::optional("tags", Kind::StrList, "Replacement tags"),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: UpdateCardInput) -> Result<String, GatewayError> {
        let mut fields = FieldMap::new();
        if let Some(front) = input.front {
            fields.insert("Front".to_string(), front);
        }
        if let Some(back) = input.back {
            fields.insert("Back".to_string(), back);
        }

        if !fields.is_empty() {
            client.update_note_fields(input.note_id, &fields).await?;
        }
        if let Some(tags) = &input.tags {
            client.replace_tags(&[input.note_id], tags).await?;
        }

        Ok(format!("Successfully updated card with note ID: {}", input.note_id))
    }
}

pub struct CreateClozeCard;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClozeCardInput {
    pub deck_name: String,
    pub text: String,
    pub back_extra: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
impl Tool for CreateClozeCard {
    type Input = CreateClozeCardInput;

    fn name(&self) -> &'static str {
        "create-cloze-card"
    }

    fn description(&self) -> &'static str {
        "Create a new Cloze card. The text must contain at least one deletion like {{c1::answer}}"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("deckName", Kind::Str, "The deck to add the card to").non_empty(),
            Field::required("text", Kind::Str, "Text containing cloze deletions").non_empty(),
            Field::optional("backExtra", Kind::Str, "Extra information shown on the back"),
            TAGS,
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: CreateClozeCardInput) -> Result<String, GatewayError> {
        check_cloze_text(&input.text, "Text")?;

        let mut fields = FieldMap::from([("Text".to_string(), input.text)]);
        if let Some(extra) = input.back_extra.filter(|e| !e.is_empty()) {
            fields.insert("Back Extra".to_string(), extra);
        }

        let note_id = client
            .add_note_validated(&NewNote {
                deck_name: input.deck_name.clone(),
                model_name: CLOZE_MODEL.to_string(),
                fields,
                tags: input.tags,
            })
            .await?;

        Ok(format!(
            "Successfully created Cloze card in deck \"{}\" with note ID: {}",
            input.deck_name, note_id
        ))
    }
}

pub struct UpdateClozeCard;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClozeCardInput {
    pub note_id: u64,
    pub text: Option<String>,
    pub back_extra: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[async_trait]
impl Tool for UpdateClozeCard {
    type Input = UpdateClozeCardInput;

    fn name(&self) -> &'static str {
        "update-cloze-card"
    }

    fn description(&self) -> &'static str {
        "Update the text, back extra or tags of an existing Cloze note"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("noteId", Kind::PositiveInt, "ID of the cloze note to update"),
            Field::optional("text", Kind::Str, "New text with cloze deletions"),
            Field::optional("backExtra", Kind::Str, "New back extra"),
            Field::optional("tags", Kind::StrList, "Replacement tags"),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: UpdateClozeCardInput) -> Result<String, GatewayError> {
        let notes = client.notes_info(&[input.note_id]).await?;
        let note = notes.first().ok_or_else(|| {
            GatewayError::Operation(format!("No note found with ID {}", input.note_id))
        })?;
        if !is_cloze_model(&note.model_name) {
            return Err(GatewayError::Operation(format!(
                "Note {} is not a Cloze model note. It is a \"{}\" model.",
                input.note_id, note.model_name
            )));
        }

        let mut fields = FieldMap::new();
        if let Some(text) = input.text {
            check_cloze_text(&text, "Text")?;
            fields.insert("Text".to_string(), text);
        }
        if let Some(extra) = input.back_extra {
            fields.insert("Back Extra".to_string(), extra);
        }

        if !fields.is_empty() {
            client.update_note_fields(input.note_id, &fields).await?;
        }
        if let Some(tags) = &input.tags {
            client.replace_tags(&[input.note_id], tags).await?;
        }

        Ok(format!("Successfully updated cloze card with note ID: {}", input.note_id))
    }
}

pub struct DeleteNote;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNoteInput {
    pub note_ids: Vec<u64>,
}

#[async_trait]
impl Tool for DeleteNote {
    type Input = DeleteNoteInput;

    fn name(&self) -> &'static str {
        "delete-note"
    }

    fn description(&self) -> &'static str {
        "Delete notes and all their cards. This is permanent; confirm with the user first."
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("noteIds", Kind::PositiveIntList, "IDs of the notes to delete").non_empty(),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: DeleteNoteInput) -> Result<String, GatewayError> {
        client.delete_notes(&input.note_ids).await?;

        let ids: Vec<String> = input.note_ids.iter().map(u64::to_string).collect();
        Ok(format!(
            "Successfully requested deletion for Note ID(s): {}. Please check Anki to confirm, as this action is permanent.",
            ids.join(", ")
        ))
    }
}

pub struct GetCardInfo;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCardInfoInput {
    pub card_ids: Vec<u64>,
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn format_card(card: &CardInfo) -> String {
    let text_or_na = |s: &str| if s.is_empty() { "N/A".to_string() } else { s.to_string() };
    let tags = if card.tags.is_empty() {
        "No tags".to_string()
    } else {
        card.tags.join(", ")
    };

    format!(
        "Card ID: {}\n  Note ID: {}\n  Deck: {}\n  Model: {}\n  Question: {}\n  Answer: {}\n  Interval: {}\n  Due: {}\n  Lapses: {}\n  Reviews: {}\n  Factor: {}\n  Type: {} (0=new, 1=learn, 2=review, 3=relearn)\n  Queue: {} (-3=user buried, -2=scheduler buried, -1=suspended, 0=new, 1=learn, 2=review, 3=day learn, 4=preview)\n  Tags: {}\n  ---",
        card.card_id,
        card.note,
        card.deck_name,
        card.model_name,
        text_or_na(&card.question),
        text_or_na(&card.answer),
        card.interval.map_or_else(|| "N/A".to_string(), |i| format!("{} days", i)),
        or_na(card.due),
        or_na(card.lapses),
        or_na(card.reps),
        or_na(card.factor),
        or_na(card.card_type),
        or_na(card.queue),
        tags
    )
}

#[async_trait]
impl Tool for GetCardInfo {
    type Input = GetCardInfoInput;

    fn name(&self) -> &'static str {
        "get-card-info"
    }

    fn description(&self) -> &'static str {
        "Get detailed information, including scheduling state, for specific cards"
    }

    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::new(&[
            Field::required("cardIds", Kind::PositiveIntList, "IDs of the cards").non_empty(),
        ]);
        &SCHEMA
    }

    async fn run(&self, client: &AnkiClient, input: GetCardInfoInput) -> Result<String, GatewayError> {
        let cards = client.cards_info(&input.card_ids).await?;
        if cards.is_empty() {
            return Ok("No information found for the provided card ID(s).".to_string());
        }

        let details: Vec<String> = cards.iter().map(format_card).collect();
        let mut text = format!("Detailed Card Information:\n{}", details.join("\n"));

        let missing: Vec<String> = input
            .card_ids
            .iter()
            .filter(|id| !cards.iter().any(|c| c.card_id == **id))
            .map(u64::to_string)
            .collect();
        if !missing.is_empty() {
            text.push_str(&format!("\nCard ID(s) not found: {}", missing.join(", ")));
        }
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSelection {
    #[serde(default)]
    pub card_ids: Vec<u64>,
    pub query: Option<String>,
}

static CARD_SELECTION: Schema = Schema::new(&[
    Field::optional("cardIds", Kind::PositiveIntList, "IDs of the cards"),
    Field::optional("query", Kind::Str, "Anki search query selecting the cards"),
]);

impl CardSelection {
    fn issues(&self) -> Vec<Issue> {
        let has_query = self.query.as_deref().map_or(false, |q| !q.trim().is_empty());
        if self.card_ids.is_empty() && !has_query {
            vec![Issue::new("", "Either 'cardIds' or 'query' must be provided")]
        } else {
            Vec::new()
        }
    }

    /// Explicit IDs win over the query.
    async fn resolve(&self, client: &AnkiClient) -> Result<Vec<u64>, GatewayError> {
        if !self.card_ids.is_empty() {
            return Ok(self.card_ids.clone());
        }
        match &self.query {
            Some(query) => client.find_cards(query).await,
            None => Ok(Vec::new()),
        }
    }
}

pub struct SuspendCards;

#[async_trait]
impl Tool for SuspendCards {
    type Input = CardSelection;

    fn name(&self) -> &'static str {
        "suspend-cards"
    }

    fn description(&self) -> &'static str {
        "Suspend cards by ID or by search query so they are no longer shown in reviews"
    }

    fn schema(&self) -> &'static Schema {
        &CARD_SELECTION
    }

    fn check(&self, input: &CardSelection) -> Vec<Issue> {
        input.issues()
    }

    async fn run(&self, client: &AnkiClient, input: CardSelection) -> Result<String, GatewayError> {
        let card_ids = input.resolve(client).await?;
        if card_ids.is_empty() {
            return Ok(format!(
                "No cards found matching query \"{}\". No cards were suspended.",
                input.query.unwrap_or_default()
            ));
        }

        client.suspend_cards(&card_ids).await?;
        Ok(format!("Successfully requested suspension for {} card(s).", card_ids.len()))
    }
}

pub struct UnsuspendCards;

#[async_trait]
impl Tool for UnsuspendCards {
    type Input = CardSelection;

    fn name(&self) -> &'static str {
        "unsuspend-cards"
    }

    fn description(&self) -> &'static str {
        "Unsuspend cards by ID or by search query so they return to reviews"
    }

    fn schema(&self) -> &'static Schema {
        &CARD_SELECTION
    }

    fn check(&self, input: &CardSelection) -> Vec<Issue> {
        input.issues()
    }

    async fn run(&self, client: &AnkiClient, input: CardSelection) -> Result<String, GatewayError> {
        let card_ids = input.resolve(client).await?;
        if card_ids.is_empty() {
            return Ok(format!(
                "No cards found matching query \"{}\". No cards were unsuspended.",
                input.query.unwrap_or_default()
            ));
        }

        client.unsuspend_cards(&card_ids).await?;
        Ok(format!("Successfully requested unsuspension for {} card(s).", card_ids.len()))
    }
}
